//! 핸드오프 아티팩트.
//!
//! 워커와의 유일한 접점인 세 파일:
//! - `scrape_result.json` — 워커가 쓰는 최신 스크래핑 결과 (우리가 읽음)
//! - `worker_status.json` — 워커가 상태 변화마다 쓰는 건강 신호
//! - `worker_command.json` — 슈퍼바이저가 쓰고 워커가 소비·삭제하는 명령

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chulgyeol_core::error::CoreError;
use chulgyeol_core::models::event::RawEvent;
use chulgyeol_core::ports::event_source::EventSource;
use chulgyeol_core::time::parse_record_time;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// 결과 파일 이름
pub const RESULT_FILE: &str = "scrape_result.json";
/// 상태 파일 이름
pub const STATUS_FILE: &str = "worker_status.json";
/// 명령 파일 이름
pub const COMMAND_FILE: &str = "worker_command.json";

/// 세션 만료 마커 — 워커가 에러 메시지에 남긴다
const SESSION_EXPIRED_MARKER: &str = "세션 만료";

/// 핸드오프 디렉토리 경로 묶음
#[derive(Debug, Clone)]
pub struct HandoffPaths {
    dir: PathBuf,
}

impl HandoffPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn result(&self) -> PathBuf {
        self.dir.join(RESULT_FILE)
    }

    pub fn status(&self) -> PathBuf {
        self.dir.join(STATUS_FILE)
    }

    pub fn command(&self) -> PathBuf {
        self.dir.join(COMMAND_FILE)
    }
}

/// 결과 아티팩트 — 워커가 매 폴링마다 덮어쓴다
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub records: Vec<RawRow>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// 결과 행 — 워커 JSON 형식 그대로
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRow {
    pub student_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub available_time: String,
    pub status: String,
    #[serde(default)]
    pub record_time: Option<String>,
}

/// 상태 아티팩트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStatusArtifact {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// 명령 아티팩트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerCommand {
    pub action: String,
}

impl WorkerCommand {
    pub fn stop() -> Self {
        Self {
            action: "stop".to_string(),
        }
    }
}

/// 상태 아티팩트 읽기 — 파일 없음/손상은 None (쓰는 중일 수 있음)
pub async fn read_status(paths: &HandoffPaths) -> Option<WorkerStatusArtifact> {
    let raw = tokio::fs::read_to_string(paths.status()).await.ok()?;
    serde_json::from_str(&raw).ok()
}

/// 결과 파일 기반 이벤트 소스 — `EventSource` 포트 구현
pub struct FileEventSource {
    paths: HandoffPaths,
}

impl FileEventSource {
    pub fn new(paths: HandoffPaths) -> Self {
        Self { paths }
    }

    fn convert(&self, result: ScrapeResult) -> Vec<RawEvent> {
        let mut events = Vec::with_capacity(result.records.len());
        for row in result.records {
            // 이름/상태/시각이 빠진 행은 건너뛴다 — 행 단위 독립
            if row.student_name.is_empty() || row.status.is_empty() {
                continue;
            }
            let Some(record_time) = row.record_time.as_deref().and_then(parse_record_time)
            else {
                debug!(
                    "기록 시각 없는 행 생략: {} {}",
                    row.student_name, row.status
                );
                continue;
            };

            events.push(RawEvent {
                student_name: row.student_name,
                phone: row.phone,
                available_time: row.available_time,
                status: row.status,
                record_time,
            });
        }
        events
    }
}

#[async_trait]
impl EventSource for FileEventSource {
    async fn fetch_batch(&self) -> Result<Vec<RawEvent>, CoreError> {
        let raw = match tokio::fs::read_to_string(self.paths.result()).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // 워커가 첫 결과를 쓰기 전 — 빈 틱
                debug!("결과 파일 없음 — 빈 배치");
                return Ok(Vec::new());
            }
            Err(e) => return Err(CoreError::Io(e)),
        };

        let result: ScrapeResult = match serde_json::from_str(&raw) {
            Ok(result) => result,
            Err(e) => {
                // 워커가 쓰는 도중일 수 있다 — 다음 틱에서 재시도
                warn!("결과 파일 파싱 실패 (다음 틱 재시도): {e}");
                return Ok(Vec::new());
            }
        };

        if !result.success {
            let error = result.error.unwrap_or_else(|| "스크래핑 실패".to_string());
            if error.contains(SESSION_EXPIRED_MARKER) {
                return Err(CoreError::SessionExpired);
            }
            // 일시적 외부 실패 — 빈 틱으로 처리하고 다음 틱에서 재시도
            warn!("스크래핑 실패 (일시적): {error}");
            return Ok(Vec::new());
        }

        Ok(self.convert(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write_result(dir: &TempDir, content: &str) {
        tokio::fs::write(dir.path().join(RESULT_FILE), content)
            .await
            .unwrap();
    }

    fn source(dir: &TempDir) -> FileEventSource {
        FileEventSource::new(HandoffPaths::new(dir.path()))
    }

    #[tokio::test]
    async fn missing_file_yields_empty_batch() {
        let dir = TempDir::new().unwrap();
        let batch = source(&dir).fetch_batch().await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn parses_records() {
        let dir = TempDir::new().unwrap();
        write_result(
            &dir,
            r#"{
                "success": true,
                "records": [
                    {
                        "student_name": "김철수",
                        "phone": "010-1234-5678",
                        "available_time": "05:00-23:59",
                        "status": "외출(점심식사)",
                        "record_time": "2025-12-03 12:10:00"
                    },
                    {
                        "student_name": "이영희",
                        "status": "입장",
                        "record_time": "07:55"
                    }
                ],
                "timestamp": "2025-12-03T12:10:02+09:00"
            }"#,
        )
        .await;

        let batch = source(&dir).fetch_batch().await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].student_name, "김철수");
        assert_eq!(batch[0].status, "외출(점심식사)");
        // 시각만 있는 행은 오늘 날짜로 해석
        assert_eq!(
            batch[1].record_time.date_naive(),
            chulgyeol_core::time::today_kst()
        );
    }

    #[tokio::test]
    async fn rows_without_time_or_name_are_skipped() {
        let dir = TempDir::new().unwrap();
        write_result(
            &dir,
            r#"{
                "success": true,
                "records": [
                    { "student_name": "김철수", "status": "입장" },
                    { "student_name": "", "status": "입장", "record_time": "08:00" },
                    { "student_name": "이영희", "status": "입장", "record_time": "08:01" }
                ]
            }"#,
        )
        .await;

        let batch = source(&dir).fetch_batch().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].student_name, "이영희");
    }

    #[tokio::test]
    async fn torn_write_is_transient() {
        let dir = TempDir::new().unwrap();
        write_result(&dir, r#"{"success": true, "rec"#).await;

        let batch = source(&dir).fetch_batch().await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn transient_failure_is_empty_batch() {
        let dir = TempDir::new().unwrap();
        write_result(
            &dir,
            r#"{ "success": false, "error": "페이지 로드 실패", "records": [] }"#,
        )
        .await;

        let batch = source(&dir).fetch_batch().await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn session_expiry_is_surfaced() {
        let dir = TempDir::new().unwrap();
        write_result(
            &dir,
            r#"{ "success": false, "error": "세션 만료", "records": [] }"#,
        )
        .await;

        let result = source(&dir).fetch_batch().await;
        assert!(matches!(result, Err(CoreError::SessionExpired)));
    }

    #[tokio::test]
    async fn status_artifact_roundtrip() {
        let dir = TempDir::new().unwrap();
        let paths = HandoffPaths::new(dir.path());

        assert!(read_status(&paths).await.is_none());

        tokio::fs::write(
            paths.status(),
            r#"{ "status": "running", "message": "브라우저 준비 완료" }"#,
        )
        .await
        .unwrap();

        let status = read_status(&paths).await.unwrap();
        assert_eq!(status.status, "running");
        assert_eq!(status.message.as_deref(), Some("브라우저 준비 완료"));
    }
}
