//! 워커 프로세스 상태 모델과 동기화 통계.

use chrono::{DateTime, FixedOffset};

/// 워커 프로세스 상태 머신.
///
/// Stopped → Starting → Running → (Stopping) → Stopped,
/// Error는 Starting/Running에서 도달 가능.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

impl WorkerState {
    /// 상태 아티팩트의 status 문자열
    pub fn as_artifact_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Error => "error",
        }
    }

    pub fn from_artifact_str(raw: &str) -> Option<Self> {
        match raw {
            "stopped" => Some(Self::Stopped),
            "starting" => Some(Self::Starting),
            "running" => Some(Self::Running),
            "stopping" => Some(Self::Stopping),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// 슈퍼바이저가 운영자에게 노출하는 워커 건강 상태
#[derive(Debug, Clone)]
pub struct WorkerHealth {
    pub state: WorkerState,
    pub pid: Option<u32>,
    /// 워커가 남긴 마지막 메시지 (세션 만료 사유 등)
    pub message: Option<String>,
    pub last_heartbeat: Option<DateTime<FixedOffset>>,
}

/// 한 틱의 동기화 통계
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncStats {
    /// 핸드오프에서 읽은 행 수
    pub fetched: usize,
    /// 새로 저장된 이벤트 수 (중복 제외)
    pub new_records: usize,
}

/// 동기화 로그 행 — 운영자 "마지막 동기화 요약"의 근거
#[derive(Debug, Clone)]
pub struct SyncLog {
    pub id: i64,
    pub sync_time: DateTime<FixedOffset>,
    pub records_fetched: i64,
    pub new_records: i64,
    /// success / error
    pub status: String,
    pub errors: Option<String>,
}
