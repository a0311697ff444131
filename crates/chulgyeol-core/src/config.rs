//! 애플리케이션 설정 구조체.
//!
//! 동기화 주기, 워커 실행 명령, 저장소 경로, 웹훅 URL, 시간표 등
//! 런타임 설정을 정의한다. JSON 파일에서 로드하며 CLI 인자가 덮어쓴다.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::timetable::Timetable;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 동기화 루프 설정
    #[serde(default)]
    pub sync: SyncConfig,
    /// 스크래핑 워커 설정
    #[serde(default)]
    pub worker: WorkerConfig,
    /// 로컬 저장소 설정
    #[serde(default)]
    pub storage: StorageConfig,
    /// 웹훅 알림 설정
    #[serde(default)]
    pub notify: NotifyConfig,
    /// 자습실 시간표
    #[serde(default)]
    pub timetable: Timetable,
}

impl AppConfig {
    /// 기본 설정
    pub fn default_config() -> Self {
        Self {
            sync: SyncConfig::default(),
            worker: WorkerConfig::default(),
            storage: StorageConfig::default(),
            notify: NotifyConfig::default(),
            timetable: Timetable::default(),
        }
    }
}

// ============================================================
// 동기화 루프 설정
// ============================================================

/// 동기화 루프 설정 — 메인 틱, 스위퍼 틱, 아침 알림 시각
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// 메인 동기화 틱 간격 (밀리초). 워커 폴링(~2초)보다 느리게.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// 미복귀 스위퍼 틱 간격 (밀리초)
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// 강제퇴장 명단 알림 시각 (매일 1회)
    #[serde(default = "default_morning_alert_time")]
    pub morning_alert_time: NaiveTime,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            morning_alert_time: default_morning_alert_time(),
        }
    }
}

fn default_tick_interval_ms() -> u64 {
    3_000
}

fn default_sweep_interval_ms() -> u64 {
    30_000
}

fn default_morning_alert_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).expect("유효한 시각")
}

// ============================================================
// 워커 설정
// ============================================================

/// 스크래핑 워커 설정 — 실행 명령과 핸드오프 디렉토리
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// 워커 실행 파일 (예: "python3")
    #[serde(default = "default_worker_command")]
    pub command: String,
    /// 실행 인자 (예: ["kiosk_worker.py"])
    #[serde(default)]
    pub args: Vec<String>,
    /// 작업 디렉토리
    #[serde(default)]
    pub workdir: Option<PathBuf>,
    /// 핸드오프 아티팩트 디렉토리 (결과/상태/명령 파일)
    #[serde(default = "default_handoff_dir")]
    pub handoff_dir: PathBuf,
    /// 시작 핸드셰이크 폴링 횟수
    #[serde(default = "default_ready_attempts")]
    pub ready_attempts: u32,
    /// 핸드셰이크 폴링 간격 (밀리초)
    #[serde(default = "default_ready_interval_ms")]
    pub ready_interval_ms: u64,
    /// 중지 명령 후 강제 종료까지 유예 (밀리초)
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
    /// 성공 틱 N회마다 예방적 재시작 (None = 비활성)
    #[serde(default)]
    pub restart_after_ticks: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            command: default_worker_command(),
            args: Vec::new(),
            workdir: None,
            handoff_dir: default_handoff_dir(),
            ready_attempts: default_ready_attempts(),
            ready_interval_ms: default_ready_interval_ms(),
            stop_grace_ms: default_stop_grace_ms(),
            restart_after_ticks: None,
        }
    }
}

fn default_worker_command() -> String {
    "python3".to_string()
}

fn default_handoff_dir() -> PathBuf {
    PathBuf::from("./handoff")
}

fn default_ready_attempts() -> u32 {
    30
}

fn default_ready_interval_ms() -> u64 {
    1_000
}

fn default_stop_grace_ms() -> u64 {
    2_000
}

// ============================================================
// 저장소 설정
// ============================================================

/// 로컬 저장소 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// DB 파일 경로 (None이면 플랫폼 기본 데이터 디렉토리)
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

// ============================================================
// 알림 설정
// ============================================================

/// 웹훅 알림 설정 — 채널별 URL 분리
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// 경고 채널 웹훅 URL (지각, 비정상 외출, 미복귀, 강제퇴장 명단)
    #[serde(default)]
    pub warning_webhook_url: String,
    /// 일반 채널 웹훅 URL (정상 출입 알림)
    #[serde(default)]
    pub general_webhook_url: String,
    /// 전송 타임아웃 (초)
    #[serde(default = "default_notify_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            warning_webhook_url: String::new(),
            general_webhook_url: String::new(),
            timeout_secs: default_notify_timeout_secs(),
        }
    }
}

fn default_notify_timeout_secs() -> u64 {
    10
}
