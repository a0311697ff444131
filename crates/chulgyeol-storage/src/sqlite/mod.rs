//! SQLite 저장소 어댑터.
//!
//! `EventStore` + `RosterStore` + `DailyStore` + `SyncLogStore` 포트 구현.
//!
//! # 모듈 구조
//! - `events`: 재조정 이벤트 저장 (EventStore 포트)
//! - `roster`: 학생 매칭, 정기외출 규칙 (RosterStore 포트)
//! - `daily`: 일일 출석 현황 (DailyStore 포트)
//! - `sync_log`: 동기화 로그 (SyncLogStore 포트)

mod daily;
mod events;
mod roster;
mod sync_log;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use chulgyeol_core::error::CoreError;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

use crate::migration;

/// SQLite 저장소 — 모든 저장소 포트의 단일 구현
pub struct SqliteStorage {
    pub(super) conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// 파일 기반 SQLite 저장소 생성
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        let conn = Connection::open(path)
            .map_err(|e| CoreError::Internal(format!("SQLite 열기 실패: {e}")))?;

        // 성능 최적화 PRAGMA 설정
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA cache_size=8000;
            PRAGMA temp_store=MEMORY;
            ",
        )
        .map_err(|e| CoreError::Internal(format!("PRAGMA 설정 실패: {e}")))?;

        migration::run_migrations(&conn)
            .map_err(|e| CoreError::Internal(format!("마이그레이션 실패: {e}")))?;

        info!("SQLite 저장소 초기화: {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// 인메모리 SQLite 저장소 생성 (테스트용)
    pub fn open_in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CoreError::Internal(format!("인메모리 SQLite 생성 실패: {e}")))?;

        migration::run_migrations(&conn)
            .map_err(|e| CoreError::Internal(format!("마이그레이션 실패: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// 내부 연결 잠금 획득
    pub(super) fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CoreError> {
        self.conn
            .lock()
            .map_err(|e| CoreError::Internal(format!("잠금 획득 실패: {e}")))
    }
}

// ============================================================
// 시각 직렬화 헬퍼
// ============================================================

/// KST 고정 오프셋 RFC3339 — 자릿수가 일정해 문자열 비교가 시간순과 일치
pub(super) fn ts(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc3339()
}

pub(super) fn parse_ts(raw: &str) -> Result<DateTime<FixedOffset>, CoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map_err(|e| CoreError::Internal(format!("기록 시각 파싱 실패 ({raw}): {e}")))
}

pub(super) fn date_str(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(super) fn time_str(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

pub(super) fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}
