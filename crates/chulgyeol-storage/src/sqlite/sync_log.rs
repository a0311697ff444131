//! 동기화 로그 스토리지 (SyncLogStore 포트 구현).

use async_trait::async_trait;
use chulgyeol_core::error::CoreError;
use chulgyeol_core::models::worker::SyncLog;
use chulgyeol_core::ports::store::SyncLogStore;
use chulgyeol_core::time::now_kst;

use super::{parse_ts, ts, SqliteStorage};

#[async_trait]
impl SyncLogStore for SqliteStorage {
    async fn log_sync(
        &self,
        fetched: usize,
        new_records: usize,
        status: &str,
        errors: Option<&str>,
    ) -> Result<(), CoreError> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO sync_logs (sync_time, records_fetched, new_records, status, errors)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                ts(&now_kst()),
                fetched as i64,
                new_records as i64,
                status,
                errors
            ],
        )
        .map_err(|e| CoreError::Internal(format!("동기화 로그 저장 실패: {e}")))?;
        Ok(())
    }

    async fn recent_logs(&self, limit: usize) -> Result<Vec<SyncLog>, CoreError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, sync_time, records_fetched, new_records, status, errors
                 FROM sync_logs ORDER BY id DESC LIMIT ?1",
            )
            .map_err(|e| CoreError::Internal(format!("쿼리 준비 실패: {e}")))?;

        let rows = stmt
            .query_map([limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })
            .map_err(|e| CoreError::Internal(format!("동기화 로그 조회 실패: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CoreError::Internal(format!("동기화 로그 행 변환 실패: {e}")))?;

        rows.into_iter()
            .map(|(id, sync_time, records_fetched, new_records, status, errors)| {
                Ok(SyncLog {
                    id,
                    sync_time: parse_ts(&sync_time)?,
                    records_fetched,
                    new_records,
                    status,
                    errors,
                })
            })
            .collect()
    }
}
