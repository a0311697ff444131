//! 일일 출석 현황 스토리지 (DailyStore 포트 구현).
//!
//! (학생, 날짜)당 한 행 upsert. 상태 전이는 동기화기가 결정한다.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use chulgyeol_core::error::CoreError;
use chulgyeol_core::models::daily::{DailyAttendance, DailyStatus};
use chulgyeol_core::ports::store::DailyStore;
use tracing::info;

use super::{date_str, parse_time, time_str, SqliteStorage};

fn row_to_daily(row: &rusqlite::Row<'_>) -> rusqlite::Result<DailyAttendance> {
    let date_raw: String = row.get(2)?;
    let status_raw: String = row.get(3)?;

    let date = NaiveDate::parse_from_str(&date_raw, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let status = DailyStatus::parse(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("알 수 없는 출석 상태: {status_raw}").into(),
        )
    })?;

    Ok(DailyAttendance {
        id: row.get(0)?,
        student_id: row.get(1)?,
        date,
        status,
        check_in_time: row.get::<_, Option<String>>(4)?.and_then(|t| parse_time(&t)),
        check_out_time: row.get::<_, Option<String>>(5)?.and_then(|t| parse_time(&t)),
    })
}

#[async_trait]
impl DailyStore for SqliteStorage {
    async fn get_daily(
        &self,
        student_id: i64,
        date: NaiveDate,
    ) -> Result<Option<DailyAttendance>, CoreError> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT id, student_id, date, status, check_in_time, check_out_time
             FROM daily_attendance WHERE student_id = ?1 AND date = ?2",
            rusqlite::params![student_id, date_str(date)],
            row_to_daily,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(CoreError::Internal(format!("출석 현황 조회 실패: {other}"))),
        })
    }

    async fn create_daily(
        &self,
        student_id: i64,
        date: NaiveDate,
        status: DailyStatus,
        check_in: NaiveTime,
    ) -> Result<bool, CoreError> {
        let conn = self.lock_conn()?;
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO daily_attendance
                    (student_id, date, status, check_in_time)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    student_id,
                    date_str(date),
                    status.as_str(),
                    time_str(check_in)
                ],
            )
            .map_err(|e| CoreError::Internal(format!("출석 현황 생성 실패: {e}")))?;
        Ok(changed == 1)
    }

    async fn set_status(
        &self,
        student_id: i64,
        date: NaiveDate,
        status: DailyStatus,
    ) -> Result<(), CoreError> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE daily_attendance SET status = ?3 WHERE student_id = ?1 AND date = ?2",
            rusqlite::params![student_id, date_str(date), status.as_str()],
        )
        .map_err(|e| CoreError::Internal(format!("출석 상태 변경 실패: {e}")))?;
        Ok(())
    }

    async fn set_check_out(
        &self,
        student_id: i64,
        date: NaiveDate,
        check_out: NaiveTime,
    ) -> Result<(), CoreError> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE daily_attendance SET check_out_time = ?3
             WHERE student_id = ?1 AND date = ?2",
            rusqlite::params![student_id, date_str(date), time_str(check_out)],
        )
        .map_err(|e| CoreError::Internal(format!("하원 시각 기록 실패: {e}")))?;
        Ok(())
    }

    async fn convert_late_to_studying(&self, date: NaiveDate) -> Result<usize, CoreError> {
        let conn = self.lock_conn()?;
        let changed = conn
            .execute(
                "UPDATE daily_attendance SET status = ?3
                 WHERE date = ?1 AND status = ?2",
                rusqlite::params![
                    date_str(date),
                    DailyStatus::Late.as_str(),
                    DailyStatus::Studying.as_str()
                ],
            )
            .map_err(|e| CoreError::Internal(format!("지각 상태 전환 실패: {e}")))?;

        if changed > 0 {
            info!("지각 → 자습중 전환: {changed}명");
        }
        Ok(changed)
    }
}
