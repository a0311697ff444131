//! 재조정 이벤트 스토리지 (EventStore 포트 구현).
//!
//! 1분 단위 중복 제거 삽입, 복귀 연결, 알림 플래그 CAS, 스위퍼 조회.

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use chulgyeol_core::error::CoreError;
use chulgyeol_core::models::event::{AttendanceEvent, EventKind, NewAttendanceEvent, OutingReason};
use chulgyeol_core::ports::store::{DaySummary, EventStore};
use chulgyeol_core::time::day_bounds;
use tracing::debug;

use super::{ts, SqliteStorage};

/// SELECT 공통 컬럼 목록 — `row_to_event`의 인덱스와 1:1 대응
const EVENT_COLUMNS: &str = "id, student_name, phone, available_time, status, status_detail, \
     record_time, local_student_id, is_late, expected_return_time, return_event_id, \
     schedule_valid, valid_reason, notified, return_alert_sent, synced_local";

fn parse_column_ts(
    idx: usize,
    raw: &str,
) -> Result<DateTime<FixedOffset>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<AttendanceEvent> {
    let record_time_raw: String = row.get(6)?;
    let expected_raw: Option<String> = row.get(9)?;

    let expected_return_time = match expected_raw {
        Some(raw) => Some(parse_column_ts(9, &raw)?),
        None => None,
    };

    Ok(AttendanceEvent {
        id: row.get(0)?,
        student_name: row.get(1)?,
        phone: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        available_time: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        kind: EventKind::parse(&row.get::<_, String>(4)?),
        detail: row
            .get::<_, Option<String>>(5)?
            .map(|d| OutingReason::parse(&d)),
        record_time: parse_column_ts(6, &record_time_raw)?,
        local_student_id: row.get(7)?,
        is_late: row.get::<_, i64>(8)? != 0,
        expected_return_time,
        return_event_id: row.get(10)?,
        schedule_valid: row.get::<_, Option<i64>>(11)?.map(|v| v != 0),
        valid_reason: row.get(12)?,
        notified: row.get::<_, i64>(13)? != 0,
        return_alert_sent: row.get::<_, i64>(14)? != 0,
        synced_local: row.get::<_, i64>(15)? != 0,
    })
}

#[async_trait]
impl EventStore for SqliteStorage {
    async fn insert_event(&self, event: &NewAttendanceEvent) -> Result<Option<i64>, CoreError> {
        let conn = self.lock_conn()?;

        // 1분 단위 유일성 — 같은 표를 매 틱 재관측하므로 중복이 정상 경로
        let window_start = ts(&(event.record_time - Duration::seconds(60)));
        let window_end = ts(&(event.record_time + Duration::seconds(60)));

        let duplicate: Option<i64> = conn
            .query_row(
                "SELECT id FROM kiosk_events
                 WHERE student_name = ?1 AND status = ?2
                   AND record_time >= ?3 AND record_time <= ?4
                 LIMIT 1",
                rusqlite::params![
                    event.student_name,
                    event.kind.as_str(),
                    window_start,
                    window_end
                ],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(CoreError::Internal(format!("중복 검사 실패: {other}"))),
            })?;

        if duplicate.is_some() {
            debug!(
                "중복 이벤트 무시: {} {} {}",
                event.student_name,
                event.kind,
                event.record_time.format("%H:%M")
            );
            return Ok(None);
        }

        conn.execute(
            "INSERT INTO kiosk_events
                (student_name, phone, available_time, status, status_detail, record_time,
                 local_student_id, is_late, expected_return_time, schedule_valid, valid_reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            rusqlite::params![
                event.student_name,
                event.phone,
                event.available_time,
                event.kind.as_str(),
                event.detail.as_ref().map(|d| d.as_str().to_string()),
                ts(&event.record_time),
                event.local_student_id,
                event.is_late as i64,
                event.expected_return_time.as_ref().map(ts),
                event.schedule_valid.map(i64::from),
                event.valid_reason,
            ],
        )
        .map_err(|e| CoreError::Internal(format!("이벤트 저장 실패: {e}")))?;

        Ok(Some(conn.last_insert_rowid()))
    }

    async fn get_event(&self, id: i64) -> Result<Option<AttendanceEvent>, CoreError> {
        let conn = self.lock_conn()?;
        conn.query_row(
            &format!("SELECT {EVENT_COLUMNS} FROM kiosk_events WHERE id = ?1"),
            [id],
            row_to_event,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(CoreError::Internal(format!("이벤트 조회 실패: {other}"))),
        })
    }

    async fn has_entry_on(&self, student_name: &str, date: NaiveDate) -> Result<bool, CoreError> {
        let (start, end) = day_bounds(date);
        let conn = self.lock_conn()?;

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM kiosk_events
                 WHERE student_name = ?1 AND status IN ('입장', '재입장')
                   AND record_time >= ?2 AND record_time <= ?3",
                rusqlite::params![student_name, ts(&start), ts(&end)],
                |row| row.get(0),
            )
            .map_err(|e| CoreError::Internal(format!("입장 기록 조회 실패: {e}")))?;

        Ok(count > 0)
    }

    async fn find_open_outing(
        &self,
        student_name: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceEvent>, CoreError> {
        let (start, end) = day_bounds(date);
        let conn = self.lock_conn()?;

        conn.query_row(
            &format!(
                "SELECT {EVENT_COLUMNS} FROM kiosk_events
                 WHERE student_name = ?1 AND status IN ('외출', '이동')
                   AND return_event_id IS NULL
                   AND record_time >= ?2 AND record_time <= ?3
                 ORDER BY record_time DESC
                 LIMIT 1"
            ),
            rusqlite::params![student_name, ts(&start), ts(&end)],
            row_to_event,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(CoreError::Internal(format!("외출 기록 조회 실패: {other}"))),
        })
    }

    async fn link_return(&self, outing_id: i64, return_event_id: i64) -> Result<(), CoreError> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE kiosk_events SET return_event_id = ?2 WHERE id = ?1",
            [outing_id, return_event_id],
        )
        .map_err(|e| CoreError::Internal(format!("복귀 연결 실패: {e}")))?;
        Ok(())
    }

    async fn mark_late(&self, event_id: i64) -> Result<(), CoreError> {
        let conn = self.lock_conn()?;
        conn.execute("UPDATE kiosk_events SET is_late = 1 WHERE id = ?1", [event_id])
            .map_err(|e| CoreError::Internal(format!("지각 표시 실패: {e}")))?;
        Ok(())
    }

    async fn try_mark_notified(&self, event_id: i64) -> Result<bool, CoreError> {
        let conn = self.lock_conn()?;
        let changed = conn
            .execute(
                "UPDATE kiosk_events SET notified = 1 WHERE id = ?1 AND notified = 0",
                [event_id],
            )
            .map_err(|e| CoreError::Internal(format!("알림 플래그 갱신 실패: {e}")))?;
        Ok(changed == 1)
    }

    async fn try_mark_return_alerted(&self, event_id: i64) -> Result<bool, CoreError> {
        let conn = self.lock_conn()?;
        let changed = conn
            .execute(
                "UPDATE kiosk_events SET return_alert_sent = 1
                 WHERE id = ?1 AND return_alert_sent = 0",
                [event_id],
            )
            .map_err(|e| CoreError::Internal(format!("미복귀 알림 플래그 갱신 실패: {e}")))?;
        Ok(changed == 1)
    }

    async fn mark_synced(&self, event_id: i64) -> Result<(), CoreError> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE kiosk_events SET synced_local = 1 WHERE id = ?1",
            [event_id],
        )
        .map_err(|e| CoreError::Internal(format!("동기화 플래그 갱신 실패: {e}")))?;
        Ok(())
    }

    async fn overdue_outings(
        &self,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<AttendanceEvent>, CoreError> {
        let conn = self.lock_conn()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM kiosk_events
                 WHERE status IN ('외출', '이동')
                   AND return_event_id IS NULL
                   AND return_alert_sent = 0
                   AND expected_return_time IS NOT NULL
                   AND expected_return_time < ?1
                 ORDER BY expected_return_time ASC"
            ))
            .map_err(|e| CoreError::Internal(format!("쿼리 준비 실패: {e}")))?;

        let events = stmt
            .query_map([ts(&now)], row_to_event)
            .map_err(|e| CoreError::Internal(format!("미복귀 조회 실패: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CoreError::Internal(format!("미복귀 행 변환 실패: {e}")))?;

        Ok(events)
    }

    async fn forced_exits_on(&self, date: NaiveDate) -> Result<Vec<AttendanceEvent>, CoreError> {
        let (start, end) = day_bounds(date);
        let conn = self.lock_conn()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM kiosk_events
                 WHERE status = '강제퇴장'
                   AND record_time >= ?1 AND record_time <= ?2
                 ORDER BY record_time ASC"
            ))
            .map_err(|e| CoreError::Internal(format!("쿼리 준비 실패: {e}")))?;

        let events = stmt
            .query_map(rusqlite::params![ts(&start), ts(&end)], row_to_event)
            .map_err(|e| CoreError::Internal(format!("강제퇴장 조회 실패: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CoreError::Internal(format!("강제퇴장 행 변환 실패: {e}")))?;

        Ok(events)
    }

    async fn events_on(
        &self,
        date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<AttendanceEvent>, CoreError> {
        let (start, end) = day_bounds(date);
        let conn = self.lock_conn()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM kiosk_events
                 WHERE record_time >= ?1 AND record_time <= ?2
                 ORDER BY record_time DESC
                 LIMIT ?3"
            ))
            .map_err(|e| CoreError::Internal(format!("쿼리 준비 실패: {e}")))?;

        let events = stmt
            .query_map(
                rusqlite::params![ts(&start), ts(&end), limit as i64],
                row_to_event,
            )
            .map_err(|e| CoreError::Internal(format!("이벤트 조회 실패: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CoreError::Internal(format!("이벤트 행 변환 실패: {e}")))?;

        Ok(events)
    }

    async fn day_summary(&self, date: NaiveDate) -> Result<DaySummary, CoreError> {
        let (start, end) = day_bounds(date);
        let (start, end) = (ts(&start), ts(&end));
        let conn = self.lock_conn()?;

        let count = |sql: &str| -> Result<i64, CoreError> {
            conn.query_row(sql, rusqlite::params![start, end], |row| row.get(0))
                .map_err(|e| CoreError::Internal(format!("요약 조회 실패: {e}")))
        };

        Ok(DaySummary {
            entry_count: count(
                "SELECT COUNT(*) FROM kiosk_events
                 WHERE record_time >= ?1 AND record_time <= ?2 AND status = '입장'",
            )?,
            exit_count: count(
                "SELECT COUNT(*) FROM kiosk_events
                 WHERE record_time >= ?1 AND record_time <= ?2
                   AND status IN ('퇴장', '강제퇴장')",
            )?,
            late_count: count(
                "SELECT COUNT(*) FROM kiosk_events
                 WHERE record_time >= ?1 AND record_time <= ?2
                   AND status = '입장' AND is_late = 1",
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use chulgyeol_core::time::at;

    fn kst_at(h: u32, m: u32) -> DateTime<FixedOffset> {
        let date = NaiveDate::from_ymd_opt(2025, 12, 3).unwrap();
        at(date, chrono::NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    fn new_event(name: &str, kind: EventKind, h: u32, m: u32) -> NewAttendanceEvent {
        NewAttendanceEvent {
            student_name: name.to_string(),
            phone: "010-1234-5678".to_string(),
            available_time: "05:00-23:59".to_string(),
            kind,
            detail: None,
            record_time: kst_at(h, m),
            local_student_id: None,
            is_late: false,
            expected_return_time: None,
            schedule_valid: None,
            valid_reason: None,
        }
    }

    #[tokio::test]
    async fn insert_and_get() {
        let storage = SqliteStorage::open_in_memory().unwrap();

        let id = storage
            .insert_event(&new_event("김철수", EventKind::Entry, 8, 5))
            .await
            .unwrap()
            .unwrap();

        let loaded = storage.get_event(id).await.unwrap().unwrap();
        assert_eq!(loaded.student_name, "김철수");
        assert_eq!(loaded.kind, EventKind::Entry);
        assert_eq!(loaded.record_time, kst_at(8, 5));
        assert!(!loaded.notified);
    }

    #[tokio::test]
    async fn duplicate_within_minute_is_ignored() {
        let storage = SqliteStorage::open_in_memory().unwrap();

        let first = storage
            .insert_event(&new_event("김철수", EventKind::Entry, 8, 5))
            .await
            .unwrap();
        assert!(first.is_some());

        // 같은 (이름, 상태, 분) — 무시
        let dup = storage
            .insert_event(&new_event("김철수", EventKind::Entry, 8, 5))
            .await
            .unwrap();
        assert!(dup.is_none());

        // 상태가 다르면 별개 이벤트
        let other = storage
            .insert_event(&new_event("김철수", EventKind::Outing, 8, 5))
            .await
            .unwrap();
        assert!(other.is_some());

        // 2분 뒤 같은 상태는 별개 물리 이벤트
        let later = storage
            .insert_event(&new_event("김철수", EventKind::Entry, 8, 8))
            .await
            .unwrap();
        assert!(later.is_some());
    }

    #[tokio::test]
    async fn idempotent_batch_replay() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 12, 3).unwrap();

        // 같은 배치 3회 재주입 → 이벤트는 2건만
        for _ in 0..3 {
            storage
                .insert_event(&new_event("김철수", EventKind::Entry, 8, 5))
                .await
                .unwrap();
            storage
                .insert_event(&new_event("이영희", EventKind::Entry, 7, 50))
                .await
                .unwrap();
        }

        let events = storage.events_on(date, 100).await.unwrap();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn has_entry_on_counts_entry_and_reentry() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 12, 3).unwrap();

        assert!(!storage.has_entry_on("김철수", date).await.unwrap());

        storage
            .insert_event(&new_event("김철수", EventKind::Entry, 8, 5))
            .await
            .unwrap();
        assert!(storage.has_entry_on("김철수", date).await.unwrap());

        // 다른 학생은 영향 없음
        assert!(!storage.has_entry_on("이영희", date).await.unwrap());
    }

    #[tokio::test]
    async fn open_outing_lookup_and_linking() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 12, 3).unwrap();

        let outing1 = storage
            .insert_event(&new_event("김철수", EventKind::Outing, 10, 5))
            .await
            .unwrap()
            .unwrap();
        let outing2 = storage
            .insert_event(&new_event("김철수", EventKind::Transfer, 15, 2))
            .await
            .unwrap()
            .unwrap();

        // 최신(15:02 이동)이 먼저 잡힘
        let open = storage
            .find_open_outing("김철수", date)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(open.id, outing2);

        let reentry = storage
            .insert_event(&new_event("김철수", EventKind::ReEntry, 15, 18))
            .await
            .unwrap()
            .unwrap();
        storage.link_return(outing2, reentry).await.unwrap();

        // 연결된 외출은 더 이상 열린 외출이 아님
        let open = storage
            .find_open_outing("김철수", date)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(open.id, outing1);

        let linked = storage.get_event(outing2).await.unwrap().unwrap();
        assert_eq!(linked.return_event_id, Some(reentry));
    }

    #[tokio::test]
    async fn notified_flag_cas() {
        let storage = SqliteStorage::open_in_memory().unwrap();

        let id = storage
            .insert_event(&new_event("김철수", EventKind::Entry, 8, 5))
            .await
            .unwrap()
            .unwrap();

        // 첫 호출만 true — 재시도 경합에서도 최대 1회
        assert!(storage.try_mark_notified(id).await.unwrap());
        assert!(!storage.try_mark_notified(id).await.unwrap());
    }

    #[tokio::test]
    async fn overdue_selection_and_alert_cas() {
        let storage = SqliteStorage::open_in_memory().unwrap();

        let mut outing = new_event("김철수", EventKind::Outing, 10, 5);
        outing.expected_return_time = Some(kst_at(10, 20));
        let id = storage.insert_event(&outing).await.unwrap().unwrap();

        // 예상 복귀 10분 경과
        let now = kst_at(10, 30);
        let overdue = storage.overdue_outings(now).await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, id);

        // 알림 플래그 CAS 후 두 번째 스윕에서는 제외
        assert!(storage.try_mark_return_alerted(id).await.unwrap());
        assert!(!storage.try_mark_return_alerted(id).await.unwrap());
        assert!(storage.overdue_outings(now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn overdue_excludes_linked_and_future() {
        let storage = SqliteStorage::open_in_memory().unwrap();

        // 복귀 연결된 외출
        let mut linked = new_event("이영희", EventKind::Outing, 10, 5);
        linked.expected_return_time = Some(kst_at(10, 20));
        let linked_id = storage.insert_event(&linked).await.unwrap().unwrap();
        let reentry = storage
            .insert_event(&new_event("이영희", EventKind::ReEntry, 10, 15))
            .await
            .unwrap()
            .unwrap();
        storage.link_return(linked_id, reentry).await.unwrap();

        // 예상 복귀가 아직 안 지난 외출
        let mut future = new_event("박민수", EventKind::Outing, 10, 25);
        future.expected_return_time = Some(kst_at(11, 0));
        storage.insert_event(&future).await.unwrap();

        assert!(storage.overdue_outings(kst_at(10, 30)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn forced_exits_and_day_summary() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 12, 3).unwrap();

        let mut entry = new_event("김철수", EventKind::Entry, 8, 5);
        entry.is_late = true;
        storage.insert_event(&entry).await.unwrap();
        storage
            .insert_event(&new_event("이영희", EventKind::Entry, 7, 50))
            .await
            .unwrap();
        storage
            .insert_event(&new_event("김철수", EventKind::ForcedExit, 22, 30))
            .await
            .unwrap();
        storage
            .insert_event(&new_event("이영희", EventKind::Exit, 22, 5))
            .await
            .unwrap();

        let forced = storage.forced_exits_on(date).await.unwrap();
        assert_eq!(forced.len(), 1);
        assert_eq!(forced[0].student_name, "김철수");

        let summary = storage.day_summary(date).await.unwrap();
        assert_eq!(summary.entry_count, 2);
        assert_eq!(summary.exit_count, 2);
        assert_eq!(summary.late_count, 1);
    }

    #[tokio::test]
    async fn schedule_fields_roundtrip() {
        let storage = SqliteStorage::open_in_memory().unwrap();

        let mut event = new_event("김철수", EventKind::Outing, 11, 30);
        event.detail = Some(OutingReason::Lunch);
        event.schedule_valid = Some(false);
        event.valid_reason = Some("점심시간(12:00~13:00) 외 시간에 점심식사 외출".to_string());
        let id = storage.insert_event(&event).await.unwrap().unwrap();

        let loaded = storage.get_event(id).await.unwrap().unwrap();
        assert_eq!(loaded.detail, Some(OutingReason::Lunch));
        assert_eq!(loaded.schedule_valid, Some(false));
        assert!(loaded.valid_reason.unwrap().contains("12:00~13:00"));
    }
}
