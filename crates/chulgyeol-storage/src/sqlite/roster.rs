//! 명부 스토리지 (RosterStore 포트 구현).
//!
//! 학생 매칭과 정기외출 규칙 조회. 명부 데이터의 소유권은 외부
//! 명부 시스템에 있고 여기서는 읽기 + 시드만 지원한다.

use async_trait::async_trait;
use chrono::NaiveTime;
use chulgyeol_core::error::CoreError;
use chulgyeol_core::models::roster::{RecurringOutingRule, Student, STUDENT_ACTIVE};
use chulgyeol_core::ports::store::RosterStore;

use super::{parse_time, SqliteStorage};

const STUDENT_COLUMNS: &str = "id, name, seat_number, phone, parent_phone, status";

fn row_to_student(row: &rusqlite::Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        name: row.get(1)?,
        seat_number: row.get(2)?,
        phone: row.get(3)?,
        parent_phone: row.get(4)?,
        status: row.get(5)?,
    })
}

fn row_to_rule(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecurringOutingRule> {
    let start_raw: String = row.get(3)?;
    let end_raw: String = row.get(4)?;
    let parse = |idx: usize, raw: &str| {
        parse_time(raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                format!("시각 형식 오류: {raw}").into(),
            )
        })
    };

    Ok(RecurringOutingRule {
        id: row.get(0)?,
        student_id: row.get(1)?,
        day_of_week: row.get::<_, i64>(2)? as u8,
        start_time: parse(3, &start_raw)?,
        end_time: parse(4, &end_raw)?,
        reason: row.get(5)?,
        is_active: row.get::<_, i64>(6)? != 0,
    })
}

impl SqliteStorage {
    /// 학생 시드 (명부 미러 채우기 — 테스트/초기 적재용)
    pub fn insert_student(
        &self,
        name: &str,
        seat_number: Option<&str>,
        phone: Option<&str>,
        parent_phone: Option<&str>,
    ) -> Result<i64, CoreError> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO students (name, seat_number, phone, parent_phone, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![name, seat_number, phone, parent_phone, STUDENT_ACTIVE],
        )
        .map_err(|e| CoreError::Internal(format!("학생 저장 실패: {e}")))?;
        Ok(conn.last_insert_rowid())
    }

    /// 정기외출 규칙 시드
    pub fn insert_recurring_rule(
        &self,
        student_id: i64,
        day_of_week: u8,
        start_time: NaiveTime,
        end_time: NaiveTime,
        reason: &str,
    ) -> Result<i64, CoreError> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO recurring_outings (student_id, day_of_week, start_time, end_time, reason)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                student_id,
                day_of_week as i64,
                start_time.format("%H:%M").to_string(),
                end_time.format("%H:%M").to_string(),
                reason
            ],
        )
        .map_err(|e| CoreError::Internal(format!("정기외출 규칙 저장 실패: {e}")))?;
        Ok(conn.last_insert_rowid())
    }
}

#[async_trait]
impl RosterStore for SqliteStorage {
    async fn match_student(
        &self,
        name: &str,
        phone: &str,
    ) -> Result<Option<Student>, CoreError> {
        let conn = self.lock_conn()?;

        // 이름 정확 일치 우선
        let by_name = conn
            .query_row(
                &format!(
                    "SELECT {STUDENT_COLUMNS} FROM students
                     WHERE name = ?1 AND status = ?2 LIMIT 1"
                ),
                rusqlite::params![name, STUDENT_ACTIVE],
                row_to_student,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(CoreError::Internal(format!("학생 매칭 실패: {other}"))),
            })?;

        if by_name.is_some() {
            return Ok(by_name);
        }

        // 전화번호 뒤 4자리 포함 일치 (학생/학부모 번호)
        let clean: String = phone.chars().filter(char::is_ascii_digit).collect();
        if clean.len() < 4 {
            return Ok(None);
        }
        let last4 = &clean[clean.len() - 4..];

        conn.query_row(
            &format!(
                "SELECT {STUDENT_COLUMNS} FROM students
                 WHERE status = ?1
                   AND (REPLACE(COALESCE(phone, ''), '-', '') LIKE '%' || ?2 || '%'
                        OR REPLACE(COALESCE(parent_phone, ''), '-', '') LIKE '%' || ?2 || '%')
                 LIMIT 1"
            ),
            rusqlite::params![STUDENT_ACTIVE, last4],
            row_to_student,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(CoreError::Internal(format!("전화번호 매칭 실패: {other}"))),
        })
    }

    async fn get_student(&self, id: i64) -> Result<Option<Student>, CoreError> {
        let conn = self.lock_conn()?;
        conn.query_row(
            &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?1"),
            [id],
            row_to_student,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(CoreError::Internal(format!("학생 조회 실패: {other}"))),
        })
    }

    async fn find_active_rule(
        &self,
        student_id: i64,
        day_of_week: u8,
        at: NaiveTime,
    ) -> Result<Option<RecurringOutingRule>, CoreError> {
        let conn = self.lock_conn()?;
        let at_str = at.format("%H:%M").to_string();

        conn.query_row(
            "SELECT id, student_id, day_of_week, start_time, end_time, reason, is_active
             FROM recurring_outings
             WHERE student_id = ?1 AND day_of_week = ?2 AND is_active = 1
               AND start_time <= ?3 AND end_time >= ?3
             LIMIT 1",
            rusqlite::params![student_id, day_of_week as i64, at_str],
            row_to_rule,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(CoreError::Internal(format!("정기외출 규칙 조회 실패: {other}"))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn match_by_exact_name() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let id = storage
            .insert_student("김철수", Some("A-12"), Some("010-1234-5678"), None)
            .unwrap();

        let student = storage
            .match_student("김철수", "")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(student.id, id);
        assert_eq!(student.seat_label(), "A-12");
    }

    #[tokio::test]
    async fn match_by_phone_last4() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage
            .insert_student("김철수", None, Some("010-1234-5678"), None)
            .unwrap();

        // 키오스크에 다른 표기의 이름이 떠도 전화번호로 매칭
        let student = storage
            .match_student("김 철수", "010-9999-5678")
            .await
            .unwrap();
        assert!(student.is_some());

        // 학부모 번호도 대상
        storage
            .insert_student("이영희", None, None, Some("010-8888-4321"))
            .unwrap();
        let by_parent = storage
            .match_student("이 영희", "010-0000-4321")
            .await
            .unwrap();
        assert!(by_parent.is_some());
    }

    #[tokio::test]
    async fn unmatched_returns_none() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        assert!(storage
            .match_student("없는학생", "010-0000-0000")
            .await
            .unwrap()
            .is_none());
        // 번호가 너무 짧으면 전화번호 매칭도 건너뜀
        assert!(storage.match_student("없는학생", "12").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn active_rule_lookup() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let student_id = storage.insert_student("김철수", None, None, None).unwrap();
        storage
            .insert_recurring_rule(student_id, 2, hm(13, 0), hm(14, 30), "주 1회 과외")
            .unwrap();

        // 수요일(2) 13:30 — 규칙 창 안
        let rule = storage
            .find_active_rule(student_id, 2, hm(13, 30))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rule.reason, "주 1회 과외");
        assert_eq!(rule.end_time, hm(14, 30));

        // 창 밖 시각, 다른 요일은 미해당
        assert!(storage
            .find_active_rule(student_id, 2, hm(15, 0))
            .await
            .unwrap()
            .is_none());
        assert!(storage
            .find_active_rule(student_id, 3, hm(13, 30))
            .await
            .unwrap()
            .is_none());
    }
}
