//! 스키마 마이그레이션.
//!
//! 버전 기반 SQLite 스키마 관리.

use rusqlite::Connection;
use tracing::{debug, info};

/// 현재 스키마 버전
const CURRENT_VERSION: u32 = 3;

/// 스키마 마이그레이션 실행
pub fn run_migrations(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current = get_version(conn)?;
    info!("현재 스키마 버전: {current}, 목표: {CURRENT_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }

    if current < 2 {
        migrate_v2(conn)?;
    }

    if current < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

/// 현재 스키마 버전 조회
fn get_version(conn: &Connection) -> Result<u32, rusqlite::Error> {
    let result: Result<u32, _> = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    );
    result.or(Ok(0))
}

/// V1: 명부 미러 + 출결 이벤트 + 동기화 로그
fn migrate_v1(conn: &Connection) -> Result<(), rusqlite::Error> {
    debug!("마이그레이션 V1 실행: students + kiosk_events + sync_logs");

    conn.execute_batch(
        "
        -- 명부 미러 (소유권은 명부 시스템)
        CREATE TABLE IF NOT EXISTS students (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            seat_number TEXT,
            phone TEXT,
            parent_phone TEXT,
            status TEXT NOT NULL DEFAULT '재원'
        );

        CREATE INDEX IF NOT EXISTS idx_students_name ON students(name);

        -- 학생별 주간 정기외출 규칙
        CREATE TABLE IF NOT EXISTS recurring_outings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL REFERENCES students(id),
            day_of_week INTEGER NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            reason TEXT NOT NULL DEFAULT '',
            is_active INTEGER NOT NULL DEFAULT 1
        );

        CREATE INDEX IF NOT EXISTS idx_recurring_student_day
            ON recurring_outings(student_id, day_of_week);

        -- 재조정 완료된 출결 이벤트
        CREATE TABLE IF NOT EXISTS kiosk_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_name TEXT NOT NULL,
            phone TEXT,
            available_time TEXT,
            status TEXT NOT NULL,
            status_detail TEXT,
            record_time TEXT NOT NULL,
            local_student_id INTEGER,
            is_late INTEGER NOT NULL DEFAULT 0,
            expected_return_time TEXT,
            return_event_id INTEGER,
            schedule_valid INTEGER,
            valid_reason TEXT,
            notified INTEGER NOT NULL DEFAULT 0,
            synced_local INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_kiosk_events_name_time
            ON kiosk_events(student_name, record_time);
        CREATE INDEX IF NOT EXISTS idx_kiosk_events_record_time
            ON kiosk_events(record_time);
        CREATE INDEX IF NOT EXISTS idx_kiosk_events_status
            ON kiosk_events(status);

        -- 동기화 로그
        CREATE TABLE IF NOT EXISTS sync_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sync_time TEXT NOT NULL,
            records_fetched INTEGER NOT NULL DEFAULT 0,
            new_records INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'success',
            errors TEXT
        );

        INSERT INTO schema_version (version) VALUES (1);
        ",
    )?;

    info!("마이그레이션 V1 완료");
    Ok(())
}

/// V2: 일일 출석 현황 투영 테이블
fn migrate_v2(conn: &Connection) -> Result<(), rusqlite::Error> {
    debug!("마이그레이션 V2 실행: daily_attendance 테이블");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS daily_attendance (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL REFERENCES students(id),
            date TEXT NOT NULL,
            status TEXT NOT NULL,
            check_in_time TEXT,
            check_out_time TEXT,
            UNIQUE(student_id, date)
        );

        CREATE INDEX IF NOT EXISTS idx_daily_date ON daily_attendance(date);

        INSERT INTO schema_version (version) VALUES (2);
        ",
    )?;

    info!("마이그레이션 V2 완료");
    Ok(())
}

/// V3: 미복귀 스위퍼용 컬럼 + 인덱스
fn migrate_v3(conn: &Connection) -> Result<(), rusqlite::Error> {
    debug!("마이그레이션 V3 실행: kiosk_events.return_alert_sent 컬럼 추가");

    conn.execute_batch(
        "
        ALTER TABLE kiosk_events ADD COLUMN return_alert_sent INTEGER NOT NULL DEFAULT 0;

        CREATE INDEX IF NOT EXISTS idx_kiosk_events_open_outings
            ON kiosk_events(status, return_event_id, return_alert_sent);

        INSERT INTO schema_version (version) VALUES (3);
        ",
    )?;

    info!("마이그레이션 V3 완료");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn all_tables_exist() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for table in [
            "students",
            "recurring_outings",
            "kiosk_events",
            "sync_logs",
            "daily_attendance",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "{table} 테이블 없음");
        }
    }
}
