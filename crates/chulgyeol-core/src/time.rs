//! 캠퍼스 로컬 시간(KST) 유틸리티.
//!
//! 키오스크 기록 시각은 전부 한국 표준시 벽시계 기준이다.
//! 고정 오프셋(UTC+9)이라 DST 전환이 없고, 로컬 변환은 항상 단일 값이다.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// KST 고정 오프셋 (UTC+9)
pub fn kst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).expect("KST 오프셋은 항상 유효")
}

/// 현재 KST 시각
pub fn now_kst() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&kst())
}

/// 오늘 날짜 (KST 기준)
pub fn today_kst() -> NaiveDate {
    now_kst().date_naive()
}

/// 날짜 + 시각을 KST 시각으로 결합
pub fn at(date: NaiveDate, time: NaiveTime) -> DateTime<FixedOffset> {
    date.and_time(time)
        .and_local_timezone(kst())
        .single()
        .expect("고정 오프셋 변환은 항상 단일 값")
}

/// 해당 날짜의 시작(00:00:00)과 끝(23:59:59) 시각
pub fn day_bounds(date: NaiveDate) -> (DateTime<FixedOffset>, DateTime<FixedOffset>) {
    let start = NaiveTime::from_hms_opt(0, 0, 0).expect("유효한 시각");
    let end = NaiveTime::from_hms_opt(23, 59, 59).expect("유효한 시각");
    (at(date, start), at(date, end))
}

/// 요일 인덱스 (0=월요일 .. 6=일요일, 정기외출 규칙과 동일 기준)
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_monday() as u8
}

/// 키오스크 기록 시각 문자열 파싱.
///
/// 전체 타임스탬프(`2025-12-03 14:30:00`), RFC3339, 시각만(`14:30`,
/// `14:30:00` — 오늘 날짜로 해석) 세 형식을 허용한다.
/// 파싱 불가능한 행은 건너뛰므로 `Option`을 반환한다.
pub fn parse_record_time(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return dt.and_local_timezone(kst()).single();
    }

    // 워커가 isoformat으로 저장하는 경우
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&kst()));
    }

    let time = NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()?;
    today_kst().and_time(time).and_local_timezone(kst()).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parse_full_timestamp() {
        let dt = parse_record_time("2025-12-03 14:30:00").unwrap();
        assert_eq!(dt.date_naive(), NaiveDate::from_ymd_opt(2025, 12, 3).unwrap());
        assert_eq!(dt.hour(), 14);
        assert_eq!(dt.offset().local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn parse_rfc3339() {
        let dt = parse_record_time("2025-12-03T14:30:00+09:00").unwrap();
        assert_eq!(dt.hour(), 14);
    }

    #[test]
    fn parse_bare_time_assumes_today() {
        let dt = parse_record_time("14:30").unwrap();
        assert_eq!(dt.date_naive(), today_kst());
        assert_eq!((dt.hour(), dt.minute()), (14, 30));

        let dt = parse_record_time("07:05:30").unwrap();
        assert_eq!(dt.second(), 30);
    }

    #[test]
    fn parse_garbage_returns_none() {
        assert!(parse_record_time("").is_none());
        assert!(parse_record_time("어제쯤").is_none());
        assert!(parse_record_time("25:99").is_none());
    }

    #[test]
    fn weekday_index_monday_is_zero() {
        // 2025-12-01은 월요일
        let monday = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        assert_eq!(weekday_index(monday), 0);
        assert_eq!(weekday_index(monday + chrono::Duration::days(6)), 6);
    }

    #[test]
    fn day_bounds_cover_whole_day() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 3).unwrap();
        let (start, end) = day_bounds(date);
        assert!(start < end);
        assert_eq!(start.date_naive(), date);
        assert_eq!(end.date_naive(), date);
    }
}
