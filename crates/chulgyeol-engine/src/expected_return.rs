//! 예상 복귀 시각 계산.
//!
//! (주 상태, 상세 사유, 기록 시각, 정기외출 규칙)의 순수 함수.
//! 외출/이동이 아닌 이벤트는 복귀 개념이 없다.

use chrono::{DateTime, Duration, FixedOffset};
use chulgyeol_core::models::event::{EventKind, OutingReason};
use chulgyeol_core::models::roster::RecurringOutingRule;
use chulgyeol_core::time::at;
use chulgyeol_core::timetable::Timetable;

/// 식사 외출 기본 복귀 유예 (다음 교시가 없을 때)
const MEAL_FALLBACK_MINUTES: i64 = 60;
/// 쉬는시간 기본 복귀 유예
const BREAK_FALLBACK_MINUTES: i64 = 20;
/// 병원 진료 복귀 유예
const CLINIC_MINUTES: i64 = 60;
/// 학원수업/상담 복귀 유예
const LONG_ACTIVITY_MINUTES: i64 = 180;

/// 예상 복귀 시각 계산.
///
/// - 식사: 기록 시각 이후 다음 교시 시작 (없으면 +60분)
/// - 쉬는시간: 해당 쉬는시간 창의 끝 (창 밖이면 +20분)
/// - 정기외출: 규칙의 종료 시각 (규칙 없으면 None)
/// - 병원 진료: +60분, 학원수업/상담: +180분
/// - 그 외 (입장/재입장/퇴장 포함): None
pub fn expected_return(
    kind: &EventKind,
    detail: Option<&OutingReason>,
    record_time: DateTime<FixedOffset>,
    rule: Option<&RecurringOutingRule>,
    timetable: &Timetable,
) -> Option<DateTime<FixedOffset>> {
    if !kind.is_outing() {
        return None;
    }

    let date = record_time.date_naive();
    let time = record_time.time();

    match detail? {
        OutingReason::Lunch | OutingReason::Dinner => Some(
            timetable
                .next_period_start(time)
                .map(|start| at(date, start))
                .unwrap_or_else(|| record_time + Duration::minutes(MEAL_FALLBACK_MINUTES)),
        ),
        OutingReason::Break => Some(
            timetable
                .containing_break(time)
                .map(|brk| at(date, brk.end))
                .unwrap_or_else(|| record_time + Duration::minutes(BREAK_FALLBACK_MINUTES)),
        ),
        OutingReason::Regular => rule.map(|r| at(date, r.end_time)),
        OutingReason::Clinic => Some(record_time + Duration::minutes(CLINIC_MINUTES)),
        OutingReason::AcademyClass | OutingReason::Counseling => {
            Some(record_time + Duration::minutes(LONG_ACTIVITY_MINUTES))
        }
        OutingReason::Other(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn kst_at(h: u32, m: u32) -> DateTime<FixedOffset> {
        let date = NaiveDate::from_ymd_opt(2025, 12, 3).unwrap();
        at(date, NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    fn rule_until(h: u32, m: u32) -> RecurringOutingRule {
        RecurringOutingRule {
            id: 1,
            student_id: 1,
            day_of_week: 2,
            start_time: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(h, m, 0).unwrap(),
            reason: "과외".to_string(),
            is_active: true,
        }
    }

    #[test]
    fn lunch_resolves_to_next_period_start() {
        let tt = Timetable::default();
        let expected = expected_return(
            &EventKind::Outing,
            Some(&OutingReason::Lunch),
            kst_at(12, 10),
            None,
            &tt,
        );
        // 12:10 점심 외출 → 3교시 시작 13:00
        assert_eq!(expected, Some(kst_at(13, 0)));
    }

    #[test]
    fn dinner_after_last_period_falls_back() {
        let tt = Timetable::default();
        let expected = expected_return(
            &EventKind::Outing,
            Some(&OutingReason::Dinner),
            kst_at(21, 0),
            None,
            &tt,
        );
        // 21:00 이후 교시 없음 → +60분
        assert_eq!(expected, Some(kst_at(22, 0)));
    }

    #[test]
    fn break_resolves_to_window_end() {
        let tt = Timetable::default();
        let expected = expected_return(
            &EventKind::Outing,
            Some(&OutingReason::Break),
            kst_at(10, 5),
            None,
            &tt,
        );
        assert_eq!(expected, Some(kst_at(10, 20)));

        // 창 밖 쉬는시간 외출은 +20분
        let outside = expected_return(
            &EventKind::Outing,
            Some(&OutingReason::Break),
            kst_at(11, 0),
            None,
            &tt,
        );
        assert_eq!(outside, Some(kst_at(11, 20)));
    }

    #[test]
    fn regular_resolves_to_rule_end() {
        let tt = Timetable::default();
        let rule = rule_until(14, 30);
        let expected = expected_return(
            &EventKind::Outing,
            Some(&OutingReason::Regular),
            kst_at(13, 5),
            Some(&rule),
            &tt,
        );
        assert_eq!(expected, Some(kst_at(14, 30)));

        // 규칙 없으면 None
        let none = expected_return(
            &EventKind::Outing,
            Some(&OutingReason::Regular),
            kst_at(13, 5),
            None,
            &tt,
        );
        assert!(none.is_none());
    }

    #[test]
    fn fixed_durations() {
        let tt = Timetable::default();
        let clinic = expected_return(
            &EventKind::Outing,
            Some(&OutingReason::Clinic),
            kst_at(14, 0),
            None,
            &tt,
        );
        assert_eq!(clinic, Some(kst_at(15, 0)));

        let counseling = expected_return(
            &EventKind::Transfer,
            Some(&OutingReason::Counseling),
            kst_at(14, 0),
            None,
            &tt,
        );
        assert_eq!(counseling, Some(kst_at(17, 0)));
    }

    #[test]
    fn non_outing_kinds_have_no_return() {
        let tt = Timetable::default();
        for kind in [EventKind::Entry, EventKind::ReEntry, EventKind::Exit] {
            let result = expected_return(
                &kind,
                Some(&OutingReason::Lunch),
                kst_at(12, 10),
                None,
                &tt,
            );
            assert!(result.is_none(), "{kind}에 복귀 시각이 생기면 안 됨");
        }
    }

    #[test]
    fn unknown_detail_has_no_return() {
        let tt = Timetable::default();
        let other = OutingReason::Other("은행 업무".to_string());
        let result = expected_return(&EventKind::Outing, Some(&other), kst_at(14, 0), None, &tt);
        assert!(result.is_none());
    }
}
