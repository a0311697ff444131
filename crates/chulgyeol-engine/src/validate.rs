//! 일정 검증.
//!
//! 외출/퇴장 이벤트를 시간표와 정기외출 규칙에 대조한다.
//! 결과는 3상(유효/위반/해당없음) + 운영자용 사유 문자열.

use chrono::NaiveTime;
use chulgyeol_core::models::event::{OutingReason, ScheduleCheck};
use chulgyeol_core::models::roster::RecurringOutingRule;
use chulgyeol_core::timetable::Timetable;

/// 외출 일정 검증.
///
/// `student_id`는 명부 매칭 결과 — 정기외출 검증은 매칭된 학생이
/// 있어야 규칙을 찾을 수 있다. 미인식 사유는 해당없음.
pub fn validate_outing(
    detail: Option<&OutingReason>,
    time: NaiveTime,
    student_id: Option<i64>,
    rule: Option<&RecurringOutingRule>,
    timetable: &Timetable,
) -> ScheduleCheck {
    match detail {
        Some(OutingReason::Lunch) => {
            if timetable.lunch.contains(time) {
                ScheduleCheck::valid("")
            } else {
                ScheduleCheck::invalid(format!(
                    "점심시간({}) 외 시간에 점심식사 외출",
                    timetable.lunch.label()
                ))
            }
        }
        Some(OutingReason::Dinner) => {
            if timetable.dinner.contains(time) {
                ScheduleCheck::valid("")
            } else {
                ScheduleCheck::invalid(format!(
                    "저녁시간({}) 외 시간에 저녁식사 외출",
                    timetable.dinner.label()
                ))
            }
        }
        Some(OutingReason::Break) => {
            if timetable.containing_break(time).is_some() {
                ScheduleCheck::valid("")
            } else {
                ScheduleCheck::invalid("쉬는시간 외 시간에 쉬는시간 외출")
            }
        }
        Some(OutingReason::Regular) => match (student_id, rule) {
            (Some(_), Some(rule)) => {
                ScheduleCheck::valid(format!("정기외출: {}", rule.reason))
            }
            (Some(_), None) => ScheduleCheck::invalid("정기외출 일정 없음"),
            (None, _) => ScheduleCheck::invalid("학생 정보 없음"),
        },
        Some(OutingReason::Clinic) => {
            ScheduleCheck::valid("병원 진료 (1시간 내 복귀 확인)")
        }
        // 학원수업/상담/미인식 사유는 시간표 검증 대상이 아님
        _ => ScheduleCheck::not_applicable(),
    }
}

/// 퇴장 일정 검증.
///
/// 정규 하원 시각 이전 퇴장은 위반, 단 해당 시각을 덮는 활성
/// 정기외출 규칙이 있으면 상시 면제로 본다.
pub fn validate_exit(
    time: NaiveTime,
    rule: Option<&RecurringOutingRule>,
    timetable: &Timetable,
) -> ScheduleCheck {
    if time >= timetable.closing {
        return ScheduleCheck::valid("");
    }

    match rule {
        Some(rule) => ScheduleCheck::valid(format!("정기외출 일정 있음: {}", rule.reason)),
        None => ScheduleCheck::invalid(format!(
            "정규 하원시간({}) 이전 퇴장",
            timetable.closing.format("%H:%M")
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chulgyeol_core::models::event::ScheduleVerdict;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn rule(reason: &str) -> RecurringOutingRule {
        RecurringOutingRule {
            id: 1,
            student_id: 1,
            day_of_week: 2,
            start_time: hm(13, 0),
            end_time: hm(14, 30),
            reason: reason.to_string(),
            is_active: true,
        }
    }

    #[test]
    fn lunch_outside_window_is_invalid() {
        let tt = Timetable::default();
        let check = validate_outing(Some(&OutingReason::Lunch), hm(11, 30), Some(1), None, &tt);
        assert_eq!(check.verdict, ScheduleVerdict::Invalid);
        assert!(check.reason.contains("12:00~13:00"), "{}", check.reason);
    }

    #[test]
    fn lunch_inside_window_is_valid() {
        let tt = Timetable::default();
        let check = validate_outing(Some(&OutingReason::Lunch), hm(12, 15), Some(1), None, &tt);
        assert_eq!(check.verdict, ScheduleVerdict::Valid);
    }

    #[test]
    fn break_windows() {
        let tt = Timetable::default();
        let ok = validate_outing(Some(&OutingReason::Break), hm(10, 5), Some(1), None, &tt);
        assert_eq!(ok.verdict, ScheduleVerdict::Valid);

        let bad = validate_outing(Some(&OutingReason::Break), hm(11, 0), Some(1), None, &tt);
        assert_eq!(bad.verdict, ScheduleVerdict::Invalid);
    }

    #[test]
    fn regular_outing_requires_rule() {
        let tt = Timetable::default();
        let r = rule("주 1회 과외");

        let ok = validate_outing(Some(&OutingReason::Regular), hm(13, 30), Some(1), Some(&r), &tt);
        assert_eq!(ok.verdict, ScheduleVerdict::Valid);
        assert!(ok.reason.contains("주 1회 과외"));

        let no_rule = validate_outing(Some(&OutingReason::Regular), hm(13, 30), Some(1), None, &tt);
        assert_eq!(no_rule.verdict, ScheduleVerdict::Invalid);
        assert_eq!(no_rule.reason, "정기외출 일정 없음");

        let no_student = validate_outing(Some(&OutingReason::Regular), hm(13, 30), None, None, &tt);
        assert_eq!(no_student.verdict, ScheduleVerdict::Invalid);
        assert_eq!(no_student.reason, "학생 정보 없음");
    }

    #[test]
    fn clinic_is_always_valid() {
        let tt = Timetable::default();
        let check = validate_outing(Some(&OutingReason::Clinic), hm(3, 0), Some(1), None, &tt);
        assert_eq!(check.verdict, ScheduleVerdict::Valid);
    }

    #[test]
    fn unrecognized_detail_is_not_applicable() {
        let tt = Timetable::default();
        let other = OutingReason::Other("은행 업무".to_string());
        let check = validate_outing(Some(&other), hm(11, 0), Some(1), None, &tt);
        assert_eq!(check.verdict, ScheduleVerdict::NotApplicable);

        let none = validate_outing(None, hm(11, 0), Some(1), None, &tt);
        assert_eq!(none.verdict, ScheduleVerdict::NotApplicable);
    }

    #[test]
    fn exit_before_closing_is_invalid() {
        let tt = Timetable::default();
        let check = validate_exit(hm(20, 0), None, &tt);
        assert_eq!(check.verdict, ScheduleVerdict::Invalid);
        assert!(check.reason.contains("22:00"), "{}", check.reason);
    }

    #[test]
    fn exit_with_rule_is_exempt() {
        let tt = Timetable::default();
        let r = rule("병원 통원");
        let check = validate_exit(hm(13, 30), Some(&r), &tt);
        assert_eq!(check.verdict, ScheduleVerdict::Valid);
        assert!(check.reason.contains("병원 통원"));
    }

    #[test]
    fn exit_at_or_after_closing_is_valid() {
        let tt = Timetable::default();
        assert_eq!(validate_exit(hm(22, 0), None, &tt).verdict, ScheduleVerdict::Valid);
        assert_eq!(validate_exit(hm(22, 30), None, &tt).verdict, ScheduleVerdict::Valid);
    }
}
