//! 출결 이벤트 모델.
//!
//! 키오스크 원본 행(RawEvent)과 재조정 완료된 영속 이벤트(AttendanceEvent),
//! 주 상태·외출 사유·일정 검증 결과를 정의한다.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// 키오스크 원본 행 — 워커가 핸드오프 파일로 넘기는 일회성 데이터
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    /// 학생 이름
    pub student_name: String,
    /// 휴대폰번호
    pub phone: String,
    /// 입퇴실 가능 시간 (예: "05:00-23:59")
    pub available_time: String,
    /// 원본 상태 문자열 (예: "외출(점심식사)")
    pub status: String,
    /// 키오스크 기록 시각 (KST)
    pub record_time: DateTime<FixedOffset>,
}

/// 주 상태 — 키오스크 상태 문자열의 괄호 앞부분
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// 입장 (당일 첫 입장)
    Entry,
    /// 재입장 (외출/이동 후 복귀)
    ReEntry,
    /// 외출 (시설 밖으로 일시 이탈)
    Outing,
    /// 이동 (다른 감독 구역으로 이동)
    Transfer,
    /// 퇴장 (정상 하원)
    Exit,
    /// 강제퇴장 (퇴장 버튼 미클릭)
    ForcedExit,
    /// 파싱 불가능한 상태 문자열 전체
    Other(String),
}

impl EventKind {
    /// 키오스크 상태 문자열 → 주 상태
    pub fn parse(raw: &str) -> Self {
        match raw {
            "입장" => Self::Entry,
            "재입장" => Self::ReEntry,
            "외출" => Self::Outing,
            "이동" => Self::Transfer,
            "퇴장" => Self::Exit,
            "강제퇴장" => Self::ForcedExit,
            other => Self::Other(other.to_string()),
        }
    }

    /// DB 저장용 문자열
    pub fn as_str(&self) -> &str {
        match self {
            Self::Entry => "입장",
            Self::ReEntry => "재입장",
            Self::Outing => "외출",
            Self::Transfer => "이동",
            Self::Exit => "퇴장",
            Self::ForcedExit => "강제퇴장",
            Self::Other(s) => s,
        }
    }

    /// 외출 또는 이동 (복귀 추적 대상)
    pub fn is_outing(&self) -> bool {
        matches!(self, Self::Outing | Self::Transfer)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 외출 상세 사유 — 자유 텍스트에서 온 태그를 닫힌 enum으로 모델링.
/// 미인식 사유는 `Other`로 보존하고 일정 검증은 해당없음 처리한다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutingReason {
    /// 점심식사
    Lunch,
    /// 저녁식사
    Dinner,
    /// 쉬는시간
    Break,
    /// 정기외출 (주간 규칙 기반)
    Regular,
    /// 병원 진료
    Clinic,
    /// 7층 학원수업
    AcademyClass,
    /// 상담
    Counseling,
    /// 미인식 사유 원문
    Other(String),
}

impl OutingReason {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "점심식사" => Self::Lunch,
            "저녁식사" => Self::Dinner,
            "쉬는시간" => Self::Break,
            "정기외출" => Self::Regular,
            "병원 진료" => Self::Clinic,
            "7층 학원수업" => Self::AcademyClass,
            "상담" => Self::Counseling,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Lunch => "점심식사",
            Self::Dinner => "저녁식사",
            Self::Break => "쉬는시간",
            Self::Regular => "정기외출",
            Self::Clinic => "병원 진료",
            Self::AcademyClass => "7층 학원수업",
            Self::Counseling => "상담",
            Self::Other(s) => s,
        }
    }
}

impl std::fmt::Display for OutingReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 일정 검증 3상 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleVerdict {
    /// 시간표/규칙에 부합
    Valid,
    /// 시간표 밖 또는 규칙 없음
    Invalid,
    /// 검증 대상 아님 (입장류, 미인식 사유 등)
    NotApplicable,
}

/// 일정 검증 결과 + 운영자에게 보여줄 사유 문자열
#[derive(Debug, Clone)]
pub struct ScheduleCheck {
    pub verdict: ScheduleVerdict,
    pub reason: String,
}

impl ScheduleCheck {
    pub fn valid(reason: impl Into<String>) -> Self {
        Self {
            verdict: ScheduleVerdict::Valid,
            reason: reason.into(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            verdict: ScheduleVerdict::Invalid,
            reason: reason.into(),
        }
    }

    pub fn not_applicable() -> Self {
        Self {
            verdict: ScheduleVerdict::NotApplicable,
            reason: String::new(),
        }
    }

    /// DB 저장용 nullable bool (해당없음 → None)
    pub fn as_db_flag(&self) -> Option<bool> {
        match self.verdict {
            ScheduleVerdict::Valid => Some(true),
            ScheduleVerdict::Invalid => Some(false),
            ScheduleVerdict::NotApplicable => None,
        }
    }
}

/// 재조정 완료된 출결 이벤트 — 영속 행.
///
/// (student_name, kind, record_time)이 1분 단위로 유일하다.
/// 생성 후 삭제되지 않으며 linker/router/sweeper/synchronizer가
/// 각자의 플래그만 변경한다.
#[derive(Debug, Clone)]
pub struct AttendanceEvent {
    pub id: i64,
    pub student_name: String,
    pub phone: String,
    pub available_time: String,
    pub kind: EventKind,
    pub detail: Option<OutingReason>,
    pub record_time: DateTime<FixedOffset>,
    /// 명부 매칭 결과 (미매칭 이름도 기록은 보존)
    pub local_student_id: Option<i64>,
    /// 지각 여부 — 입장은 지각 기준, 재입장은 늦은 복귀
    pub is_late: bool,
    /// 외출/이동의 예상 복귀 시각
    pub expected_return_time: Option<DateTime<FixedOffset>>,
    /// 이 외출을 닫은 재입장 이벤트 id
    pub return_event_id: Option<i64>,
    /// 일정 검증 결과 (None = 해당없음)
    pub schedule_valid: Option<bool>,
    pub valid_reason: Option<String>,
    /// 알림 전송 완료 (최대 1회 보장 플래그)
    pub notified: bool,
    /// 미복귀 알림 전송 완료
    pub return_alert_sent: bool,
    /// 일일 출석 현황 반영 완료
    pub synced_local: bool,
}

/// 신규 삽입용 이벤트 (id·플래그 없는 형태)
#[derive(Debug, Clone)]
pub struct NewAttendanceEvent {
    pub student_name: String,
    pub phone: String,
    pub available_time: String,
    pub kind: EventKind,
    pub detail: Option<OutingReason>,
    pub record_time: DateTime<FixedOffset>,
    pub local_student_id: Option<i64>,
    pub is_late: bool,
    pub expected_return_time: Option<DateTime<FixedOffset>>,
    pub schedule_valid: Option<bool>,
    pub valid_reason: Option<String>,
}
