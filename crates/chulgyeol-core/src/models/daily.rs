//! 일일 출석 현황 모델.
//!
//! (학생, 날짜)당 한 행으로 유지되는 투영. 재조정 이벤트가 상태를 구동한다.

use chrono::{NaiveDate, NaiveTime};

/// 일일 출석 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyStatus {
    /// 자습중
    Studying,
    /// 지각 (해당 교시 동안만 유지)
    Late,
    /// 결석
    Absent,
    /// 일정중 (외출/이동 중)
    OnSchedule,
    /// 학교 (등교일)
    AtSchool,
}

impl DailyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Studying => "자습중",
            Self::Late => "지각",
            Self::Absent => "결석",
            Self::OnSchedule => "일정중",
            Self::AtSchool => "학교",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "자습중" => Some(Self::Studying),
            "지각" => Some(Self::Late),
            "결석" => Some(Self::Absent),
            "일정중" => Some(Self::OnSchedule),
            "학교" => Some(Self::AtSchool),
            _ => None,
        }
    }
}

impl std::fmt::Display for DailyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// (학생, 날짜)별 출석 현황 행
#[derive(Debug, Clone)]
pub struct DailyAttendance {
    pub id: i64,
    pub student_id: i64,
    pub date: NaiveDate,
    pub status: DailyStatus,
    pub check_in_time: Option<NaiveTime>,
    pub check_out_time: Option<NaiveTime>,
}
