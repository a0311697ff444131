//! 명부 모델 — 학생, 정기외출 규칙.
//!
//! 명부 시스템이 소유하는 데이터의 읽기 전용 투영이다.

use chrono::NaiveTime;

/// 재원 상태 문자열
pub const STUDENT_ACTIVE: &str = "재원";

/// 학생
#[derive(Debug, Clone)]
pub struct Student {
    pub id: i64,
    pub name: String,
    /// 좌석 번호 (미배정 가능)
    pub seat_number: Option<String>,
    pub phone: Option<String>,
    pub parent_phone: Option<String>,
    /// 재원/퇴원 등 상태
    pub status: String,
}

impl Student {
    /// 알림 표시용 좌석 라벨
    pub fn seat_label(&self) -> &str {
        self.seat_number.as_deref().unwrap_or("미등록")
    }
}

/// 정기외출 규칙 — 학생별 주간 면제 창 (요일 0=월요일)
#[derive(Debug, Clone)]
pub struct RecurringOutingRule {
    pub id: i64,
    pub student_id: i64,
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// 규칙 목적 (예: "주 1회 과외")
    pub reason: String,
    pub is_active: bool,
}
