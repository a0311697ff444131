//! 저장소 포트.
//!
//! 구현: `chulgyeol-storage` crate (rusqlite)

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};

use crate::error::CoreError;
use crate::models::daily::{DailyAttendance, DailyStatus};
use crate::models::event::{AttendanceEvent, NewAttendanceEvent};
use crate::models::roster::{RecurringOutingRule, Student};
use crate::models::worker::SyncLog;

/// 날짜별 출입 요약 (운영자 조회용)
#[derive(Debug, Clone, Copy)]
pub struct DaySummary {
    pub entry_count: i64,
    pub exit_count: i64,
    pub late_count: i64,
}

/// 재조정 이벤트 저장소
#[async_trait]
pub trait EventStore: Send + Sync {
    /// 이벤트 삽입. (이름, 상태, 기록시각 ±1분) 중복이면 삽입하지 않고
    /// `None`을 반환한다 — 같은 표를 매 틱 재관측하므로 중복은 정상 경로.
    async fn insert_event(&self, event: &NewAttendanceEvent) -> Result<Option<i64>, CoreError>;

    /// 이벤트 단건 조회
    async fn get_event(&self, id: i64) -> Result<Option<AttendanceEvent>, CoreError>;

    /// 같은 날 입장/재입장 기록 존재 여부 (입장→재입장 재분류용)
    async fn has_entry_on(&self, student_name: &str, date: NaiveDate) -> Result<bool, CoreError>;

    /// 복귀 대기 중인 같은 날 마지막 외출/이동 기록
    /// (record_time 내림차순, return_event_id 없는 것)
    async fn find_open_outing(
        &self,
        student_name: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceEvent>, CoreError>;

    /// 외출 기록에 복귀 이벤트 연결
    async fn link_return(&self, outing_id: i64, return_event_id: i64) -> Result<(), CoreError>;

    /// 복귀 지각 표시 (재입장 이벤트에)
    async fn mark_late(&self, event_id: i64) -> Result<(), CoreError>;

    /// notified 플래그 CAS — 이번 호출이 플래그를 세웠으면 true.
    /// 전송 시도 직전에 호출하여 루프 중첩 시에도 최대 1회를 보장한다.
    async fn try_mark_notified(&self, event_id: i64) -> Result<bool, CoreError>;

    /// return_alert_sent 플래그 CAS
    async fn try_mark_return_alerted(&self, event_id: i64) -> Result<bool, CoreError>;

    /// 일일 출석 반영 완료 표시
    async fn mark_synced(&self, event_id: i64) -> Result<(), CoreError>;

    /// 예상 복귀 시각이 지났고 복귀 연결·미복귀 알림이 없는 외출/이동
    async fn overdue_outings(
        &self,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<AttendanceEvent>, CoreError>;

    /// 해당 날짜의 강제퇴장 기록 (다음날 아침 명단 알림용)
    async fn forced_exits_on(&self, date: NaiveDate) -> Result<Vec<AttendanceEvent>, CoreError>;

    /// 날짜별 이벤트 목록 (record_time 내림차순, 운영자 조회용)
    async fn events_on(
        &self,
        date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<AttendanceEvent>, CoreError>;

    /// 날짜별 입장/퇴장/지각 수
    async fn day_summary(&self, date: NaiveDate) -> Result<DaySummary, CoreError>;
}

/// 명부 저장소 — 학생 매칭, 정기외출 규칙 조회
#[async_trait]
pub trait RosterStore: Send + Sync {
    /// 재원생 매칭 — 이름 정확 일치 우선, 없으면 전화번호 뒤 4자리
    /// 포함 일치 (학생/학부모 번호). 실패해도 에러가 아닌 None.
    async fn match_student(&self, name: &str, phone: &str)
        -> Result<Option<Student>, CoreError>;

    async fn get_student(&self, id: i64) -> Result<Option<Student>, CoreError>;

    /// (학생, 요일, 시각)을 포함하는 활성 정기외출 규칙
    async fn find_active_rule(
        &self,
        student_id: i64,
        day_of_week: u8,
        at: NaiveTime,
    ) -> Result<Option<RecurringOutingRule>, CoreError>;
}

/// 일일 출석 현황 저장소
#[async_trait]
pub trait DailyStore: Send + Sync {
    async fn get_daily(
        &self,
        student_id: i64,
        date: NaiveDate,
    ) -> Result<Option<DailyAttendance>, CoreError>;

    /// 당일 첫 행 생성. 이미 있으면 건드리지 않고 false 반환.
    async fn create_daily(
        &self,
        student_id: i64,
        date: NaiveDate,
        status: DailyStatus,
        check_in: NaiveTime,
    ) -> Result<bool, CoreError>;

    async fn set_status(
        &self,
        student_id: i64,
        date: NaiveDate,
        status: DailyStatus,
    ) -> Result<(), CoreError>;

    async fn set_check_out(
        &self,
        student_id: i64,
        date: NaiveDate,
        check_out: NaiveTime,
    ) -> Result<(), CoreError>;

    /// 해당 날짜의 지각 상태를 자습중으로 일괄 전환 (교시 시작 시 실행)
    async fn convert_late_to_studying(&self, date: NaiveDate) -> Result<usize, CoreError>;
}

/// 동기화 로그 저장소
#[async_trait]
pub trait SyncLogStore: Send + Sync {
    async fn log_sync(
        &self,
        fetched: usize,
        new_records: usize,
        status: &str,
        errors: Option<&str>,
    ) -> Result<(), CoreError>;

    async fn recent_logs(&self, limit: usize) -> Result<Vec<SyncLog>, CoreError>;
}
