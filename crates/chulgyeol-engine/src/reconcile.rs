//! 배치 재조정 파이프라인.
//!
//! 원본 행 → 파싱 → 입장/재입장 분류 → 중복 제거 삽입 → 복귀 연결 →
//! 일정 검증/예상 복귀 → 일일 출석 투영. 행 하나의 실패가 배치 전체를
//! 중단시키지 않는다.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use chulgyeol_core::error::CoreError;
use chulgyeol_core::models::daily::DailyStatus;
use chulgyeol_core::models::event::{
    AttendanceEvent, EventKind, NewAttendanceEvent, OutingReason, RawEvent, ScheduleCheck,
};
use chulgyeol_core::models::roster::Student;
use chulgyeol_core::models::worker::SyncStats;
use chulgyeol_core::ports::store::{DailyStore, EventStore, RosterStore};
use chulgyeol_core::time::weekday_index;
use chulgyeol_core::timetable::Timetable;
use tracing::{debug, info, warn};

use crate::expected_return::expected_return;
use crate::parse::parse_status;
use crate::validate::{validate_exit, validate_outing};

/// 늦은 복귀 정보 — 라우터가 경고 알림으로 변환
#[derive(Debug, Clone)]
pub struct LateReturn {
    /// 외출 유형 라벨 (상세 사유 또는 주 상태)
    pub outing_label: String,
    pub expected: DateTime<FixedOffset>,
    pub delay_minutes: i64,
}

/// 한 행의 재조정 결과 — 알림 라우터 입력
#[derive(Debug, Clone)]
pub struct ProcessedEvent {
    pub event: AttendanceEvent,
    pub student: Option<Student>,
    pub late_return: Option<LateReturn>,
}

/// 재조정 파이프라인
pub struct Reconciler {
    events: Arc<dyn EventStore>,
    roster: Arc<dyn RosterStore>,
    daily: Arc<dyn DailyStore>,
    timetable: Timetable,
}

impl Reconciler {
    pub fn new(
        events: Arc<dyn EventStore>,
        roster: Arc<dyn RosterStore>,
        daily: Arc<dyn DailyStore>,
        timetable: Timetable,
    ) -> Self {
        Self {
            events,
            roster,
            daily,
            timetable,
        }
    }

    /// 배치 전체 처리.
    ///
    /// 분류기/연결기가 "지금까지의 이력"에 의존하므로 배치 내부는
    /// record_time 오름차순으로 처리한다. 행별로 독립 — 손상된 행은
    /// 로그만 남기고 건너뛴다.
    pub async fn process_batch(
        &self,
        mut batch: Vec<RawEvent>,
    ) -> (SyncStats, Vec<ProcessedEvent>) {
        batch.sort_by_key(|row| row.record_time);

        let mut stats = SyncStats {
            fetched: batch.len(),
            new_records: 0,
        };
        let mut processed = Vec::new();

        for row in &batch {
            match self.process_row(row).await {
                Ok(Some(result)) => {
                    stats.new_records += 1;
                    processed.push(result);
                }
                Ok(None) => {} // 중복 — 정상 경로
                Err(e) => {
                    warn!("행 처리 실패 ({} {}): {e}", row.student_name, row.status);
                }
            }
        }

        (stats, processed)
    }

    /// 원본 행 1건 재조정. 중복이면 `None`.
    async fn process_row(&self, raw: &RawEvent) -> Result<Option<ProcessedEvent>, CoreError> {
        let (mut kind, detail) = parse_status(&raw.status);
        let date = raw.record_time.date_naive();
        let time = raw.record_time.time();

        // 입장 2회 이상이면 재입장으로 재분류 — 중복 검사와 연결기보다
        // 먼저 수행해야 한다 (같은 날짜 기준은 이벤트 자신의 기록 시각)
        if kind == EventKind::Entry && self.events.has_entry_on(&raw.student_name, date).await? {
            info!("{}: 오늘 입장 기록 있음 -> 재입장으로 변경", raw.student_name);
            kind = EventKind::ReEntry;
        }

        let student = self.roster.match_student(&raw.student_name, &raw.phone).await?;
        let student_id = student.as_ref().map(|s| s.id);

        // 지각 여부 (첫 입장만)
        let is_late = kind == EventKind::Entry && time > self.timetable.late_threshold;

        // 정기외출 규칙 — 정기외출 외출/이동과 퇴장 면제 검사에만 필요
        let rule = match student_id {
            Some(id) if needs_rule(&kind, detail.as_ref()) => {
                self.roster
                    .find_active_rule(id, weekday_index(date), time)
                    .await?
            }
            _ => None,
        };

        let expected =
            expected_return(&kind, detail.as_ref(), raw.record_time, rule.as_ref(), &self.timetable);

        let check = match kind {
            EventKind::Outing => {
                validate_outing(detail.as_ref(), time, student_id, rule.as_ref(), &self.timetable)
            }
            EventKind::Exit => validate_exit(time, rule.as_ref(), &self.timetable),
            // 강제퇴장은 수집 시점에 검증하지 않는다 (다음날 명단 처리)
            _ => ScheduleCheck::not_applicable(),
        };

        let new_event = NewAttendanceEvent {
            student_name: raw.student_name.clone(),
            phone: raw.phone.clone(),
            available_time: raw.available_time.clone(),
            kind: kind.clone(),
            detail: detail.clone(),
            record_time: raw.record_time,
            local_student_id: student_id,
            is_late,
            expected_return_time: expected,
            schedule_valid: check.as_db_flag(),
            valid_reason: if check.reason.is_empty() {
                None
            } else {
                Some(check.reason.clone())
            },
        };

        let Some(id) = self.events.insert_event(&new_event).await? else {
            return Ok(None);
        };

        let mut event = AttendanceEvent {
            id,
            student_name: new_event.student_name,
            phone: new_event.phone,
            available_time: new_event.available_time,
            kind: kind.clone(),
            detail,
            record_time: raw.record_time,
            local_student_id: student_id,
            is_late,
            expected_return_time: expected,
            return_event_id: None,
            schedule_valid: new_event.schedule_valid,
            valid_reason: new_event.valid_reason,
            notified: false,
            return_alert_sent: false,
            synced_local: false,
        };

        // 삽입 이후 단계는 모두 best-effort — 실패해도 이벤트 행은 남는다
        let late_return = if kind == EventKind::ReEntry {
            match self.link_return(&mut event).await {
                Ok(link) => link,
                Err(e) => {
                    warn!("복귀 연결 실패 ({}): {e}", event.student_name);
                    None
                }
            }
        } else {
            None
        };

        if let Some(ref s) = student {
            match self.apply_daily(s.id, &event).await {
                Ok(()) => match self.events.mark_synced(id).await {
                    Ok(()) => event.synced_local = true,
                    Err(e) => warn!("동기화 플래그 갱신 실패 ({}): {e}", event.student_name),
                },
                Err(e) => {
                    // 투영 실패는 나중에 복구 — synced_local은 false로 남는다
                    warn!("일일 출석 반영 실패 ({}): {e}", event.student_name);
                }
            }
        }

        Ok(Some(ProcessedEvent {
            event,
            student,
            late_return,
        }))
    }

    /// 재입장을 같은 날 마지막 열린 외출/이동에 연결.
    ///
    /// 이름 기준 매칭 — 동명이인 구분은 원천 데이터에 없다.
    /// 열린 외출이 없으면 연결 없음 (에러 아님).
    async fn link_return(
        &self,
        event: &mut AttendanceEvent,
    ) -> Result<Option<LateReturn>, CoreError> {
        let date = event.record_time.date_naive();
        let Some(outing) = self
            .events
            .find_open_outing(&event.student_name, date)
            .await?
        else {
            debug!("{}: 열린 외출 없음 — 연결 생략", event.student_name);
            return Ok(None);
        };

        self.events.link_return(outing.id, event.id).await?;

        let Some(expected) = outing.expected_return_time else {
            return Ok(None);
        };

        if event.record_time <= expected {
            return Ok(None);
        }

        // 늦은 복귀 — 복귀 이벤트에 지각 표시, 지연 시간은 라우터로
        let delay_minutes = (event.record_time - expected).num_minutes();
        self.events.mark_late(event.id).await?;
        event.is_late = true;

        Ok(Some(LateReturn {
            outing_label: outing
                .detail
                .as_ref()
                .map(|d| d.as_str().to_string())
                .unwrap_or_else(|| outing.kind.as_str().to_string()),
            expected,
            delay_minutes,
        }))
    }

    /// (학생, 날짜) 상태 머신 전이
    async fn apply_daily(&self, student_id: i64, event: &AttendanceEvent) -> Result<(), CoreError> {
        let date = event.record_time.date_naive();
        let time = event.record_time.time();

        match event.kind {
            EventKind::Entry => {
                let status = if event.is_late {
                    DailyStatus::Late
                } else {
                    DailyStatus::Studying
                };
                // 당일 첫 입장만 행을 만든다 — 이미 있으면 그대로 둔다
                self.daily.create_daily(student_id, date, status, time).await?;
            }
            EventKind::ReEntry => {
                if let Some(current) = self.daily.get_daily(student_id, date).await? {
                    if current.status == DailyStatus::OnSchedule {
                        self.daily
                            .set_status(student_id, date, DailyStatus::Studying)
                            .await?;
                    }
                }
            }
            EventKind::Outing | EventKind::Transfer => {
                self.daily
                    .set_status(student_id, date, DailyStatus::OnSchedule)
                    .await?;
            }
            EventKind::Exit | EventKind::ForcedExit => {
                // 상태는 일일 마감에 맡기고 하원 시각만 기록
                self.daily.set_check_out(student_id, date, time).await?;
            }
            EventKind::Other(_) => {}
        }

        Ok(())
    }
}

fn needs_rule(kind: &EventKind, detail: Option<&OutingReason>) -> bool {
    (kind.is_outing() && detail == Some(&OutingReason::Regular)) || *kind == EventKind::Exit
}
