//! 미복귀 스위퍼와 강제퇴장 아침 명단.
//!
//! 메인 틱과 독립된 타이머에서 실행된다. return_alert_sent CAS를
//! 전송 전에 수행해 틱이 겹쳐도 같은 기록에 두 번 알리지 않는다.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate};
use chulgyeol_core::error::CoreError;
use chulgyeol_core::models::alert::{colors, AlertChannel, AlertMessage};
use chulgyeol_core::ports::notifier::AlertNotifier;
use chulgyeol_core::ports::store::{EventStore, RosterStore};
use tracing::{info, warn};

/// 미복귀·강제퇴장 스위퍼
pub struct ReturnSweeper {
    events: Arc<dyn EventStore>,
    roster: Arc<dyn RosterStore>,
    notifier: Arc<dyn AlertNotifier>,
}

impl ReturnSweeper {
    pub fn new(
        events: Arc<dyn EventStore>,
        roster: Arc<dyn RosterStore>,
        notifier: Arc<dyn AlertNotifier>,
    ) -> Self {
        Self {
            events,
            roster,
            notifier,
        }
    }

    /// 예상 복귀 시각을 넘긴 미복귀 외출/이동에 경고 알림.
    /// 알림 보낸 기록 수 반환.
    pub async fn sweep_overdue(&self, now: DateTime<FixedOffset>) -> Result<usize, CoreError> {
        let overdue = self.events.overdue_outings(now).await?;
        let mut alerted = 0;

        for record in overdue {
            let Some(expected) = record.expected_return_time else {
                continue;
            };

            // CAS 먼저 — 스위퍼 틱이 겹쳐도 최대 1회
            if !self.events.try_mark_return_alerted(record.id).await? {
                continue;
            }

            let seat = match record.local_student_id {
                Some(id) => self
                    .roster
                    .get_student(id)
                    .await?
                    .map(|s| s.seat_label().to_string())
                    .unwrap_or_else(|| "미등록".to_string()),
                None => "미등록".to_string(),
            };
            let label = record
                .detail
                .as_ref()
                .map(|d| d.as_str().to_string())
                .unwrap_or_else(|| record.kind.as_str().to_string());
            let delay_minutes = (now - expected).num_minutes();
            let name = record.student_name.as_str();

            let message = AlertMessage::new(
                "🚨 복귀 미확인 알림",
                format!("**{name}** ({seat}) 학생이 아직 복귀하지 않았습니다!"),
                colors::DANGER,
            )
            .field("학생", name)
            .field("외출/이동 유형", label.as_str())
            .field("예상 복귀 시간", expected.format("%H:%M").to_string())
            .field("지연 시간", format!("{delay_minutes}분"));

            if let Err(e) = self.notifier.send(AlertChannel::Warning, &message).await {
                warn!("미복귀 알림 전송 실패: {e}");
            }
            alerted += 1;
        }

        if alerted > 0 {
            info!("복귀 미확인 알림 전송: {alerted}명");
        }
        Ok(alerted)
    }

    /// 전날 강제퇴장 명단을 한 건의 경고 알림으로 통합 전송.
    /// 명단이 비어 있으면 보내지 않는다. 대상 기록 수 반환.
    pub async fn forced_exit_roster(&self, date: NaiveDate) -> Result<usize, CoreError> {
        let records = self.events.forced_exits_on(date).await?;
        if records.is_empty() {
            return Ok(0);
        }

        let mut lines = Vec::with_capacity(records.len());
        for record in &records {
            let seat = match record.local_student_id {
                Some(id) => self
                    .roster
                    .get_student(id)
                    .await?
                    .map(|s| s.seat_label().to_string())
                    .unwrap_or_else(|| "미등록".to_string()),
                None => "미등록".to_string(),
            };
            lines.push(format!("• {} ({seat})", record.student_name));
        }

        let message = AlertMessage::new(
            "📋 어제 강제퇴장 학생 목록",
            format!(
                "어제({}) 강제퇴장 처리된 학생들입니다.\n**경고 조치가 필요합니다.**",
                date.format("%Y-%m-%d")
            ),
            colors::ROSTER,
        )
        .block_field(format!("총 {}명", records.len()), lines.join("\n"))
        .block_field(
            "⚠️ 조치 사항",
            "퇴장 버튼 미클릭으로 인한 강제퇴장입니다.\n해당 학생들에게 경고를 전달해주세요.",
        );

        if let Err(e) = self.notifier.send(AlertChannel::Warning, &message).await {
            warn!("강제퇴장 명단 알림 전송 실패: {e}");
        }

        info!("강제퇴장 아침 알림 전송: {}명", records.len());
        Ok(records.len())
    }
}
