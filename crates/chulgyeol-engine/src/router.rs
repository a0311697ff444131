//! 알림 라우팅.
//!
//! 재조정 이벤트 1건 → 채널/색상/필드가 결정된 알림 0~1건.
//! notified 플래그 CAS를 전송 시도 *전에* 수행해 루프 중첩·재시도
//! 상황에서도 최대 1회를 보장한다. 전송 실패는 재시도하지 않는다.

use std::sync::Arc;

use chrono::NaiveTime;
use chulgyeol_core::error::CoreError;
use chulgyeol_core::models::alert::{colors, AlertChannel, AlertMessage};
use chulgyeol_core::models::event::EventKind;
use chulgyeol_core::ports::notifier::AlertNotifier;
use chulgyeol_core::ports::store::EventStore;
use tracing::{debug, warn};

use crate::reconcile::ProcessedEvent;

/// 알림 라우터
pub struct AlertRouter {
    events: Arc<dyn EventStore>,
    notifier: Arc<dyn AlertNotifier>,
    /// 지각 분 계산 기준 (시간표의 지각 기준 시각)
    late_threshold: NaiveTime,
}

impl AlertRouter {
    pub fn new(
        events: Arc<dyn EventStore>,
        notifier: Arc<dyn AlertNotifier>,
        late_threshold: NaiveTime,
    ) -> Self {
        Self {
            events,
            notifier,
            late_threshold,
        }
    }

    /// 이벤트 1건 디스패치 (최대 1회).
    ///
    /// 라우팅 테이블에 해당 없는 이벤트(강제퇴장, 미인식 상태)도
    /// notified는 세워 같은 이벤트를 무한히 재검토하지 않는다.
    pub async fn dispatch(&self, processed: &ProcessedEvent) -> Result<(), CoreError> {
        if !self.events.try_mark_notified(processed.event.id).await? {
            debug!("이미 알림 처리됨: 이벤트 {}", processed.event.id);
            return Ok(());
        }

        let Some((channel, message)) = route(processed, self.late_threshold) else {
            return Ok(());
        };

        // 전송 실패는 로그만 — 최대 1회가 재전송보다 우선 (알림 폭주 방지)
        if let Err(e) = self.notifier.send(channel, &message).await {
            warn!("알림 전송 실패 (재시도 없음): {e}");
        }

        Ok(())
    }
}

/// 라우팅 테이블 — 순수 함수라 단독 테스트 가능
pub fn route(
    processed: &ProcessedEvent,
    late_threshold: NaiveTime,
) -> Option<(AlertChannel, AlertMessage)> {
    let event = &processed.event;
    let name = event.student_name.as_str();
    let seat = processed
        .student
        .as_ref()
        .map(|s| s.seat_label().to_string())
        .unwrap_or_else(|| "미등록".to_string());
    let time_str = event.record_time.format("%H:%M:%S").to_string();
    let detail_label = event
        .detail
        .as_ref()
        .map(|d| d.as_str().to_string())
        .unwrap_or_default();
    let return_str = event
        .expected_return_time
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| "미정".to_string());

    match event.kind {
        EventKind::Entry => {
            if event.is_late {
                let late_minutes = (event.record_time.time() - late_threshold).num_minutes();
                Some((
                    AlertChannel::Warning,
                    AlertMessage::new(
                        "⚠️ 지각 알림",
                        format!("**{name}** ({seat}) 학생이 **{late_minutes}분** 지각했습니다."),
                        colors::DANGER,
                    )
                    .field("학생", name)
                    .field("좌석", seat.as_str())
                    .field("입장 시간", time_str.as_str()),
                ))
            } else {
                Some((
                    AlertChannel::General,
                    AlertMessage::new(
                        "✅ 입장 알림",
                        format!("**{name}** ({seat}) 학생이 입장했습니다."),
                        colors::SUCCESS,
                    )
                    .field("학생", name)
                    .field("좌석", seat.as_str())
                    .field("입장 시간", time_str.as_str()),
                ))
            }
        }

        EventKind::ReEntry => {
            if let Some(ref late) = processed.late_return {
                // 늦은 복귀는 일반 재입장 알림 대신 경고 알림
                Some((
                    AlertChannel::Warning,
                    AlertMessage::new(
                        "⏰ 늦은 복귀 알림",
                        format!("**{name}** ({seat}) 학생이 예정보다 늦게 복귀했습니다."),
                        colors::WARNING,
                    )
                    .field("학생", name)
                    .field("외출 유형", late.outing_label.as_str())
                    .field("예상 복귀", late.expected.format("%H:%M").to_string())
                    .field("실제 복귀", event.record_time.format("%H:%M").to_string())
                    .field("지연 시간", format!("{}분", late.delay_minutes)),
                ))
            } else {
                Some((
                    AlertChannel::General,
                    AlertMessage::new(
                        "🔄 재입장 알림",
                        format!("**{name}** ({seat}) 학생이 복귀했습니다."),
                        colors::INFO,
                    )
                    .field("학생", name)
                    .field("좌석", seat.as_str())
                    .field("복귀 시간", time_str.as_str()),
                ))
            }
        }

        EventKind::Exit => {
            if event.schedule_valid == Some(false) {
                Some((
                    AlertChannel::Warning,
                    AlertMessage::new(
                        "🚨 조기 퇴장 경고",
                        format!("**{name}** ({seat}) 학생이 정규 시간 전에 퇴장했습니다!"),
                        colors::DANGER,
                    )
                    .field("학생", name)
                    .field("좌석", seat.as_str())
                    .field("퇴장 시간", time_str.as_str())
                    .block_field("⚠️ 사유", event.valid_reason.as_deref().unwrap_or("")),
                ))
            } else {
                Some((
                    AlertChannel::General,
                    AlertMessage::new(
                        "👋 퇴장 알림",
                        format!("**{name}** ({seat}) 학생이 퇴장했습니다."),
                        colors::WARNING,
                    )
                    .field("학생", name)
                    .field("좌석", seat.as_str())
                    .field("퇴장 시간", time_str.as_str()),
                ))
            }
        }

        // 강제퇴장: 즉시 알림 생략, 다음날 아침 명단에서만 처리
        EventKind::ForcedExit => None,

        EventKind::Outing => {
            if event.schedule_valid == Some(false) {
                Some((
                    AlertChannel::Warning,
                    AlertMessage::new(
                        "⚠️ 비정상 외출 알림",
                        format!("**{name}** ({seat}) 학생이 비정상 외출했습니다!"),
                        colors::DANGER,
                    )
                    .field("학생", name)
                    .field("외출 유형", detail_label.as_str())
                    .field("외출 시간", time_str.as_str())
                    .block_field("⚠️ 사유", event.valid_reason.as_deref().unwrap_or("")),
                ))
            } else {
                Some((
                    AlertChannel::General,
                    AlertMessage::new(
                        "🚶 외출 알림",
                        format!("**{name}** ({seat}) 학생이 외출했습니다."),
                        colors::INFO,
                    )
                    .field("학생", name)
                    .field("외출 유형", detail_label.as_str())
                    .field("외출 시간", time_str.as_str())
                    .field("복귀 예정", return_str.as_str()),
                ))
            }
        }

        EventKind::Transfer => Some((
            AlertChannel::General,
            AlertMessage::new(
                "🏢 이동 알림",
                format!("**{name}** ({seat}) 학생이 다른 층으로 이동했습니다."),
                colors::PURPLE,
            )
            .field("학생", name)
            .field("이동 목적", detail_label.as_str())
            .field("이동 시간", time_str.as_str())
            .field("복귀 예정", return_str.as_str()),
        )),

        // 미인식 상태 — 라우팅 대상 아님
        EventKind::Other(_) => None,
    }
}
