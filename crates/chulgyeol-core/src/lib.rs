//! # chulgyeol-core
//!
//! CHULGYEOL 도메인 모델, 포트(trait) 정의, 에러 타입.
//! 모든 크레이트가 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`] — 도메인 데이터 구조체 (출결 이벤트, 명부, 알림 등)
//! - [`ports`] — Hexagonal Architecture 포트 인터페이스 (async_trait)
//! - [`error`] — 핵심 에러 타입 (thiserror)
//! - [`config`] — 애플리케이션 설정 구조체
//! - [`config_manager`] — 설정 파일 관리 (로드/저장)
//! - [`timetable`] — 자습실 고정 시간표 (점심/저녁/쉬는시간/교시)
//! - [`time`] — 캠퍼스 로컬 시간(KST) 유틸리티

pub mod config;
pub mod config_manager;
pub mod error;
pub mod models;
pub mod ports;
pub mod time;
pub mod timetable;

#[cfg(test)]
mod tests {
    use crate::models::event::{EventKind, OutingReason};
    use crate::models::alert::{colors, AlertMessage};

    #[test]
    fn event_kind_roundtrip() {
        for raw in ["입장", "재입장", "외출", "이동", "퇴장", "강제퇴장"] {
            let kind = EventKind::parse(raw);
            assert_eq!(kind.as_str(), raw);
            assert!(!matches!(kind, EventKind::Other(_)));
        }
        assert!(matches!(EventKind::parse("점검"), EventKind::Other(_)));
    }

    #[test]
    fn outing_reason_roundtrip() {
        for raw in [
            "점심식사",
            "저녁식사",
            "쉬는시간",
            "정기외출",
            "병원 진료",
            "7층 학원수업",
            "상담",
        ] {
            let reason = OutingReason::parse(raw);
            assert_eq!(reason.as_str(), raw);
            assert!(!matches!(reason, OutingReason::Other(_)));
        }
    }

    #[test]
    fn alert_message_builder() {
        let msg = AlertMessage::new("지각 알림", "지각했습니다.", colors::DANGER)
            .field("학생", "김철수")
            .block_field("사유", "08:00 이후 입장");
        assert_eq!(msg.fields.len(), 2);
        assert!(msg.fields[0].inline);
        assert!(!msg.fields[1].inline);
    }

    #[test]
    fn config_defaults() {
        let config = crate::config::AppConfig::default_config();
        assert_eq!(config.sync.tick_interval_ms, 3_000);
        assert_eq!(config.sync.sweep_interval_ms, 30_000);
        assert_eq!(config.worker.ready_attempts, 30);
        assert!(config.worker.restart_after_ticks.is_none());
    }
}
