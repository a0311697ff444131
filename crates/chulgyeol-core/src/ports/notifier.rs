//! 알림 전송 포트.
//!
//! 구현: `chulgyeol-notify` crate (Discord 웹훅)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::alert::{AlertChannel, AlertMessage};

/// 구조화된 알림을 채널로 전송하는 인터페이스.
///
/// fire-and-forget 의미론 — 전송 실패는 호출자가 로그만 남기고
/// 재시도하지 않는다 (알림 폭주 방지, 최대 1회 우선).
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    /// 지정 채널로 알림 1건 전송
    async fn send(&self, channel: AlertChannel, message: &AlertMessage) -> Result<(), CoreError>;
}
