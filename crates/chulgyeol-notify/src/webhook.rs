//! Discord 웹훅 클라이언트.
//!
//! `AlertNotifier` 포트 구현. 채널별 URL 분리, 고정 타임아웃.
//! 전송은 fire-and-forget — 재시도는 호출자 정책에 따라 하지 않는다.

use async_trait::async_trait;
use chulgyeol_core::config::NotifyConfig;
use chulgyeol_core::error::CoreError;
use chulgyeol_core::models::alert::{AlertChannel, AlertField, AlertMessage};
use chulgyeol_core::ports::notifier::AlertNotifier;
use chulgyeol_core::time::now_kst;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// 웹훅 임베드 페이로드
#[derive(Serialize)]
struct WebhookPayload<'a> {
    embeds: [Embed<'a>; 1],
}

#[derive(Serialize)]
struct Embed<'a> {
    title: &'a str,
    description: &'a str,
    color: u32,
    timestamp: String,
    fields: &'a [AlertField],
}

/// 웹훅 알림기 — `AlertNotifier` 포트 구현
pub struct WebhookNotifier {
    client: reqwest::Client,
    warning_url: String,
    general_url: String,
}

impl WebhookNotifier {
    /// 새 웹훅 알림기 생성
    pub fn new(config: &NotifyConfig) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        Ok(Self {
            client,
            warning_url: config.warning_webhook_url.trim().to_string(),
            general_url: config.general_webhook_url.trim().to_string(),
        })
    }

    fn url_for(&self, channel: AlertChannel) -> &str {
        match channel {
            AlertChannel::Warning => &self.warning_url,
            AlertChannel::General => &self.general_url,
        }
    }
}

#[async_trait]
impl AlertNotifier for WebhookNotifier {
    async fn send(&self, channel: AlertChannel, message: &AlertMessage) -> Result<(), CoreError> {
        let url = self.url_for(channel);
        if url.is_empty() {
            warn!("웹훅 URL이 설정되지 않았습니다: {channel:?} 채널 알림 생략");
            return Ok(());
        }

        let payload = WebhookPayload {
            embeds: [Embed {
                title: &message.title,
                description: &message.body,
                color: message.color,
                timestamp: now_kst().to_rfc3339(),
                fields: &message.fields,
            }],
        };

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("웹훅 전송 실패: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::Network(format!(
                "웹훅 응답 에러 ({status}): {body}"
            )));
        }

        debug!("웹훅 전송 완료: {channel:?} — {}", message.title);
        Ok(())
    }
}
