//! # chulgyeol-notify
//!
//! 웹훅 알림 어댑터.
//! `AlertNotifier` 포트 구현 — 구조화된 알림을 Discord 임베드로
//! 변환해 채널별 웹훅 URL로 전송한다.

pub mod webhook;

pub use webhook::WebhookNotifier;
