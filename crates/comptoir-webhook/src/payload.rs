// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider payload shapes and their reduction to [`IngressMessage`].
//!
//! The shapes are deliberately lenient: providers decorate payloads with
//! extra fields, and rejecting those would bounce legitimate traffic. Only
//! the fields the pipeline needs are read; everything else is ignored.

use chrono::{DateTime, TimeZone, Utc};
use comptoir_core::types::{Integration, IntegrationKind, MessageDirection};
use comptoir_core::{ComptoirError, IngressMessage};
use serde::Deserialize;

/// An inbound SMS as pushed by the provider.
#[derive(Debug, Deserialize)]
pub struct SmsPayload {
    /// Sender phone number.
    pub from: String,
    /// Receiving number; falls back to the integration's own number.
    #[serde(default)]
    pub to: Option<String>,
    /// Message text.
    pub text: String,
    /// Provider-assigned message id, when the provider has one.
    #[serde(default)]
    pub message_id: Option<String>,
    /// Send time as RFC 3339 or unix seconds.
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// An inbound chat message as pushed by the provider.
#[derive(Debug, Deserialize)]
pub struct ChatPayload {
    /// Remote participant handle.
    pub sender: String,
    /// Message text.
    pub text: String,
    /// Provider-side thread id, when the platform threads natively.
    #[serde(default)]
    pub thread_id: Option<String>,
    /// Provider-assigned message id.
    #[serde(default)]
    pub message_id: Option<String>,
    /// Send time as RFC 3339 or unix seconds.
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Parse a provider timestamp: RFC 3339 first, then unix seconds.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

/// Reduce a raw webhook body to the one ingress shape.
///
/// Parse failures surface as [`ComptoirError::Malformed`]; the handler
/// answers 400 and nothing is persisted.
pub fn normalize(
    kind: IntegrationKind,
    body: &[u8],
    integration: &Integration,
    now: DateTime<Utc>,
) -> Result<IngressMessage, ComptoirError> {
    match kind {
        IntegrationKind::SmsWebhook => {
            let payload: SmsPayload = serde_json::from_slice(body)
                .map_err(|e| ComptoirError::Malformed(format!("sms payload: {e}")))?;
            Ok(sms_to_ingress(payload, integration, now))
        }
        IntegrationKind::ChatWebhook => {
            let payload: ChatPayload = serde_json::from_slice(body)
                .map_err(|e| ComptoirError::Malformed(format!("chat payload: {e}")))?;
            Ok(chat_to_ingress(payload, integration, now))
        }
        other => Err(ComptoirError::Malformed(format!(
            "integration kind {other} has no webhook normalizer"
        ))),
    }
}

fn sms_to_ingress(
    payload: SmsPayload,
    integration: &Integration,
    now: DateTime<Utc>,
) -> IngressMessage {
    let received_at = payload
        .timestamp
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or(now);
    let recipients = payload
        .to
        .or_else(|| integration.phone_number.clone())
        .into_iter()
        .collect();
    IngressMessage {
        integration_id: integration.integration_id.clone(),
        company_id: integration.company_id.clone(),
        provider_message_id: payload.message_id,
        direction: MessageDirection::Inbound,
        sender_handle: payload.from,
        recipients,
        subject: None,
        body_text: payload.text,
        body_html: None,
        attachments: vec![],
        received_at,
        thread_hint: None,
    }
}

fn chat_to_ingress(
    payload: ChatPayload,
    integration: &Integration,
    now: DateTime<Utc>,
) -> IngressMessage {
    let received_at = payload
        .timestamp
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or(now);
    IngressMessage {
        integration_id: integration.integration_id.clone(),
        company_id: integration.company_id.clone(),
        provider_message_id: payload.message_id,
        direction: MessageDirection::Inbound,
        sender_handle: payload.sender,
        recipients: integration.account_id.clone().into_iter().collect(),
        subject: None,
        body_text: payload.text,
        body_html: None,
        attachments: vec![],
        received_at,
        thread_hint: payload.thread_id,
    }
}
