// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request handlers for the webhook receiver.
//!
//! Per-request contract: resolve the integration, gate on the HMAC
//! signature when a secret is configured, then parse and ingest. The 200
//! goes out only after the ingest transaction has committed; a duplicate
//! re-delivery is acked as success without a second row.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use comptoir_core::types::IntegrationKind;
use comptoir_core::{ComptoirError, metrics};
use comptoir_storage::queries::ingest::IngestOutcome;
use comptoir_storage::queries::integrations;
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::{error, warn};

use crate::payload;
use crate::server::WebhookState;
use crate::signature;

/// Body of a successful ack.
#[derive(Debug, Serialize)]
pub struct AckResponse {
    /// `stored` for a fresh row, `duplicate` for an absorbed re-delivery.
    pub status: &'static str,
    /// Row id of the message, existing one for duplicates.
    pub message_id: i64,
    /// Conversation the message landed in; omitted for duplicates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

/// Body of GET /healthz.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// POST /hooks/sms/{account_id}
pub async fn post_sms(
    State(state): State<WebhookState>,
    Path(account_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    receive(state, IntegrationKind::SmsWebhook, &account_id, &headers, &body).await
}

/// POST /hooks/chat/{account_id}
pub async fn post_chat(
    State(state): State<WebhookState>,
    Path(account_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    receive(state, IntegrationKind::ChatWebhook, &account_id, &headers, &body).await
}

/// GET /healthz
///
/// Liveness only; no storage probe, load balancers hit this often.
pub async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn receive(
    state: WebhookState,
    kind: IntegrationKind,
    account: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Response {
    let integration = match integrations::find_by_account(&state.db, kind, account).await {
        Ok(Some(integration)) => integration,
        Ok(None) => {
            metrics::record_webhook_rejected("unknown_integration");
            return reject(
                StatusCode::NOT_FOUND,
                "no active integration for this endpoint",
            );
        }
        Err(e) => return storage_failure(e),
    };

    // Signature gate runs against the raw bytes, before any parsing.
    if let Some(envelope) = &integration.webhook_secret_ct {
        let secret = match state.vault.open(envelope) {
            Ok(secret) => secret,
            Err(e) => {
                // Fail closed: an unverifiable request is never ingested.
                error!(
                    integration_id = %integration.integration_id,
                    error = %e,
                    "stored webhook secret is unusable"
                );
                metrics::record_webhook_rejected("secret_unusable");
                return reject(StatusCode::UNAUTHORIZED, "signature verification unavailable");
            }
        };

        let Some(presented) = headers.get("x-signature").and_then(|v| v.to_str().ok()) else {
            metrics::record_webhook_rejected("missing_signature");
            return reject(StatusCode::UNAUTHORIZED, "missing X-Signature header");
        };
        if !signature::verify(secret.expose_secret().as_bytes(), body, presented) {
            warn!(
                integration_id = %integration.integration_id,
                "webhook signature mismatch"
            );
            metrics::record_webhook_rejected("bad_signature");
            return reject(StatusCode::UNAUTHORIZED, "signature mismatch");
        }

        // Replay defense, enforced only when the provider sends the header.
        if let Some(raw) = headers.get("x-timestamp").and_then(|v| v.to_str().ok()) {
            let fresh = payload::parse_timestamp(raw)
                .map(|ts| (Utc::now() - ts).num_seconds().abs() <= state.replay_window_seconds)
                .unwrap_or(false);
            if !fresh {
                metrics::record_webhook_rejected("stale_timestamp");
                return reject(StatusCode::UNAUTHORIZED, "timestamp outside replay window");
            }
        }
    }

    let now = Utc::now();
    let msg = match payload::normalize(kind, body, &integration, now) {
        Ok(msg) => msg,
        Err(e) => {
            metrics::record_webhook_rejected("malformed_payload");
            return reject(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    match state.ingestor.ingest(kind, &msg, now).await {
        Ok(IngestOutcome::Inserted {
            message_id,
            conversation_id,
            ..
        }) => (
            StatusCode::OK,
            Json(AckResponse {
                status: "stored",
                message_id,
                conversation_id: Some(conversation_id),
            }),
        )
            .into_response(),
        Ok(IngestOutcome::Duplicate { message_id }) => (
            StatusCode::OK,
            Json(AckResponse {
                status: "duplicate",
                message_id,
                conversation_id: None,
            }),
        )
            .into_response(),
        Err(e) => storage_failure(e),
    }
}

fn reject(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// No ack on a failed write; the provider retries and dedup absorbs it.
fn storage_failure(e: ComptoirError) -> Response {
    error!(error = %e, "webhook persistence failed");
    reject(StatusCode::INTERNAL_SERVER_ERROR, "persistence failed")
}
