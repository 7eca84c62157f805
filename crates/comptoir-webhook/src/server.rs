// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Receiver HTTP server built on axum.
//!
//! Sets up routes, the handler deadline, and shared state.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use comptoir_core::ComptoirError;
use comptoir_ingest::Ingestor;
use comptoir_storage::Database;
use comptoir_vault::Vault;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;

/// Providers must have their answer inside this deadline.
const HANDLER_DEADLINE: Duration = Duration::from_secs(10);

/// Shared state for webhook request handlers.
#[derive(Clone)]
pub struct WebhookState {
    /// Storage handle for integration lookup.
    pub db: Database,
    /// Ingest entry point; owns persistence and classify enqueueing.
    pub ingestor: Ingestor,
    /// Vault for opening stored webhook secrets at point of use.
    pub vault: Arc<Vault>,
    /// Maximum accepted `X-Timestamp` skew in seconds.
    pub replay_window_seconds: i64,
}

/// Build the receiver router.
///
/// Hook routes sit behind the deadline layer: a provider still waiting at
/// 10 s gets a 408 without an ack and retries, which the dedup absorbs.
pub fn router(state: WebhookState) -> Router {
    let hooks = Router::new()
        .route("/hooks/sms/{account_id}", post(handlers::post_sms))
        .route("/hooks/chat/{account_id}", post(handlers::post_chat))
        .layer(TimeoutLayer::new(HANDLER_DEADLINE))
        .with_state(state.clone());

    let public = Router::new()
        .route("/healthz", get(handlers::healthz))
        .with_state(state);

    Router::new()
        .merge(hooks)
        .merge(public)
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until the cancellation token fires.
pub async fn start_server(
    bind_address: &str,
    state: WebhookState,
    cancel: CancellationToken,
) -> Result<(), ComptoirError> {
    let listener = tokio::net::TcpListener::bind(bind_address).await.map_err(|e| {
        ComptoirError::Internal(format!(
            "failed to bind webhook receiver to {bind_address}: {e}"
        ))
    })?;

    tracing::info!("webhook receiver listening on {bind_address}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| ComptoirError::Internal(format!("webhook receiver error: {e}")))?;

    Ok(())
}
