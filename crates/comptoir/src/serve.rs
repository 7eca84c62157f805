// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `comptoir serve` command implementation.
//!
//! Wires the whole ingestion core into one process: credential vault,
//! SQLite storage, classification worker pool, webhook receiver, and the
//! IMAP polling scheduler. Every long-running piece hangs off one
//! [`CancellationToken`]; SIGTERM/SIGINT cancels it, the receiver and
//! poller stop, the classifiers drain what is already queued, then the
//! database is checkpointed and closed.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use comptoir_classify::{ClassifyContext, ClassifyPool, FolderClassifier, LlmClient, Throttle};
use comptoir_config::ComptoirConfig;
use comptoir_core::{ComptoirError, metrics};
use comptoir_imap::ImapTimeouts;
use comptoir_ingest::Ingestor;
use comptoir_poller::PollerContext;
use comptoir_storage::Database;
use comptoir_vault::Vault;
use comptoir_webhook::WebhookState;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Capacity of the classification queue. Ingest logs and drops jobs when
/// it is full; the next message on the conversation rebuilds them.
const CLASSIFY_QUEUE_DEPTH: usize = 256;

/// How long the classification pool may keep working after cancellation.
const DRAIN_LIMIT: Duration = Duration::from_secs(10);

/// Runs the `comptoir serve` command.
pub async fn run_serve(config: ComptoirConfig) -> Result<(), ComptoirError> {
    init_tracing(&config.logging.level);
    info!(version = env!("CARGO_PKG_VERSION"), "starting comptoir serve");

    if let Some(addr) = &config.metrics.bind_address {
        install_metrics_exporter(addr)?;
    }

    // Both the receiver and the poller open sealed credentials, so serve
    // refuses to start without key material.
    let Some(key) = &config.vault.encryption_key else {
        return Err(ComptoirError::Config(
            "vault.encryption_key is not set; export ENCRYPTION_KEY or add it to comptoir.toml"
                .to_string(),
        ));
    };
    let vault = Arc::new(Vault::from_key_b64(key)?);

    let db = Database::open(&config.database.url).await?;
    info!(path = %config.database.url, "storage ready");

    let cancel = install_signal_handler();

    // Classification pipeline. Without an LLM key the folder stage is off
    // and the rule-based status stage still runs.
    let folder = folder_classifier(&config, &db)?;
    let (classify_tx, classify_rx) = mpsc::channel(CLASSIFY_QUEUE_DEPTH);
    let classify_ctx = ClassifyContext::new(
        db.clone(),
        config.classifier.resolved_keywords.clone(),
        folder,
    );
    let pool = ClassifyPool::spawn(
        config.classifier.workers,
        classify_ctx,
        classify_tx.clone(),
        classify_rx,
        cancel.clone(),
    );
    info!(workers = config.classifier.workers, "classification workers started");

    let ingestor =
        Ingestor::new(db.clone(), config.uploads.dir.clone()).with_classifier(classify_tx);

    // The receiver runs as a plain future so a failed bind surfaces here
    // instead of dying silently inside a detached task.
    let webhook = {
        let state = WebhookState {
            db: db.clone(),
            ingestor: ingestor.clone(),
            vault: vault.clone(),
            replay_window_seconds: config.webhook.replay_window_seconds,
        };
        let bind_address = config.webhook.bind_address.clone();
        let cancel = cancel.clone();
        async move { comptoir_webhook::start_server(&bind_address, state, cancel).await }
    };
    tokio::pin!(webhook);

    let poller = {
        let ctx = PollerContext {
            db: db.clone(),
            vault: vault.clone(),
            ingestor,
            timeouts: ImapTimeouts {
                connect: Duration::from_secs(config.imap.connect_timeout_seconds),
                command: Duration::from_secs(config.imap.command_timeout_seconds),
            },
            tick: Duration::from_secs(config.poller.tick_seconds),
            workers: config.poller.workers,
        };
        tokio::spawn(comptoir_poller::run(ctx, cancel.clone()))
    };
    info!(
        tick_seconds = config.poller.tick_seconds,
        workers = config.poller.workers,
        "poll scheduler started"
    );

    let webhook_result = tokio::select! {
        result = &mut webhook => {
            // Reaches here only on a bind or accept failure; take the
            // rest of the process down with it.
            if let Err(e) = &result {
                error!(error = %e, "webhook receiver failed");
            }
            cancel.cancel();
            result
        }
        _ = cancel.cancelled() => {
            info!("shutdown requested");
            // Graceful shutdown: the receiver finishes in-flight requests
            // and returns.
            webhook.await
        }
    };

    // Stop order: no new traffic, then the poller loop, then drain the
    // classification queue, then checkpoint and close storage.
    if let Err(e) = poller.await {
        error!(error = %e, "poll scheduler task panicked");
    }
    pool.drain(DRAIN_LIMIT).await;
    db.close().await?;
    webhook_result?;

    info!("comptoir serve shutdown complete");
    Ok(())
}

/// Build the folder classifier when an LLM key is configured.
fn folder_classifier(
    config: &ComptoirConfig,
    db: &Database,
) -> Result<Option<FolderClassifier>, ComptoirError> {
    let Some(api_key) = &config.llm.api_key else {
        info!("no LLM API key configured; folder classification disabled");
        return Ok(None);
    };
    let llm = LlmClient::new(
        api_key,
        &config.llm.base_url,
        &config.llm.model,
        Duration::from_secs(config.llm.timeout_seconds),
    )?;
    let throttle = Arc::new(Throttle::new(Duration::from_millis(config.llm.min_gap_ms)));
    info!(
        model = %config.llm.model,
        min_gap_ms = config.llm.min_gap_ms,
        "folder classification enabled"
    );
    Ok(Some(FolderClassifier::new(db.clone(), llm, throttle)))
}

/// Install the Prometheus exporter on its own listener.
fn install_metrics_exporter(bind_address: &str) -> Result<(), ComptoirError> {
    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        ComptoirError::Config(format!(
            "metrics.bind_address `{bind_address}` is not a socket address: {e}"
        ))
    })?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| {
            ComptoirError::Internal(format!("failed to install Prometheus exporter: {e}"))
        })?;
    metrics::register_metrics();
    info!(%addr, "prometheus exporter listening");
    Ok(())
}

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal
/// is received.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => {
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("comptoir={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_metrics_address_is_a_config_error() {
        let err = install_metrics_exporter("not-an-address").unwrap_err();
        assert!(err.to_string().contains("metrics.bind_address"));
    }

    #[tokio::test]
    async fn folder_classifier_is_none_without_a_key() {
        let config = comptoir_config::load_and_validate_str("").unwrap();
        let db = Database::open_in_memory().await.unwrap();
        assert!(folder_classifier(&config, &db).unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn folder_classifier_builds_with_a_key() {
        let config = comptoir_config::load_and_validate_str("[llm]\napi_key = \"sk-test\"\n")
            .unwrap();
        let db = Database::open_in_memory().await.unwrap();
        assert!(folder_classifier(&config, &db).unwrap().is_some());
        db.close().await.unwrap();
    }
}
