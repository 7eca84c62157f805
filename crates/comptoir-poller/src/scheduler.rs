// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tick loop, lease set, and bounded fan-out.
//!
//! A failed job marks its integration and releases its lease; it never
//! takes the scheduler down. The failure count on the row stretches the
//! effective interval, so `list_due` itself is the backoff.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use comptoir_core::types::Integration;
use comptoir_core::{ComptoirError, ErrorKind, metrics};
use comptoir_imap::ImapTimeouts;
use comptoir_ingest::Ingestor;
use comptoir_storage::Database;
use comptoir_storage::queries::integrations;
use comptoir_vault::Vault;
use dashmap::DashSet;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::job;

/// Everything a poll job needs, shared across the pool.
pub struct PollerContext {
    pub db: Database,
    pub vault: Arc<Vault>,
    pub ingestor: Ingestor,
    pub timeouts: ImapTimeouts,
    /// Scheduler wakeup period.
    pub tick: Duration,
    /// Maximum concurrent poll jobs.
    pub workers: usize,
}

/// Run the scheduler until the token fires.
///
/// The first tick runs immediately so overdue mailboxes are picked up at
/// startup; `list_due` keeps that from becoming a thundering poll.
/// In-flight jobs are not awaited on shutdown; they are crash-safe by
/// construction (watermark plus dedup).
pub async fn run(ctx: PollerContext, cancel: CancellationToken) {
    let ctx = Arc::new(ctx);
    let leases: Arc<DashSet<String>> = Arc::new(DashSet::new());
    let pool = Arc::new(Semaphore::new(ctx.workers));

    let mut interval = tokio::time::interval(ctx.tick);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = dispatch_due(&ctx, &leases, &pool).await {
                    warn!(error = %e, "poll dispatch failed");
                }
                metrics::record_poll_cycle();
            }
            _ = cancel.cancelled() => {
                info!("poller shutting down");
                break;
            }
        }
    }
}

/// Spawn a job for every due integration that is neither leased nor beyond
/// the pool budget.
async fn dispatch_due(
    ctx: &Arc<PollerContext>,
    leases: &Arc<DashSet<String>>,
    pool: &Arc<Semaphore>,
) -> Result<(), ComptoirError> {
    let due = integrations::list_due(&ctx.db, Utc::now()).await?;
    for integration in due {
        let id = integration.integration_id.clone();
        if !leases.insert(id.clone()) {
            debug!(integration_id = %id, "poll still in flight, skipping");
            continue;
        }
        let Ok(permit) = pool.clone().try_acquire_owned() else {
            // Pool saturated: drop the lease and leave the rest of the due
            // list for the next tick.
            leases.remove(&id);
            debug!("poll pool saturated, deferring to next tick");
            break;
        };
        let ctx = Arc::clone(ctx);
        let leases = Arc::clone(leases);
        tokio::spawn(async move {
            let _permit = permit;
            run_job(&ctx, &integration).await;
            leases.remove(&id);
        });
    }
    Ok(())
}

/// Execute one poll and record its outcome on the integration row.
///
/// Infallible on purpose: whatever happens inside lands on the row, not in
/// the scheduler loop.
async fn run_job(ctx: &PollerContext, integration: &Integration) {
    let id = integration.integration_id.as_str();
    match job::poll_integration(ctx, integration, Utc::now()).await {
        Ok(outcome) => {
            info!(
                integration_id = id,
                ingested = outcome.ingested,
                duplicates = outcome.duplicates,
                malformed = outcome.malformed,
                "poll complete"
            );
            if let Err(e) = integrations::mark_sync_ok(&ctx.db, id, Utc::now()).await {
                error!(integration_id = id, error = %e, "failed to record poll success");
            }
        }
        Err(e) => {
            metrics::record_poll_error();
            match e.kind() {
                ErrorKind::CredentialCorrupt => {
                    error!(
                        integration_id = id,
                        error = %e,
                        "stored credentials unusable, deactivating integration"
                    );
                    if let Err(e2) =
                        integrations::set_active(&ctx.db, id, false, Utc::now()).await
                    {
                        error!(integration_id = id, error = %e2, "failed to deactivate integration");
                    }
                }
                ErrorKind::Auth => {
                    warn!(integration_id = id, error = %e, "IMAP authentication failed");
                }
                _ => {
                    warn!(integration_id = id, error = %e, "poll failed");
                }
            }
            if let Err(e2) =
                integrations::mark_sync_error(&ctx.db, id, &e.to_string(), Utc::now()).await
            {
                error!(integration_id = id, error = %e2, "failed to record poll error");
            }
        }
    }
}
