// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One integration's poll: credentials, fetch, ingest, watermark.
//!
//! The session is closed as soon as the batch is in memory; extraction and
//! ingestion run without holding an IMAP connection. A malformed message
//! skips and the batch continues. A storage failure aborts the batch
//! before the watermark advances, so the next poll re-fetches the same
//! window and dedup absorbs everything already committed.

use std::time::Duration;

use chrono::{DateTime, Utc};
use comptoir_core::types::{Integration, IntegrationKind};
use comptoir_core::{ComptoirError, metrics};
use comptoir_imap::{FetchWindow, connect, extract, fetch_new, logout};
use comptoir_storage::queries::ingest::IngestOutcome;
use comptoir_storage::queries::integrations;
use secrecy::ExposeSecret;
use tracing::warn;

use crate::scheduler::PollerContext;

/// Best-effort LOGOUT gets this long before the connection is dropped.
const LOGOUT_LIMIT: Duration = Duration::from_secs(5);

/// Slack subtracted from `last_sync_at` for the date-window fallback, so a
/// UIDVALIDITY reset never loses mail to clock skew. IMAP SINCE has day
/// granularity; the overlap is absorbed by dedup.
const SINCE_SLACK_HOURS: i64 = 24;

/// Counters from one completed poll.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollOutcome {
    pub ingested: usize,
    pub duplicates: usize,
    pub malformed: usize,
}

/// Poll one IMAP integration end to end.
///
/// `CredentialCorrupt` and `Auth` propagate to the scheduler, which owns
/// the quarantine and bookkeeping decisions.
pub async fn poll_integration(
    ctx: &PollerContext,
    integration: &Integration,
    now: DateTime<Utc>,
) -> Result<PollOutcome, ComptoirError> {
    let Some(envelope) = &integration.password_ct else {
        return Err(ComptoirError::Config(
            "integration has no stored password".to_string(),
        ));
    };
    let password = ctx.vault.open(envelope)?;

    let mut session = connect(integration, password.expose_secret(), ctx.timeouts).await?;
    let window = FetchWindow {
        uid_validity: integration.imap_uid_validity,
        last_uid: integration.imap_last_uid,
        since: integration
            .last_sync_at
            .map(|t| t - chrono::Duration::hours(SINCE_SLACK_HOURS)),
    };
    let batch = match fetch_new(&mut session, &window, ctx.timeouts.command).await {
        Ok(batch) => {
            logout(session, LOGOUT_LIMIT).await;
            batch
        }
        Err(e) => {
            logout(session, LOGOUT_LIMIT).await;
            return Err(e);
        }
    };

    let mut outcome = PollOutcome::default();
    for raw in &batch.mails {
        let msg = match extract(integration, raw) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(
                    integration_id = %integration.integration_id,
                    uid = raw.uid,
                    error = %e,
                    "skipping malformed message"
                );
                metrics::record_malformed("IMAP");
                outcome.malformed += 1;
                continue;
            }
        };
        match ctx.ingestor.ingest(IntegrationKind::Imap, &msg, now).await {
            Ok(IngestOutcome::Inserted { .. }) => outcome.ingested += 1,
            Ok(IngestOutcome::Duplicate { .. }) => outcome.duplicates += 1,
            // Commits so far stay; the watermark does not advance.
            Err(e) => return Err(e),
        }
    }

    if let Some(max_uid) = batch.max_uid() {
        integrations::update_imap_watermark(
            &ctx.db,
            &integration.integration_id,
            batch.uid_validity,
            max_uid,
            now,
        )
        .await?;
    }

    Ok(outcome)
}
