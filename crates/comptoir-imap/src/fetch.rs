// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Windowed fetch of new INBOX mail.
//!
//! The UID watermark is the primary anchor: while the mailbox keeps its
//! UIDVALIDITY, only UIDs above the stored high-water mark are searched.
//! When UIDVALIDITY changes (or no watermark exists yet) the search falls
//! back to an INTERNALDATE window and dedup absorbs the overlap. The
//! mailbox is opened with EXAMINE; ingestion never mutates server state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use comptoir_core::ComptoirError;
use futures::TryStreamExt;
use tracing::{debug, warn};

use crate::connect::ImapSession;

/// Where the previous poll left off.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchWindow {
    pub uid_validity: Option<u32>,
    pub last_uid: Option<u32>,
    /// Date fallback, normally `last_sync_at` minus clock-skew slack.
    pub since: Option<DateTime<Utc>>,
}

/// One fetched message, still raw RFC822 bytes.
#[derive(Debug, Clone)]
pub struct RawMail {
    pub uid: u32,
    pub body: Vec<u8>,
    pub internal_date: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct FetchBatch {
    /// Ascending by UID.
    pub mails: Vec<RawMail>,
    /// The mailbox's current UIDVALIDITY, to persist with the new watermark.
    pub uid_validity: u32,
    /// True when a stored watermark had to be discarded because the
    /// mailbox's UIDVALIDITY changed.
    pub watermark_reset: bool,
}

impl FetchBatch {
    /// The new UID high-water mark, when the batch is non-empty.
    pub fn max_uid(&self) -> Option<u32> {
        self.mails.last().map(|m| m.uid)
    }
}

fn map_imap_error(command: &str, e: async_imap::error::Error) -> ComptoirError {
    ComptoirError::Transient {
        message: format!("{command} failed: {e}"),
        source: Some(Box::new(e)),
    }
}

async fn run<T>(
    limit: Duration,
    command: &str,
    fut: impl Future<Output = async_imap::error::Result<T>>,
) -> Result<T, ComptoirError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(map_imap_error(command, e)),
        Err(_) => Err(ComptoirError::Timeout { duration: limit }),
    }
}

/// The UID SEARCH query for a window, given the mailbox's current
/// UIDVALIDITY.
fn search_query(window: &FetchWindow, uid_validity: u32) -> (String, bool) {
    let watermark_valid = matches!(
        (window.uid_validity, window.last_uid),
        (Some(stored), Some(_)) if stored == uid_validity
    );
    if watermark_valid {
        let last = window.last_uid.unwrap_or(0);
        (format!("UID {}:*", last.saturating_add(1)), true)
    } else {
        match window.since {
            Some(since) => (format!("SINCE {}", since.format("%d-%b-%Y")), false),
            None => ("ALL".to_string(), false),
        }
    }
}

/// Run-length compress sorted UIDs into an IMAP sequence set.
fn compress_uid_set(uids: &[u32]) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut start = uids[0];
    let mut prev = uids[0];
    for &uid in &uids[1..] {
        if uid == prev + 1 {
            prev = uid;
            continue;
        }
        parts.push(if start == prev {
            start.to_string()
        } else {
            format!("{start}:{prev}")
        });
        start = uid;
        prev = uid;
    }
    parts.push(if start == prev {
        start.to_string()
    } else {
        format!("{start}:{prev}")
    });
    parts.join(",")
}

/// Fetch everything newer than the window from INBOX.
pub async fn fetch_new(
    session: &mut ImapSession,
    window: &FetchWindow,
    command_timeout: Duration,
) -> Result<FetchBatch, ComptoirError> {
    let mailbox = run(command_timeout, "EXAMINE INBOX", session.examine("INBOX")).await?;
    let uid_validity = mailbox.uid_validity.unwrap_or(0);

    let (query, watermark_valid) = search_query(window, uid_validity);
    let watermark_reset =
        !watermark_valid && window.uid_validity.is_some() && window.last_uid.is_some();
    if watermark_reset {
        warn!(
            stored = window.uid_validity.unwrap_or(0),
            current = uid_validity,
            "UIDVALIDITY changed, falling back to date window"
        );
    }

    let found = run(command_timeout, "UID SEARCH", session.uid_search(&query)).await?;
    let mut uids: Vec<u32> = found
        .into_iter()
        .filter(|uid| match (watermark_valid, window.last_uid) {
            // A UID range `n:*` always matches the highest UID in the
            // mailbox, even when it is below n. Filter it out.
            (true, Some(last)) => *uid > last,
            _ => true,
        })
        .collect();
    uids.sort_unstable();

    if uids.is_empty() {
        return Ok(FetchBatch {
            mails: Vec::new(),
            uid_validity,
            watermark_reset,
        });
    }

    let set = compress_uid_set(&uids);
    debug!(count = uids.len(), %set, "fetching new mail");
    let fetches: Vec<async_imap::types::Fetch> = run(command_timeout, "UID FETCH", async {
        session
            .uid_fetch(&set, "(UID RFC822 INTERNALDATE)")
            .await?
            .try_collect()
            .await
    })
    .await?;

    let mut mails: Vec<RawMail> = Vec::with_capacity(fetches.len());
    for fetch in &fetches {
        let Some(uid) = fetch.uid else {
            continue;
        };
        let Some(body) = fetch.body() else {
            warn!(uid, "FETCH response without a body, skipping");
            continue;
        };
        mails.push(RawMail {
            uid,
            body: body.to_vec(),
            internal_date: fetch.internal_date().map(|d| d.with_timezone(&Utc)),
        });
    }
    mails.sort_unstable_by_key(|m| m.uid);

    Ok(FetchBatch {
        mails,
        uid_validity,
        watermark_reset,
    })
}
