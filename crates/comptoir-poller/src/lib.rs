// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The IMAP polling scheduler.
//!
//! A fixed tick lists due integrations, filters them through a
//! process-local lease set so no mailbox is polled twice concurrently, and
//! fans the rest out to a bounded pool. Each job opens the sealed
//! credentials, pulls new mail above the UID watermark, and feeds every
//! message through the ingestor; the outcome lands back on the integration
//! row as `last_sync_*` bookkeeping that drives the failure backoff.
//!
//! Leases live only in this process. Restart safety comes from the
//! watermark plus the provider-id dedup, not from the lease set.

pub mod job;
pub mod scheduler;

pub use job::{PollOutcome, poll_integration};
pub use scheduler::{PollerContext, run};
