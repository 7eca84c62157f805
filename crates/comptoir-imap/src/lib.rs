// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! IMAP mail fetching for the Comptoir inbox core.
//!
//! Three stages, each its own module: [`connect`] establishes the TLS (or
//! plain) session and authenticates, [`fetch`] pulls the window of new
//! messages above the stored UID watermark, and [`extract`] turns raw
//! RFC822 bytes into the normalized ingress shape the rest of the pipeline
//! consumes. The poller composes them; nothing here touches the database.
//!
//! Mailboxes are opened read-only. No flags are set, nothing is expunged,
//! so running Comptoir next to a human mail client never changes what that
//! client sees.

pub mod connect;
pub mod extract;
pub mod fetch;

pub use connect::{DEFAULT_IMAP_PORT, ImapSession, ImapStream, ImapTimeouts, connect, logout};
pub use extract::extract;
pub use fetch::{FetchBatch, FetchWindow, RawMail, fetch_new};
