// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Normalization and ingestion for the Comptoir inbox core.
//!
//! Every source (IMAP poller, webhook receivers) reduces its payload to
//! an `IngressMessage` and hands it to the [`Ingestor`], which owns the
//! rest: handle normalization, thread-key derivation, attachment
//! persistence, the atomic database write, and the post-commit handoff to
//! the classifier.

pub mod attachments;
pub mod ingest;
pub mod normalize;

pub use comptoir_storage::queries::ingest::IngestOutcome;
pub use ingest::Ingestor;
