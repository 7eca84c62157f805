// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation classification for the Comptoir inbox core.
//!
//! Two stages run per conversation, in order, both idempotent:
//!
//! 1. **Status** ([`status::evaluate`]) is a pure rule set over the
//!    conversation and its recent messages. No I/O, no model.
//! 2. **Folder** ([`FolderClassifier`]) asks the configured LLM to pick
//!    one of the tenant's auto-classify folders, or `NONE` to leave the
//!    conversation where it is. Calls are spaced by a process-wide
//!    [`Throttle`].
//!
//! Jobs arrive on an mpsc channel fed by the ingest paths and are drained
//! by a small fixed [`ClassifyPool`]. A failed conversation is requeued
//! with capped backoff, then abandoned; the job carries only the
//! conversation id and is rebuilt by the next message that lands on it.

pub mod folder;
pub mod llm;
pub mod status;
pub mod throttle;
pub mod worker;

pub use folder::FolderClassifier;
pub use llm::LlmClient;
pub use throttle::Throttle;
pub use worker::{ClassifyContext, ClassifyPool};
