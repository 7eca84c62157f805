// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook receiver for push-based providers (SMS, chat) built on axum.
//!
//! Providers POST to `/hooks/{kind}/{account_id}`; the receiver resolves
//! the integration, verifies the HMAC signature against the raw body when
//! the integration carries a shared secret, normalizes the payload, and
//! hands it to the ingestor. A `2xx` goes out only after the ingest
//! transaction commits, so provider retries are always safe to absorb.

pub mod handlers;
pub mod payload;
pub mod server;
pub mod signature;

pub use server::{WebhookState, router, start_server};
