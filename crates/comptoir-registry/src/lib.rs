// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration registry for the Comptoir inbox core.
//!
//! Owns the tenant-facing create/update semantics for inbound channels:
//! kind-specific validation, secret sealing through the vault, and atomic
//! primary demotion. The scheduler-facing read side (`list_due`, the
//! backoff-adjusted interval) lives in storage and is re-exported here so
//! callers see one registry surface.

pub mod registry;

pub use comptoir_storage::queries::integrations::{effective_interval_minutes, list_due};
pub use registry::{NewIntegration, UpdateIntegration, create, update};
