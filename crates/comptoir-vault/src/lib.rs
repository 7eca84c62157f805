// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential encryption for integration secrets.
//!
//! IMAP passwords and webhook signing secrets are sealed with AES-256-GCM
//! before they reach the database. The sealing key comes from the
//! `ENCRYPTION_KEY` deployment variable and only ever lives in memory.

pub mod crypto;
pub mod vault;

pub use vault::{KEY_ID_CURRENT, Vault, mask_secret};
