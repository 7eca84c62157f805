// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! The canonical types are defined in `comptoir-core::types` for use across
//! crate boundaries. This module re-exports them for convenience within the
//! storage crate.

pub use comptoir_core::types::{
    Attachment, Client, Conversation, ConversationStatus, Folder, InboxMessage, Integration,
    IntegrationKind, MediaClass, MessageDirection, SyncStatus,
};
