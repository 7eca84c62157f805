// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules, one per table plus the cross-table ingest write.

pub mod attachments;
pub mod clients;
pub mod conversations;
pub mod folders;
pub mod ingest;
pub mod integrations;
pub mod messages;
