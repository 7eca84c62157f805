// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical domain records and enums for the inbox core.
//!
//! These are the shapes the storage layer persists and the pipeline stages
//! pass around. Storage stores enums as their `Display` strings and parses
//! them back with `FromStr`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The kind of inbound channel an integration connects to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrationKind {
    Imap,
    SmsWebhook,
    ChatWebhook,
    GenericApi,
}

impl IntegrationKind {
    /// Whether the scheduler drives this kind (pull) or a provider pushes
    /// into us (webhooks).
    pub fn supports_polling(&self) -> bool {
        matches!(self, IntegrationKind::Imap)
    }
}

/// Conversation status. `Archived` is terminal for the auto-classifier:
/// only an explicit tenant action moves a conversation out of it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationStatus {
    Open,
    Pending,
    WaitingReply,
    Resolved,
    Archived,
}

/// Direction of a message relative to the tenant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

/// Result of the last poll attempt, persisted on the integration row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Ok,
    Error,
    Never,
}

/// Coarse media classification for attachments, derived from the file
/// extension (or content type when the name carries none).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaClass {
    Image,
    Pdf,
    Document,
    Other,
}

impl MediaClass {
    /// Classify by file extension, case-insensitive.
    pub fn from_file_name(name: &str) -> MediaClass {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "heic" | "svg" => MediaClass::Image,
            "pdf" => MediaClass::Pdf,
            "doc" | "docx" | "odt" | "xls" | "xlsx" | "ods" | "csv" | "ppt" | "pptx" | "txt"
            | "rtf" => MediaClass::Document,
            _ => MediaClass::Other,
        }
    }
}

/// A configured inbound channel for one tenant.
///
/// Secret fields hold sealed ciphertext envelopes, never plaintext; the
/// vault opens them at point of use only.
#[derive(Debug, Clone)]
pub struct Integration {
    pub integration_id: String,
    pub company_id: String,
    pub kind: IntegrationKind,
    pub display_name: String,
    pub imap_host: Option<String>,
    pub imap_port: Option<u16>,
    pub imap_user: Option<String>,
    pub imap_use_ssl: bool,
    pub account_id: Option<String>,
    pub phone_number: Option<String>,
    pub password_ct: Option<String>,
    pub api_key_ct: Option<String>,
    pub webhook_secret_ct: Option<String>,
    pub is_active: bool,
    pub is_primary: bool,
    pub sync_interval_minutes: u32,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_sync_status: SyncStatus,
    pub last_sync_error: Option<String>,
    pub consecutive_failures: u32,
    /// Highest UID already fetched from INBOX. Only meaningful while
    /// `imap_uid_validity` still matches the mailbox.
    pub imap_last_uid: Option<u32>,
    pub imap_uid_validity: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A durable thread of messages with one external party on one integration.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub conversation_id: String,
    pub company_id: String,
    /// Nulled when the integration is deleted; the thread is retained.
    pub integration_id: Option<String>,
    pub client_id: Option<String>,
    pub external_thread_key: String,
    pub subject: Option<String>,
    pub status: ConversationStatus,
    pub folder_id: Option<String>,
    pub pending_auto_reply: Option<String>,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One atomic message inside a conversation. Immutable once ingested.
///
/// `message_id` is the storage rowid; insertion order is monotonic and
/// breaks ordering ties between equal `received_at` values.
#[derive(Debug, Clone)]
pub struct InboxMessage {
    pub message_id: i64,
    pub conversation_id: String,
    pub integration_id: String,
    pub provider_message_id: String,
    pub direction: MessageDirection,
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: Option<String>,
    pub body_text: String,
    pub body_html: Option<String>,
    pub received_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Metadata row for a stored attachment file. The original filename lives
/// here only; on disk the file is a UUID under the tenant's upload dir.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub attachment_id: String,
    pub message_id: i64,
    pub stored_path: String,
    pub original_name: String,
    pub media_class: MediaClass,
    pub size_bytes: u64,
}

/// A tenant folder conversations can be routed into.
#[derive(Debug, Clone)]
pub struct Folder {
    pub folder_id: String,
    pub company_id: String,
    pub name: String,
    pub is_system: bool,
    /// When true, the AI classifier may route conversations here.
    pub auto_classify: bool,
    /// Tenant-written description the classifier feeds to the model.
    pub ai_context: String,
}

/// An external party the tenant talks to. Auto-created with a synthetic
/// display name when an inbound sender matches no existing client.
#[derive(Debug, Clone)]
pub struct Client {
    pub client_id: String,
    pub company_id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}
