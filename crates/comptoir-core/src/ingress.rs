// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The normalized ingress record every source produces.
//!
//! IMAP fetching and the webhook receivers all reduce their provider
//! payloads to [`IngressMessage`] before handing off to the ingestor, so
//! dedup, threading, and persistence see one shape regardless of source.
//! After a commit the ingestor hands a [`ClassifyJob`] downstream.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::types::MessageDirection;

/// How many body bytes participate in a synthesized provider id.
const SYNTH_ID_BODY_PREFIX: usize = 256;

/// A normalized inbound (or mirrored outbound) message ready for ingestion.
#[derive(Debug, Clone)]
pub struct IngressMessage {
    pub integration_id: String,
    pub company_id: String,
    /// Provider-assigned stable id when the source has one (email
    /// Message-ID, SMS provider id). `None` triggers synthesis.
    pub provider_message_id: Option<String>,
    pub direction: MessageDirection,
    /// Raw sender handle as the provider gave it; the ingestor normalizes.
    pub sender_handle: String,
    pub recipients: Vec<String>,
    pub subject: Option<String>,
    pub body_text: String,
    pub body_html: Option<String>,
    pub attachments: Vec<IngressAttachment>,
    pub received_at: DateTime<Utc>,
    /// Threading hint when the source carries one (email In-Reply-To /
    /// References root, chat thread id). The ingestor falls back to
    /// subject+participants when absent.
    pub thread_hint: Option<String>,
}

/// An attachment as extracted from the provider payload, bytes in memory
/// until the ingestor persists them under the tenant's upload dir.
#[derive(Clone)]
pub struct IngressAttachment {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for IngressAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngressAttachment")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("data_len", &self.data.len())
            .finish()
    }
}

impl IngressMessage {
    /// The dedup key: the provider's own id, or a synthesized stable hash
    /// when the provider omits one.
    ///
    /// The synthesized id is a function of integration, sender, timestamp,
    /// and a body prefix, so re-delivery of the same payload maps to the
    /// same id and dedups cleanly.
    pub fn resolved_provider_id(&self) -> String {
        match &self.provider_message_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => synthesize_provider_id(
                &self.integration_id,
                &self.sender_handle,
                self.received_at,
                &self.body_text,
            ),
        }
    }
}

/// Unit of classification work, enqueued after an ingest commit.
///
/// Deliberately just the conversation id: everything the classifier needs
/// is reloaded from storage, so a dropped job loses nothing that the next
/// message on the conversation will not trigger again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifyJob {
    pub conversation_id: String,
}

/// Build a stable provider id for sources that do not assign one.
pub fn synthesize_provider_id(
    integration_id: &str,
    sender: &str,
    received_at: DateTime<Utc>,
    body: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(integration_id.as_bytes());
    hasher.update(b"|");
    hasher.update(sender.as_bytes());
    hasher.update(b"|");
    hasher.update(received_at.to_rfc3339().as_bytes());
    hasher.update(b"|");
    let mut end = body.len().min(SYNTH_ID_BODY_PREFIX);
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    hasher.update(body[..end].as_bytes());
    format!("synth-{}", hex::encode(hasher.finalize()))
}
