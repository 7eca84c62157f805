// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MIME extraction into the normalized ingress shape.
//!
//! Body strategy: a genuine text/plain part is used as-is; an HTML-only
//! message is rendered to text with html2text. The HTML body, when one
//! exists, is stored alongside after an ammonia pass so whatever renders
//! it later never sees scripts or event handlers.

use chrono::{DateTime, Utc};
use comptoir_core::ComptoirError;
use comptoir_core::ingress::{IngressAttachment, IngressMessage};
use comptoir_core::types::{Integration, MessageDirection};
use mail_parser::{Message, MessageParser, MimeHeaders, PartType};

use crate::fetch::RawMail;

const TEXT_RENDER_WIDTH: usize = 80;

fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), TEXT_RENDER_WIDTH).unwrap_or_default()
}

/// The root of the reference chain identifies the thread; References lists
/// ancestors root-first, In-Reply-To only names the direct parent.
fn thread_hint(message: &Message<'_>) -> Option<String> {
    if let Some(references) = message.references().as_text_list() {
        if let Some(root) = references.first() {
            let root = root.trim();
            if !root.is_empty() {
                return Some(root.to_string());
            }
        }
    }
    message
        .in_reply_to()
        .as_text()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Parse one fetched mail into an [`IngressMessage`].
///
/// Any failure is `Malformed`: the caller logs it, counts it, and moves on
/// to the next message in the batch.
pub fn extract(integration: &Integration, raw: &RawMail) -> Result<IngressMessage, ComptoirError> {
    let message = MessageParser::default()
        .parse(&raw.body)
        .ok_or_else(|| ComptoirError::Malformed(format!("unparseable MIME at UID {}", raw.uid)))?;

    let sender_handle = message
        .from()
        .and_then(|address| address.first())
        .and_then(|addr| addr.address())
        .map(str::to_string)
        .ok_or_else(|| {
            ComptoirError::Malformed(format!("message at UID {} has no From address", raw.uid))
        })?;

    let recipients: Vec<String> = message
        .to()
        .map(|address| {
            address
                .iter()
                .filter_map(|addr| addr.address())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let provider_message_id = message
        .message_id()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string);

    let received_at = message
        .date()
        .and_then(|date| DateTime::<Utc>::from_timestamp(date.to_timestamp(), 0))
        .or(raw.internal_date)
        .unwrap_or_else(Utc::now);

    // mail-parser synthesizes the missing alternative of a body part;
    // inspect the part types so only genuine content is carried.
    let genuine_text: Option<String> = message.text_part(0).and_then(|part| match &part.body {
        PartType::Text(text) => Some(text.as_ref().to_string()),
        _ => None,
    });
    let genuine_html: Option<String> = message.html_part(0).and_then(|part| match &part.body {
        PartType::Html(html) => Some(html.as_ref().to_string()),
        _ => None,
    });
    let body_text = match &genuine_text {
        Some(text) => text.clone(),
        None => genuine_html.as_deref().map(html_to_text).unwrap_or_default(),
    };
    let body_html = genuine_html.as_deref().map(ammonia::clean);

    let mut attachments = Vec::new();
    for (index, part) in message.attachments().enumerate() {
        let file_name = part
            .attachment_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("attachment-{}", index + 1));
        let content_type = part.content_type().map(|ct| match ct.subtype() {
            Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
            None => ct.ctype().to_string(),
        });
        attachments.push(IngressAttachment {
            file_name,
            content_type,
            data: part.contents().to_vec(),
        });
    }

    Ok(IngressMessage {
        integration_id: integration.integration_id.clone(),
        company_id: integration.company_id.clone(),
        provider_message_id,
        direction: MessageDirection::Inbound,
        sender_handle,
        recipients,
        subject: message.subject().map(str::to_string),
        body_text,
        body_html,
        attachments,
        received_at,
        thread_hint: thread_hint(&message),
    })
}
