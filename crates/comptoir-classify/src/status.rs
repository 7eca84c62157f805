// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic status rules.
//!
//! A pure function of the conversation, its recent messages, and the
//! tenant's closing-keyword list. Rules apply in order, first match wins:
//! an unanswered inbound inside the reply window, an outbound that has
//! sat unanswered for a week, a closing keyword in the last inbound,
//! otherwise the conversation is simply open. Archived conversations are
//! returned unchanged; nothing here ever un-archives a thread.

use chrono::{DateTime, Duration, Utc};
use comptoir_core::types::{Conversation, ConversationStatus, InboxMessage, MessageDirection};

/// An inbound younger than this with no outbound after it keeps the
/// conversation in `WAITING_REPLY`.
const WAITING_REPLY_WINDOW_HOURS: i64 = 48;

/// An outbound left unanswered this long marks the thread `PENDING`.
const PENDING_AGE_DAYS: i64 = 7;

/// Evaluate the status rules over a conversation.
///
/// `messages` must be in chronological order, oldest first, as
/// `conversations::recent_messages` returns them. The caller writes the
/// result back only when it differs from the stored status.
pub fn evaluate(
    conversation: &Conversation,
    messages: &[InboxMessage],
    resolved_keywords: &[String],
    now: DateTime<Utc>,
) -> ConversationStatus {
    if conversation.status == ConversationStatus::Archived {
        return ConversationStatus::Archived;
    }

    let Some(last) = messages.last() else {
        return ConversationStatus::Open;
    };

    // An inbound with no outbound after it is necessarily the last
    // message of the thread.
    if last.direction == MessageDirection::Inbound
        && now - last.received_at <= Duration::hours(WAITING_REPLY_WINDOW_HOURS)
    {
        return ConversationStatus::WaitingReply;
    }

    if last.direction == MessageDirection::Outbound
        && now - last.received_at >= Duration::days(PENDING_AGE_DAYS)
    {
        return ConversationStatus::Pending;
    }

    if let Some(last_inbound) = messages
        .iter()
        .rev()
        .find(|m| m.direction == MessageDirection::Inbound)
    {
        let body = last_inbound.body_text.to_lowercase();
        if resolved_keywords
            .iter()
            .any(|keyword| !keyword.is_empty() && body.contains(&keyword.to_lowercase()))
        {
            return ConversationStatus::Resolved;
        }
    }

    ConversationStatus::Open
}
