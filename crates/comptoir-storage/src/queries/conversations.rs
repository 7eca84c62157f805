// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation upsert, status/folder writes, and prompt-context reads.

use chrono::{DateTime, Utc};
use comptoir_core::ComptoirError;
use rusqlite::params;

use crate::database::{Database, parse_enum};
use crate::models::{Conversation, ConversationStatus, InboxMessage};

/// Input for a thread-key upsert. `conversation_id` is a candidate id used
/// only when the upsert creates a new row.
#[derive(Debug, Clone)]
pub struct NewConversation {
    pub conversation_id: String,
    pub company_id: String,
    pub integration_id: String,
    pub client_id: Option<String>,
    pub external_thread_key: String,
    pub subject: Option<String>,
    pub received_at: DateTime<Utc>,
}

const SELECT_COLUMNS: &str = "conversation_id, company_id, integration_id, client_id, \
     external_thread_key, subject, status, folder_id, pending_auto_reply, last_message_at, \
     created_at, updated_at";

fn map_row(row: &rusqlite::Row<'_>) -> Result<Conversation, rusqlite::Error> {
    Ok(Conversation {
        conversation_id: row.get(0)?,
        company_id: row.get(1)?,
        integration_id: row.get(2)?,
        client_id: row.get(3)?,
        external_thread_key: row.get(4)?,
        subject: row.get(5)?,
        status: parse_enum(6, row.get::<_, String>(6)?)?,
        folder_id: row.get(7)?,
        pending_auto_reply: row.get(8)?,
        last_message_at: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// Synchronous upsert used both standalone and inside the ingest
/// transaction. Returns the row and whether it was created.
///
/// An existing conversation keeps its subject and status; the upsert only
/// advances `last_message_at` (never backwards) and fills a missing
/// `client_id`.
pub(crate) fn upsert_by_thread_key_in(
    conn: &rusqlite::Connection,
    new: &NewConversation,
    now: DateTime<Utc>,
) -> Result<(Conversation, bool), rusqlite::Error> {
    let existing = {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM conversations
             WHERE company_id = ?1 AND integration_id = ?2 AND external_thread_key = ?3"
        ))?;
        let result = stmt.query_row(
            params![new.company_id, new.integration_id, new.external_thread_key],
            map_row,
        );
        match result {
            Ok(conversation) => Some(conversation),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e),
        }
    };

    match existing {
        Some(conversation) => {
            conn.execute(
                "UPDATE conversations SET last_message_at = MAX(last_message_at, ?2),
                     client_id = COALESCE(client_id, ?3), updated_at = ?4
                 WHERE conversation_id = ?1",
                params![
                    conversation.conversation_id,
                    new.received_at,
                    new.client_id,
                    now
                ],
            )?;
            let last_message_at = conversation.last_message_at.max(new.received_at);
            let client_id = conversation.client_id.clone().or_else(|| new.client_id.clone());
            Ok((
                Conversation {
                    last_message_at,
                    client_id,
                    updated_at: now,
                    ..conversation
                },
                false,
            ))
        }
        None => {
            conn.execute(
                "INSERT INTO conversations (conversation_id, company_id, integration_id,
                     client_id, external_thread_key, subject, status, folder_id,
                     pending_auto_reply, last_message_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, NULL, ?8, ?9, ?9)",
                params![
                    new.conversation_id,
                    new.company_id,
                    new.integration_id,
                    new.client_id,
                    new.external_thread_key,
                    new.subject,
                    ConversationStatus::Open.to_string(),
                    new.received_at,
                    now,
                ],
            )?;
            Ok((
                Conversation {
                    conversation_id: new.conversation_id.clone(),
                    company_id: new.company_id.clone(),
                    integration_id: Some(new.integration_id.clone()),
                    client_id: new.client_id.clone(),
                    external_thread_key: new.external_thread_key.clone(),
                    subject: new.subject.clone(),
                    status: ConversationStatus::Open,
                    folder_id: None,
                    pending_auto_reply: None,
                    last_message_at: new.received_at,
                    created_at: now,
                    updated_at: now,
                },
                true,
            ))
        }
    }
}

/// Find or create the conversation for a thread key.
pub async fn upsert_by_thread_key(
    db: &Database,
    new: &NewConversation,
    now: DateTime<Utc>,
) -> Result<Conversation, ComptoirError> {
    let new = new.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let (conversation, _created) = upsert_by_thread_key_in(&tx, &new, now)?;
            tx.commit()?;
            Ok(conversation)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a conversation by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Conversation>, ComptoirError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM conversations WHERE conversation_id = ?1"
            ))?;
            let result = stmt.query_row(params![id], map_row);
            match result {
                Ok(conversation) => Ok(Some(conversation)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Write a new status. Callers only invoke this on an actual change.
pub async fn set_status(
    db: &Database,
    id: &str,
    status: ConversationStatus,
    now: DateTime<Utc>,
) -> Result<(), ComptoirError> {
    let id = id.to_string();
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET status = ?2, updated_at = ?3
                 WHERE conversation_id = ?1",
                params![id, status, now],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Route a conversation into a folder (or out of all folders with `None`).
pub async fn set_folder(
    db: &Database,
    id: &str,
    folder_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), ComptoirError> {
    let id = id.to_string();
    let folder_id = folder_id.map(|f| f.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET folder_id = ?2, updated_at = ?3
                 WHERE conversation_id = ?1",
                params![id, folder_id, now],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Advance `last_message_at`, never backwards.
pub async fn touch_last_message_at(
    db: &Database,
    id: &str,
    received_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), ComptoirError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET last_message_at = MAX(last_message_at, ?2),
                     updated_at = ?3
                 WHERE conversation_id = ?1",
                params![id, received_at, now],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The last `limit` messages of a conversation in chronological order.
///
/// Ordering is `received_at` with the rowid breaking ties, so same-second
/// messages keep their insertion order.
pub async fn recent_messages(
    db: &Database,
    conversation_id: &str,
    limit: u32,
) -> Result<Vec<InboxMessage>, ComptoirError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT message_id, conversation_id, integration_id, provider_message_id,
                        direction, sender, recipients, subject, body_text, body_html,
                        received_at, created_at
                 FROM messages WHERE conversation_id = ?1
                 ORDER BY received_at DESC, message_id DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(
                params![conversation_id, limit],
                crate::queries::messages::map_row,
            )?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            // Oldest first.
            messages.reverse();
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
