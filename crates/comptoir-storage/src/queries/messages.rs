// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message rows. Immutable once written; dedup runs on
//! `(integration_id, provider_message_id)` before every insert.

use chrono::{DateTime, Utc};
use comptoir_core::ComptoirError;
use rusqlite::params;
use rusqlite::types::Type;

use crate::database::{Database, parse_enum};
use crate::models::{InboxMessage, MessageDirection};

/// Input for a message insert. The rowid is assigned by SQLite.
#[derive(Debug, Clone)]
pub struct NewMessage {
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
}

pub(crate) fn map_row(row: &rusqlite::Row<'_>) -> Result<InboxMessage, rusqlite::Error> {
    let recipients_json: String = row.get(6)?;
    let recipients = serde_json::from_str(&recipients_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;
    Ok(InboxMessage {
        message_id: row.get(0)?,
        conversation_id: row.get(1)?,
        integration_id: row.get(2)?,
        provider_message_id: row.get(3)?,
        direction: parse_enum(4, row.get::<_, String>(4)?)?,
        sender: row.get(5)?,
        recipients,
        subject: row.get(7)?,
        body_text: row.get(8)?,
        body_html: row.get(9)?,
        received_at: row.get(10)?,
        created_at: row.get(11)?,
    })
}

const SELECT_COLUMNS: &str = "message_id, conversation_id, integration_id, \
     provider_message_id, direction, sender, recipients, subject, body_text, body_html, \
     received_at, created_at";

pub(crate) fn insert_in(
    conn: &rusqlite::Connection,
    new: &NewMessage,
    now: DateTime<Utc>,
) -> Result<i64, rusqlite::Error> {
    let recipients_json = serde_json::to_string(&new.recipients)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    conn.execute(
        "INSERT INTO messages (conversation_id, integration_id, provider_message_id,
             direction, sender, recipients, subject, body_text, body_html, received_at,
             created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            new.conversation_id,
            new.integration_id,
            new.provider_message_id,
            new.direction.to_string(),
            new.sender,
            recipients_json,
            new.subject,
            new.body_text,
            new.body_html,
            new.received_at,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn find_by_provider_id_in(
    conn: &rusqlite::Connection,
    integration_id: &str,
    provider_message_id: &str,
) -> Result<Option<i64>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT message_id FROM messages
         WHERE integration_id = ?1 AND provider_message_id = ?2",
    )?;
    let result = stmt.query_row(params![integration_id, provider_message_id], |row| {
        row.get::<_, i64>(0)
    });
    match result {
        Ok(id) => Ok(Some(id)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Insert a message and return its rowid.
pub async fn insert(
    db: &Database,
    new: &NewMessage,
    now: DateTime<Utc>,
) -> Result<i64, ComptoirError> {
    let new = new.clone();
    db.connection()
        .call(move |conn| insert_in(conn, &new, now))
        .await
        .map_err(crate::database::map_tr_err)
}

/// The dedup probe. Returns the existing rowid when this provider message
/// was already ingested for the integration.
pub async fn exists_by_provider_id(
    db: &Database,
    integration_id: &str,
    provider_message_id: &str,
) -> Result<Option<i64>, ComptoirError> {
    let integration_id = integration_id.to_string();
    let provider_message_id = provider_message_id.to_string();
    db.connection()
        .call(move |conn| find_by_provider_id_in(conn, &integration_id, &provider_message_id))
        .await
        .map_err(crate::database::map_tr_err)
}

/// All messages of a conversation, oldest first.
pub async fn list_for_conversation(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<InboxMessage>, ComptoirError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM messages WHERE conversation_id = ?1
                 ORDER BY received_at ASC, message_id ASC"
            ))?;
            let rows = stmt.query_map(params![conversation_id], map_row)?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
