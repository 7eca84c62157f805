// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attachment metadata rows. The files themselves live under the tenant's
//! upload directory and are written before the owning transaction commits.

use comptoir_core::ComptoirError;
use rusqlite::params;

use crate::database::{Database, parse_enum};
use crate::models::Attachment;

const SELECT_COLUMNS: &str =
    "attachment_id, message_id, stored_path, original_name, media_class, size_bytes";

fn map_row(row: &rusqlite::Row<'_>) -> Result<Attachment, rusqlite::Error> {
    Ok(Attachment {
        attachment_id: row.get(0)?,
        message_id: row.get(1)?,
        stored_path: row.get(2)?,
        original_name: row.get(3)?,
        media_class: parse_enum(4, row.get::<_, String>(4)?)?,
        size_bytes: row.get(5)?,
    })
}

pub(crate) fn insert_in(
    conn: &rusqlite::Connection,
    attachment: &Attachment,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO attachments (attachment_id, message_id, stored_path, original_name,
             media_class, size_bytes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            attachment.attachment_id,
            attachment.message_id,
            attachment.stored_path,
            attachment.original_name,
            attachment.media_class.to_string(),
            attachment.size_bytes,
        ],
    )?;
    Ok(())
}

pub async fn insert(db: &Database, attachment: &Attachment) -> Result<(), ComptoirError> {
    let attachment = attachment.clone();
    db.connection()
        .call(move |conn| insert_in(conn, &attachment))
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn list_for_message(
    db: &Database,
    message_id: i64,
) -> Result<Vec<Attachment>, ComptoirError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM attachments WHERE message_id = ?1
                 ORDER BY attachment_id ASC"
            ))?;
            let rows = stmt.query_map(params![message_id], map_row)?;
            let mut attachments = Vec::new();
            for row in rows {
                attachments.push(row?);
            }
            Ok(attachments)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
