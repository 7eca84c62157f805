// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client lookup and auto-creation. Matching is exact string equality;
//! the ingest layer normalizes emails and phone numbers before calling in.

use chrono::{DateTime, Utc};
use comptoir_core::ComptoirError;
use rusqlite::params;

use crate::database::Database;
use crate::models::Client;

const SELECT_COLUMNS: &str = "client_id, company_id, display_name, email, phone, created_at";

fn map_row(row: &rusqlite::Row<'_>) -> Result<Client, rusqlite::Error> {
    Ok(Client {
        client_id: row.get(0)?,
        company_id: row.get(1)?,
        display_name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn find_by_column_in(
    conn: &rusqlite::Connection,
    column: &str,
    company_id: &str,
    value: &str,
) -> Result<Option<Client>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM clients
         WHERE company_id = ?1 AND {column} = ?2 LIMIT 1"
    ))?;
    let result = stmt.query_row(params![company_id, value], map_row);
    match result {
        Ok(client) => Ok(Some(client)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Match by email first, then phone; create with the candidate id when
/// neither matches. Used inside the ingest transaction.
pub(crate) fn find_or_create_in(
    conn: &rusqlite::Connection,
    company_id: &str,
    candidate_id: &str,
    display_name: &str,
    email: Option<&str>,
    phone: Option<&str>,
    now: DateTime<Utc>,
) -> Result<String, rusqlite::Error> {
    if let Some(email) = email {
        if let Some(client) = find_by_column_in(conn, "email", company_id, email)? {
            return Ok(client.client_id);
        }
    }
    if let Some(phone) = phone {
        if let Some(client) = find_by_column_in(conn, "phone", company_id, phone)? {
            return Ok(client.client_id);
        }
    }
    conn.execute(
        "INSERT INTO clients (client_id, company_id, display_name, email, phone, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![candidate_id, company_id, display_name, email, phone, now],
    )?;
    Ok(candidate_id.to_string())
}

/// Find a client of the company by exact (normalized) email.
pub async fn find_by_email(
    db: &Database,
    company_id: &str,
    email: &str,
) -> Result<Option<Client>, ComptoirError> {
    let company_id = company_id.to_string();
    let email = email.to_string();
    db.connection()
        .call(move |conn| find_by_column_in(conn, "email", &company_id, &email))
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find a client of the company by exact (normalized) phone number.
pub async fn find_by_phone(
    db: &Database,
    company_id: &str,
    phone: &str,
) -> Result<Option<Client>, ComptoirError> {
    let company_id = company_id.to_string();
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| find_by_column_in(conn, "phone", &company_id, &phone))
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn insert(db: &Database, client: &Client) -> Result<(), ComptoirError> {
    let client = client.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO clients (client_id, company_id, display_name, email, phone,
                     created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    client.client_id,
                    client.company_id,
                    client.display_name,
                    client.email,
                    client.phone,
                    client.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
