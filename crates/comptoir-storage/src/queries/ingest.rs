// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The single-transaction ingest write.
//!
//! One normalized message enters as an [`IngestRecord`] and either becomes a
//! client + conversation + message + attachment rows atomically, or is
//! reported as a duplicate. Partial writes never survive: any failure rolls
//! the whole transaction back, and the caller cleans up already-written
//! attachment files.
//!
//! Candidate ids for the rows that may be created are minted by the caller
//! so the closure stays free of id generation.

use chrono::{DateTime, Utc};
use comptoir_core::ComptoirError;
use tracing::debug;

use crate::database::Database;
use crate::models::{Attachment, MediaClass, MessageDirection};
use crate::queries::conversations::NewConversation;
use crate::queries::messages::NewMessage;
use crate::queries::{attachments, clients, conversations, messages};

/// Everything the ingest transaction needs, pre-normalized by the caller.
/// `client_email` and `client_phone` identify the remote party regardless
/// of direction; when both are absent no client row is touched.
#[derive(Debug, Clone)]
pub struct IngestRecord {
    pub company_id: String,
    pub integration_id: String,
    pub provider_message_id: String,
    pub direction: MessageDirection,
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: Option<String>,
    pub body_text: String,
    pub body_html: Option<String>,
    pub received_at: DateTime<Utc>,
    pub thread_key: String,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub client_display_name: String,
    pub candidate_client_id: String,
    pub candidate_conversation_id: String,
    pub attachments: Vec<IngestAttachment>,
}

/// An attachment whose file is already on disk at `stored_path`.
#[derive(Debug, Clone)]
pub struct IngestAttachment {
    pub attachment_id: String,
    pub stored_path: String,
    pub original_name: String,
    pub media_class: MediaClass,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted {
        message_id: i64,
        conversation_id: String,
        conversation_created: bool,
        client_id: Option<String>,
    },
    /// The provider message id was already ingested for this integration.
    Duplicate { message_id: i64 },
}

/// Run the full ingest write in one transaction.
pub async fn ingest_transaction(
    db: &Database,
    record: &IngestRecord,
    now: DateTime<Utc>,
) -> Result<IngestOutcome, ComptoirError> {
    let record = record.clone();
    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            if let Some(message_id) = messages::find_by_provider_id_in(
                &tx,
                &record.integration_id,
                &record.provider_message_id,
            )? {
                return Ok(IngestOutcome::Duplicate { message_id });
            }

            let client_id = if record.client_email.is_some() || record.client_phone.is_some() {
                Some(clients::find_or_create_in(
                    &tx,
                    &record.company_id,
                    &record.candidate_client_id,
                    &record.client_display_name,
                    record.client_email.as_deref(),
                    record.client_phone.as_deref(),
                    now,
                )?)
            } else {
                None
            };

            let (conversation, conversation_created) = conversations::upsert_by_thread_key_in(
                &tx,
                &NewConversation {
                    conversation_id: record.candidate_conversation_id.clone(),
                    company_id: record.company_id.clone(),
                    integration_id: record.integration_id.clone(),
                    client_id: client_id.clone(),
                    external_thread_key: record.thread_key.clone(),
                    subject: record.subject.clone(),
                    received_at: record.received_at,
                },
                now,
            )?;

            let message_id = messages::insert_in(
                &tx,
                &NewMessage {
                    conversation_id: conversation.conversation_id.clone(),
                    integration_id: record.integration_id.clone(),
                    provider_message_id: record.provider_message_id.clone(),
                    direction: record.direction,
                    sender: record.sender.clone(),
                    recipients: record.recipients.clone(),
                    subject: record.subject.clone(),
                    body_text: record.body_text.clone(),
                    body_html: record.body_html.clone(),
                    received_at: record.received_at,
                },
                now,
            )?;

            for attachment in &record.attachments {
                attachments::insert_in(
                    &tx,
                    &Attachment {
                        attachment_id: attachment.attachment_id.clone(),
                        message_id,
                        stored_path: attachment.stored_path.clone(),
                        original_name: attachment.original_name.clone(),
                        media_class: attachment.media_class,
                        size_bytes: attachment.size_bytes,
                    },
                )?;
            }

            tx.commit()?;
            Ok(IngestOutcome::Inserted {
                message_id,
                conversation_id: conversation.conversation_id,
                conversation_created,
                client_id,
            })
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    match &outcome {
        IngestOutcome::Inserted { message_id, conversation_id, .. } => {
            debug!(message_id, %conversation_id, "message ingested");
        }
        IngestOutcome::Duplicate { message_id } => {
            debug!(message_id, "duplicate provider message id, skipped");
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Client;
    use chrono::TimeZone;
    use rusqlite::params;

    async fn setup_db() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        db.connection()
            .call(|conn| {
                conn.execute_batch(
                    "INSERT INTO integrations (integration_id, company_id, kind, display_name,
                         created_at, updated_at)
                     VALUES ('int-1', 'co-1', 'IMAP', 'test',
                         '2026-03-01 00:00:00.000+00:00', '2026-03-01 00:00:00.000+00:00');",
                )?;
                Ok::<_, rusqlite::Error>(())
            })
            .await
            .unwrap();
        db
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn make_record(provider_id: &str) -> IngestRecord {
        IngestRecord {
            company_id: "co-1".to_string(),
            integration_id: "int-1".to_string(),
            provider_message_id: provider_id.to_string(),
            direction: MessageDirection::Inbound,
            sender: "alice@example.fr".to_string(),
            recipients: vec!["atelier@comptoir.example".to_string()],
            subject: Some("Devis 42".to_string()),
            body_text: "Bonjour".to_string(),
            body_html: None,
            received_at: t0(),
            thread_key: "thread-a".to_string(),
            client_email: Some("alice@example.fr".to_string()),
            client_phone: None,
            client_display_name: "alice".to_string(),
            candidate_client_id: format!("cl-{provider_id}"),
            candidate_conversation_id: format!("conv-{provider_id}"),
            attachments: Vec::new(),
        }
    }

    async fn count(db: &Database, table: &str) -> i64 {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        db.connection()
            .call(move |conn| conn.query_row(&sql, [], |row| row.get::<_, i64>(0)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn first_ingest_creates_client_conversation_and_message() {
        let db = setup_db().await;

        let outcome = ingest_transaction(&db, &make_record("prov-1"), t0())
            .await
            .unwrap();
        let IngestOutcome::Inserted {
            message_id,
            conversation_id,
            conversation_created,
            client_id,
        } = outcome
        else {
            panic!("expected an insert");
        };
        assert!(message_id > 0);
        assert_eq!(conversation_id, "conv-prov-1");
        assert!(conversation_created);
        assert_eq!(client_id.as_deref(), Some("cl-prov-1"));

        let conversation = conversations::get(&db, "conv-prov-1").await.unwrap().unwrap();
        assert_eq!(conversation.client_id.as_deref(), Some("cl-prov-1"));
        assert_eq!(conversation.subject.as_deref(), Some("Devis 42"));
        assert_eq!(conversation.last_message_at, t0());

        let listed = messages::list_for_conversation(&db, "conv-prov-1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].provider_message_id, "prov-1");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_provider_id_short_circuits() {
        let db = setup_db().await;

        let first = ingest_transaction(&db, &make_record("prov-1"), t0())
            .await
            .unwrap();
        let IngestOutcome::Inserted { message_id, .. } = first else {
            panic!("expected an insert");
        };

        // Replay with a different body; nothing may change.
        let mut replay = make_record("prov-1");
        replay.body_text = "replayed".to_string();
        replay.received_at = t0() + chrono::Duration::hours(1);
        let second = ingest_transaction(&db, &replay, t0()).await.unwrap();
        assert_eq!(second, IngestOutcome::Duplicate { message_id });

        assert_eq!(count(&db, "messages").await, 1);
        assert_eq!(count(&db, "conversations").await, 1);
        let conversation = conversations::get(&db, "conv-prov-1").await.unwrap().unwrap();
        assert_eq!(conversation.last_message_at, t0());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn same_thread_key_reuses_the_conversation() {
        let db = setup_db().await;
        ingest_transaction(&db, &make_record("prov-1"), t0()).await.unwrap();

        let mut followup = make_record("prov-2");
        followup.received_at = t0() + chrono::Duration::minutes(30);
        let outcome = ingest_transaction(&db, &followup, t0()).await.unwrap();
        let IngestOutcome::Inserted {
            conversation_id,
            conversation_created,
            ..
        } = outcome
        else {
            panic!("expected an insert");
        };
        assert_eq!(conversation_id, "conv-prov-1");
        assert!(!conversation_created);

        assert_eq!(count(&db, "conversations").await, 1);
        let conversation = conversations::get(&db, "conv-prov-1").await.unwrap().unwrap();
        assert_eq!(
            conversation.last_message_at,
            t0() + chrono::Duration::minutes(30)
        );

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn known_client_is_reused_instead_of_recreated() {
        let db = setup_db().await;
        clients::insert(
            &db,
            &Client {
                client_id: "cl-existing".to_string(),
                company_id: "co-1".to_string(),
                display_name: "Alice Martin".to_string(),
                email: Some("alice@example.fr".to_string()),
                phone: None,
                created_at: t0(),
            },
        )
        .await
        .unwrap();

        let outcome = ingest_transaction(&db, &make_record("prov-1"), t0())
            .await
            .unwrap();
        let IngestOutcome::Inserted { client_id, .. } = outcome else {
            panic!("expected an insert");
        };
        assert_eq!(client_id.as_deref(), Some("cl-existing"));
        assert_eq!(count(&db, "clients").await, 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn no_contact_info_skips_client_creation() {
        let db = setup_db().await;

        let mut record = make_record("prov-1");
        record.client_email = None;
        record.client_phone = None;
        let outcome = ingest_transaction(&db, &record, t0()).await.unwrap();
        let IngestOutcome::Inserted { client_id, .. } = outcome else {
            panic!("expected an insert");
        };
        assert!(client_id.is_none());
        assert_eq!(count(&db, "clients").await, 0);

        let conversation = conversations::get(&db, "conv-prov-1").await.unwrap().unwrap();
        assert!(conversation.client_id.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn attachments_land_in_the_same_transaction() {
        let db = setup_db().await;

        let mut record = make_record("prov-1");
        record.attachments = vec![
            IngestAttachment {
                attachment_id: "att-1".to_string(),
                stored_path: "uploads/co-1/att-1.pdf".to_string(),
                original_name: "devis.pdf".to_string(),
                media_class: MediaClass::Pdf,
                size_bytes: 1024,
            },
            IngestAttachment {
                attachment_id: "att-2".to_string(),
                stored_path: "uploads/co-1/att-2.jpg".to_string(),
                original_name: "photo.jpg".to_string(),
                media_class: MediaClass::Image,
                size_bytes: 2048,
            },
        ];
        let outcome = ingest_transaction(&db, &record, t0()).await.unwrap();
        let IngestOutcome::Inserted { message_id, .. } = outcome else {
            panic!("expected an insert");
        };

        let stored = attachments::list_for_message(&db, message_id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].original_name, "devis.pdf");
        assert_eq!(stored[1].media_class, MediaClass::Image);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn mid_transaction_failure_rolls_everything_back() {
        let db = setup_db().await;

        // Two attachments with the same primary key force a failure after
        // the client, conversation and message inserts already ran.
        let mut record = make_record("prov-1");
        let attachment = IngestAttachment {
            attachment_id: "att-dup".to_string(),
            stored_path: "uploads/co-1/att-dup.pdf".to_string(),
            original_name: "devis.pdf".to_string(),
            media_class: MediaClass::Pdf,
            size_bytes: 1024,
        };
        record.attachments = vec![attachment.clone(), attachment];

        let result = ingest_transaction(&db, &record, t0()).await;
        assert!(result.is_err());

        assert_eq!(count(&db, "clients").await, 0);
        assert_eq!(count(&db, "conversations").await, 0);
        assert_eq!(count(&db, "messages").await, 0);
        assert_eq!(count(&db, "attachments").await, 0);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn same_provider_id_on_other_integration_is_not_a_duplicate() {
        let db = setup_db().await;
        db.connection()
            .call(|conn| {
                conn.execute(
                    "INSERT INTO integrations (integration_id, company_id, kind, display_name,
                         created_at, updated_at)
                     VALUES ('int-2', 'co-1', 'SMS_WEBHOOK', 'sms',
                         '2026-03-01 00:00:00.000+00:00', '2026-03-01 00:00:00.000+00:00')",
                    params![],
                )?;
                Ok::<_, rusqlite::Error>(())
            })
            .await
            .unwrap();

        ingest_transaction(&db, &make_record("prov-1"), t0()).await.unwrap();

        let mut other = make_record("prov-1");
        other.integration_id = "int-2".to_string();
        other.thread_key = "+33612345678".to_string();
        other.candidate_conversation_id = "conv-sms".to_string();
        let outcome = ingest_transaction(&db, &other, t0()).await.unwrap();
        assert!(matches!(outcome, IngestOutcome::Inserted { .. }));
        assert_eq!(count(&db, "messages").await, 2);

        db.close().await.unwrap();
    }
}
