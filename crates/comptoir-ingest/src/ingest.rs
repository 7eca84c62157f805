// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The ingest entry point every source funnels through.
//!
//! Order of operations: normalize the remote handle, derive the thread
//! key, write attachment files, then run the single-transaction database
//! write. Files go to disk first because the row needs their paths; a
//! rolled-back or duplicate transaction removes them again. The classify
//! job is enqueued only after the commit, so the classifier never sees a
//! conversation id that is not durable.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use comptoir_core::ingress::{ClassifyJob, IngressMessage};
use comptoir_core::types::{IntegrationKind, MessageDirection};
use comptoir_core::{ComptoirError, metrics};
use comptoir_storage::Database;
use comptoir_storage::queries::ingest::{IngestOutcome, IngestRecord, ingest_transaction};
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::attachments;
use crate::normalize::{self, NormalizedHandle};

/// Normalizes and persists ingress messages for every source.
#[derive(Clone)]
pub struct Ingestor {
    db: Database,
    upload_root: PathBuf,
    classify_tx: Option<mpsc::Sender<ClassifyJob>>,
}

impl Ingestor {
    pub fn new(db: Database, upload_root: impl Into<PathBuf>) -> Self {
        Self {
            db,
            upload_root: upload_root.into(),
            classify_tx: None,
        }
    }

    /// Attach the classification queue. Without it, inserts still commit
    /// but no classify jobs are produced (doctor and tests run this way).
    pub fn with_classifier(mut self, tx: mpsc::Sender<ClassifyJob>) -> Self {
        self.classify_tx = Some(tx);
        self
    }

    /// Ingest one normalized message.
    ///
    /// Returns `Duplicate` when the provider message id was already seen
    /// for this integration; producers treat that as success.
    pub async fn ingest(
        &self,
        kind: IntegrationKind,
        msg: &IngressMessage,
        now: DateTime<Utc>,
    ) -> Result<IngestOutcome, ComptoirError> {
        // The client row tracks the remote party, whichever side sent.
        let remote_raw = match msg.direction {
            MessageDirection::Inbound => msg.sender_handle.clone(),
            MessageDirection::Outbound => msg.recipients.first().cloned().unwrap_or_default(),
        };
        let remote = normalize::normalize_handle(&remote_raw);
        let (client_email, client_phone) = match &remote {
            NormalizedHandle::Email(addr) => (Some(addr.clone()), None),
            NormalizedHandle::Phone(number) => (None, Some(number.clone())),
            NormalizedHandle::Opaque(_) => (None, None),
        };

        let thread_key = match kind {
            IntegrationKind::Imap => normalize::email_thread_key(
                msg.thread_hint.as_deref(),
                msg.subject.as_deref(),
                &msg.sender_handle,
                &msg.recipients,
            ),
            _ => normalize::chat_thread_key(msg.thread_hint.as_deref(), remote.as_str()),
        };

        let stored = attachments::persist(
            &self.upload_root,
            &msg.company_id,
            &msg.attachments,
        )
        .await?;

        let record = IngestRecord {
            company_id: msg.company_id.clone(),
            integration_id: msg.integration_id.clone(),
            provider_message_id: msg.resolved_provider_id(),
            direction: msg.direction,
            sender: normalize::normalize_handle(&msg.sender_handle)
                .as_str()
                .to_string(),
            recipients: msg
                .recipients
                .iter()
                .map(|r| normalize::normalize_handle(r).as_str().to_string())
                .collect(),
            subject: msg.subject.clone(),
            body_text: msg.body_text.clone(),
            body_html: msg.body_html.clone(),
            received_at: msg.received_at,
            thread_key,
            client_email,
            client_phone,
            client_display_name: remote.display_name(),
            candidate_client_id: Uuid::new_v4().to_string(),
            candidate_conversation_id: Uuid::new_v4().to_string(),
            attachments: stored.clone(),
        };

        let kind_label = kind.to_string();
        match ingest_transaction(&self.db, &record, now).await {
            Ok(IngestOutcome::Inserted {
                message_id,
                conversation_id,
                conversation_created,
                client_id,
            }) => {
                metrics::record_ingested(&kind_label);
                self.enqueue_classification(&conversation_id);
                Ok(IngestOutcome::Inserted {
                    message_id,
                    conversation_id,
                    conversation_created,
                    client_id,
                })
            }
            Ok(IngestOutcome::Duplicate { message_id }) => {
                // The transaction never saw the attachment rows.
                attachments::remove_files(&stored).await;
                metrics::record_duplicate(&kind_label);
                Ok(IngestOutcome::Duplicate { message_id })
            }
            Err(e) => {
                attachments::remove_files(&stored).await;
                Err(e)
            }
        }
    }

    fn enqueue_classification(&self, conversation_id: &str) {
        let Some(tx) = &self.classify_tx else {
            return;
        };
        let job = ClassifyJob {
            conversation_id: conversation_id.to_string(),
        };
        // A dropped job is not data loss: the job carries nothing the next
        // message on the conversation will not regenerate.
        if let Err(e) = tx.try_send(job) {
            warn!(conversation_id, error = %e, "classify queue unavailable, job dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use comptoir_core::ingress::IngressAttachment;
    use comptoir_storage::queries::{clients, conversations, messages};

    async fn setup_db() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        db.connection()
            .call(|conn| {
                conn.execute_batch(
                    "INSERT INTO integrations (integration_id, company_id, kind, display_name,
                         created_at, updated_at)
                     VALUES
                        ('int-mail', 'co-1', 'IMAP', 'boite atelier',
                         '2026-03-01 00:00:00.000+00:00', '2026-03-01 00:00:00.000+00:00'),
                        ('int-sms', 'co-1', 'SMS_WEBHOOK', 'sms pro',
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

    fn make_email(provider_id: &str, sender: &str, subject: &str) -> IngressMessage {
        IngressMessage {
            integration_id: "int-mail".into(),
            company_id: "co-1".into(),
            provider_message_id: Some(provider_id.to_string()),
            direction: MessageDirection::Inbound,
            sender_handle: sender.to_string(),
            recipients: vec!["atelier@comptoir.example".into()],
            subject: Some(subject.to_string()),
            body_text: "Bonjour, pouvez-vous m'envoyer le devis ?".into(),
            body_html: None,
            attachments: vec![],
            received_at: t0(),
            thread_hint: None,
        }
    }

    fn make_sms(provider_id: Option<&str>, from: &str) -> IngressMessage {
        IngressMessage {
            integration_id: "int-sms".into(),
            company_id: "co-1".into(),
            provider_message_id: provider_id.map(String::from),
            direction: MessageDirection::Inbound,
            sender_handle: from.to_string(),
            recipients: vec!["+33100000000".into()],
            subject: None,
            body_text: "Je passe demain matin".into(),
            body_html: None,
            attachments: vec![],
            received_at: t0(),
            thread_hint: None,
        }
    }

    fn ingestor(db: &Database, root: &tempfile::TempDir) -> Ingestor {
        Ingestor::new(db.clone(), root.path())
    }

    #[tokio::test]
    async fn email_ingest_normalizes_the_client() {
        let db = setup_db().await;
        let root = tempfile::tempdir().unwrap();

        let msg = make_email("m-1", "  Alice.Martin@Example.FR ", "Devis 42");
        let outcome = ingestor(&db, &root)
            .ingest(IntegrationKind::Imap, &msg, t0())
            .await
            .unwrap();
        let IngestOutcome::Inserted { client_id, .. } = outcome else {
            panic!("expected an insert");
        };

        let client = clients::find_by_email(&db, "co-1", "alice.martin@example.fr")
            .await
            .unwrap()
            .expect("client created with normalized email");
        assert_eq!(Some(client.client_id), client_id);
        assert_eq!(client.display_name, "alice.martin");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn subject_reply_joins_the_conversation() {
        let db = setup_db().await;
        let root = tempfile::tempdir().unwrap();
        let ing = ingestor(&db, &root);

        let first = make_email("m-1", "alice@example.fr", "Devis 42");
        let IngestOutcome::Inserted { conversation_id, .. } = ing
            .ingest(IntegrationKind::Imap, &first, t0())
            .await
            .unwrap()
        else {
            panic!("expected an insert");
        };

        // The mirrored reply goes the other way, subject prefixed.
        let mut reply = make_email("m-2", "atelier@comptoir.example", "RE: Devis 42");
        reply.direction = MessageDirection::Outbound;
        reply.recipients = vec!["alice@example.fr".into()];
        reply.received_at = t0() + chrono::Duration::hours(2);
        let IngestOutcome::Inserted {
            conversation_id: reply_conversation,
            conversation_created,
            ..
        } = ing
            .ingest(IntegrationKind::Imap, &reply, t0())
            .await
            .unwrap()
        else {
            panic!("expected an insert");
        };

        assert_eq!(conversation_id, reply_conversation);
        assert!(!conversation_created);
        let listed = messages::list_for_conversation(&db, &conversation_id)
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reference_hint_overrides_the_subject() {
        let db = setup_db().await;
        let root = tempfile::tempdir().unwrap();
        let ing = ingestor(&db, &root);

        let mut first = make_email("m-1", "alice@example.fr", "Devis 42");
        first.thread_hint = Some("<root-1@example.fr>".into());
        let IngestOutcome::Inserted { conversation_id, .. } = ing
            .ingest(IntegrationKind::Imap, &first, t0())
            .await
            .unwrap()
        else {
            panic!("expected an insert");
        };

        let mut followup = make_email("m-2", "alice@example.fr", "Autre sujet");
        followup.thread_hint = Some("<root-1@example.fr>".into());
        let IngestOutcome::Inserted {
            conversation_id: second,
            ..
        } = ing
            .ingest(IntegrationKind::Imap, &followup, t0())
            .await
            .unwrap()
        else {
            panic!("expected an insert");
        };

        assert_eq!(conversation_id, second);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn sms_threads_collapse_onto_the_number() {
        let db = setup_db().await;
        let root = tempfile::tempdir().unwrap();
        let ing = ingestor(&db, &root);

        let IngestOutcome::Inserted { conversation_id, .. } = ing
            .ingest(
                IntegrationKind::SmsWebhook,
                &make_sms(Some("sms-1"), "+33 6 12 34 56 78"),
                t0(),
            )
            .await
            .unwrap()
        else {
            panic!("expected an insert");
        };

        // Differently formatted, same number.
        let IngestOutcome::Inserted {
            conversation_id: second,
            ..
        } = ing
            .ingest(
                IntegrationKind::SmsWebhook,
                &make_sms(Some("sms-2"), "+33612345678"),
                t0(),
            )
            .await
            .unwrap()
        else {
            panic!("expected an insert");
        };
        assert_eq!(conversation_id, second);

        let conversation = conversations::get(&db, &conversation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.external_thread_key, "+33612345678");

        let client = clients::find_by_phone(&db, "co-1", "+33612345678")
            .await
            .unwrap();
        assert!(client.is_some());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_removes_freshly_written_files() {
        let db = setup_db().await;
        let root = tempfile::tempdir().unwrap();
        let ing = ingestor(&db, &root);

        let mut msg = make_sms(Some("sms-1"), "+33612345678");
        msg.attachments = vec![IngressAttachment {
            file_name: "photo.jpg".into(),
            content_type: Some("image/jpeg".into()),
            data: vec![0xff, 0xd8, 0xff],
        }];

        let first = ing
            .ingest(IntegrationKind::SmsWebhook, &msg, t0())
            .await
            .unwrap();
        assert!(matches!(first, IngestOutcome::Inserted { .. }));

        let second = ing
            .ingest(IntegrationKind::SmsWebhook, &msg, t0())
            .await
            .unwrap();
        assert!(matches!(second, IngestOutcome::Duplicate { .. }));

        // Only the first delivery's file survives.
        let tenant_dir = root.path().join("co-1");
        let files: Vec<_> = std::fs::read_dir(&tenant_dir).unwrap().collect();
        assert_eq!(files.len(), 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn failed_transaction_removes_files() {
        let db = setup_db().await;
        let root = tempfile::tempdir().unwrap();
        let ing = ingestor(&db, &root);

        // Unknown integration violates the foreign key inside the
        // transaction, after the file is already on disk.
        let mut msg = make_sms(Some("sms-1"), "+33612345678");
        msg.integration_id = "int-ghost".into();
        msg.attachments = vec![IngressAttachment {
            file_name: "photo.jpg".into(),
            content_type: None,
            data: vec![1, 2, 3],
        }];

        let result = ing.ingest(IntegrationKind::SmsWebhook, &msg, t0()).await;
        assert!(result.is_err());

        let tenant_dir = root.path().join("co-1");
        let leftover = std::fs::read_dir(&tenant_dir)
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftover, 0);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn classify_job_fires_on_insert_not_on_duplicate() {
        let db = setup_db().await;
        let root = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        let ing = ingestor(&db, &root).with_classifier(tx);

        let msg = make_sms(Some("sms-1"), "+33612345678");
        let IngestOutcome::Inserted { conversation_id, .. } = ing
            .ingest(IntegrationKind::SmsWebhook, &msg, t0())
            .await
            .unwrap()
        else {
            panic!("expected an insert");
        };

        let job = rx.try_recv().unwrap();
        assert_eq!(job.conversation_id, conversation_id);

        ing.ingest(IntegrationKind::SmsWebhook, &msg, t0())
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn partial_batch_replay_inserts_only_the_tail() {
        // A poll that died after two of three messages re-fetches the
        // whole window next time. The two commits absorb as duplicates
        // and only the third lands.
        let db = setup_db().await;
        let root = tempfile::tempdir().unwrap();
        let ing = ingestor(&db, &root);

        let batch = [
            make_email("m-1", "alice@example.fr", "Devis 42"),
            make_email("m-2", "alice@example.fr", "RE: Devis 42"),
            make_email("m-3", "alice@example.fr", "RE: Devis 42"),
        ];
        for msg in &batch[..2] {
            let outcome = ing.ingest(IntegrationKind::Imap, msg, t0()).await.unwrap();
            assert!(matches!(outcome, IngestOutcome::Inserted { .. }));
        }

        let mut inserted = 0;
        let mut duplicates = 0;
        for msg in &batch {
            match ing.ingest(IntegrationKind::Imap, msg, t0()).await.unwrap() {
                IngestOutcome::Inserted { conversation_id, .. } => {
                    inserted += 1;
                    let listed = messages::list_for_conversation(&db, &conversation_id)
                        .await
                        .unwrap();
                    assert_eq!(listed.len(), 3);
                }
                IngestOutcome::Duplicate { .. } => duplicates += 1,
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(duplicates, 2);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn synthesized_ids_dedup_redelivery_without_provider_id() {
        let db = setup_db().await;
        let root = tempfile::tempdir().unwrap();
        let ing = ingestor(&db, &root);

        let msg = make_sms(None, "+33612345678");
        let first = ing
            .ingest(IntegrationKind::SmsWebhook, &msg, t0())
            .await
            .unwrap();
        assert!(matches!(first, IngestOutcome::Inserted { .. }));

        let replay = ing
            .ingest(IntegrationKind::SmsWebhook, &msg, t0())
            .await
            .unwrap();
        assert!(matches!(replay, IngestOutcome::Duplicate { .. }));

        db.close().await.unwrap();
    }
}
