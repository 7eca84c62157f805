// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration CRUD and scheduler bookkeeping.

use chrono::{DateTime, Utc};
use comptoir_core::{ComptoirError, truncate_error_message};
use rusqlite::params;

use crate::database::{Database, parse_enum};
use crate::models::{Integration, SyncStatus};

/// Poll error messages are capped before they reach the row.
const SYNC_ERROR_MAX_BYTES: usize = 1024;

/// Backoff ceiling: never wait more than 8x the configured interval.
const BACKOFF_CAP_FACTOR: u32 = 8;

fn map_row(row: &rusqlite::Row<'_>) -> Result<Integration, rusqlite::Error> {
    Ok(Integration {
        integration_id: row.get(0)?,
        company_id: row.get(1)?,
        kind: parse_enum(2, row.get::<_, String>(2)?)?,
        display_name: row.get(3)?,
        imap_host: row.get(4)?,
        imap_port: row.get(5)?,
        imap_user: row.get(6)?,
        imap_use_ssl: row.get(7)?,
        account_id: row.get(8)?,
        phone_number: row.get(9)?,
        password_ct: row.get(10)?,
        api_key_ct: row.get(11)?,
        webhook_secret_ct: row.get(12)?,
        is_active: row.get(13)?,
        is_primary: row.get(14)?,
        sync_interval_minutes: row.get(15)?,
        last_sync_at: row.get(16)?,
        last_sync_status: parse_enum(17, row.get::<_, String>(17)?)?,
        last_sync_error: row.get(18)?,
        consecutive_failures: row.get(19)?,
        imap_last_uid: row.get(20)?,
        imap_uid_validity: row.get(21)?,
        created_at: row.get(22)?,
        updated_at: row.get(23)?,
    })
}

const SELECT_COLUMNS: &str = "integration_id, company_id, kind, display_name, imap_host, \
     imap_port, imap_user, imap_use_ssl, account_id, phone_number, password_ct, api_key_ct, \
     webhook_secret_ct, is_active, is_primary, sync_interval_minutes, last_sync_at, \
     last_sync_status, last_sync_error, consecutive_failures, imap_last_uid, \
     imap_uid_validity, created_at, updated_at";

/// Insert a new integration. When it is flagged primary, any existing
/// primary for the same `(company_id, kind)` is demoted in the same
/// transaction so the partial unique index never trips.
pub async fn insert(db: &Database, integration: &Integration) -> Result<(), ComptoirError> {
    let integration = integration.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            if integration.is_primary {
                tx.execute(
                    "UPDATE integrations SET is_primary = 0, updated_at = ?3
                     WHERE company_id = ?1 AND kind = ?2 AND is_primary = 1",
                    params![
                        integration.company_id,
                        integration.kind.to_string(),
                        integration.updated_at,
                    ],
                )?;
            }
            tx.execute(
                "INSERT INTO integrations (integration_id, company_id, kind, display_name,
                     imap_host, imap_port, imap_user, imap_use_ssl, account_id, phone_number,
                     password_ct, api_key_ct, webhook_secret_ct, is_active, is_primary,
                     sync_interval_minutes, last_sync_at, last_sync_status, last_sync_error,
                     consecutive_failures, imap_last_uid, imap_uid_validity, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                     ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)",
                params![
                    integration.integration_id,
                    integration.company_id,
                    integration.kind.to_string(),
                    integration.display_name,
                    integration.imap_host,
                    integration.imap_port,
                    integration.imap_user,
                    integration.imap_use_ssl,
                    integration.account_id,
                    integration.phone_number,
                    integration.password_ct,
                    integration.api_key_ct,
                    integration.webhook_secret_ct,
                    integration.is_active,
                    integration.is_primary,
                    integration.sync_interval_minutes,
                    integration.last_sync_at,
                    integration.last_sync_status.to_string(),
                    integration.last_sync_error,
                    integration.consecutive_failures,
                    integration.imap_last_uid,
                    integration.imap_uid_validity,
                    integration.created_at,
                    integration.updated_at,
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Rewrite the configuration columns of an existing integration, demoting
/// any other primary in the same transaction when this one becomes primary.
///
/// Runtime columns (`last_sync_*`, failure count, watermark) are left to
/// the scheduler's own updates.
pub async fn update(db: &Database, integration: &Integration) -> Result<(), ComptoirError> {
    let integration = integration.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            if integration.is_primary {
                tx.execute(
                    "UPDATE integrations SET is_primary = 0, updated_at = ?4
                     WHERE company_id = ?1 AND kind = ?2 AND is_primary = 1
                       AND integration_id <> ?3",
                    params![
                        integration.company_id,
                        integration.kind.to_string(),
                        integration.integration_id,
                        integration.updated_at,
                    ],
                )?;
            }
            tx.execute(
                "UPDATE integrations SET display_name = ?2, imap_host = ?3, imap_port = ?4,
                     imap_user = ?5, imap_use_ssl = ?6, account_id = ?7, phone_number = ?8,
                     password_ct = ?9, api_key_ct = ?10, webhook_secret_ct = ?11,
                     is_active = ?12, is_primary = ?13, sync_interval_minutes = ?14,
                     updated_at = ?15
                 WHERE integration_id = ?1",
                params![
                    integration.integration_id,
                    integration.display_name,
                    integration.imap_host,
                    integration.imap_port,
                    integration.imap_user,
                    integration.imap_use_ssl,
                    integration.account_id,
                    integration.phone_number,
                    integration.password_ct,
                    integration.api_key_ct,
                    integration.webhook_secret_ct,
                    integration.is_active,
                    integration.is_primary,
                    integration.sync_interval_minutes,
                    integration.updated_at,
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get an integration by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Integration>, ComptoirError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM integrations WHERE integration_id = ?1"
            ))?;
            let result = stmt.query_row(params![id], map_row);
            match result {
                Ok(integration) => Ok(Some(integration)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List all integrations for a tenant, newest first.
pub async fn list_for_company(
    db: &Database,
    company_id: &str,
) -> Result<Vec<Integration>, ComptoirError> {
    let company_id = company_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM integrations
                 WHERE company_id = ?1 ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map(params![company_id], map_row)?;
            let mut integrations = Vec::new();
            for row in rows {
                integrations.push(row?);
            }
            Ok(integrations)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find an active integration by kind and external account identifier.
///
/// Webhook routing: the path identifier matches `account_id` for chat
/// integrations and `account_id` or `phone_number` for SMS.
pub async fn find_by_account(
    db: &Database,
    kind: comptoir_core::types::IntegrationKind,
    account: &str,
) -> Result<Option<Integration>, ComptoirError> {
    let kind = kind.to_string();
    let account = account.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM integrations
                 WHERE kind = ?1 AND is_active = 1
                   AND (account_id = ?2 OR phone_number = ?2)
                 LIMIT 1"
            ))?;
            let result = stmt.query_row(params![kind, account], map_row);
            match result {
                Ok(integration) => Ok(Some(integration)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The interval the scheduler actually waits: the configured interval
/// stretched exponentially by consecutive failures, capped at 8x.
pub fn effective_interval_minutes(sync_interval_minutes: u32, consecutive_failures: u32) -> u32 {
    let factor = 1u32 << consecutive_failures.min(3);
    (sync_interval_minutes.saturating_mul(factor))
        .min(sync_interval_minutes.saturating_mul(BACKOFF_CAP_FACTOR))
}

/// List integrations due for a poll at `now`: active, a polling-capable
/// kind, and either never synced or past their backoff-adjusted interval.
pub async fn list_due(db: &Database, now: DateTime<Utc>) -> Result<Vec<Integration>, ComptoirError> {
    let candidates: Vec<Integration> = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM integrations
                 WHERE is_active = 1 AND kind = 'IMAP'
                 ORDER BY last_sync_at ASC"
            ))?;
            let rows = stmt.query_map([], map_row)?;
            let mut integrations = Vec::new();
            for row in rows {
                integrations.push(row?);
            }
            Ok(integrations)
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    Ok(candidates
        .into_iter()
        .filter(|i| is_due(i, now))
        .collect())
}

fn is_due(integration: &Integration, now: DateTime<Utc>) -> bool {
    match integration.last_sync_at {
        None => true,
        Some(last) => {
            let effective = effective_interval_minutes(
                integration.sync_interval_minutes,
                integration.consecutive_failures,
            );
            now - last >= chrono::Duration::minutes(i64::from(effective))
        }
    }
}

/// Record a successful poll: clears the error and the failure count.
pub async fn mark_sync_ok(
    db: &Database,
    id: &str,
    now: DateTime<Utc>,
) -> Result<(), ComptoirError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE integrations SET last_sync_at = ?2, last_sync_status = 'ok',
                     last_sync_error = NULL, consecutive_failures = 0, updated_at = ?2
                 WHERE integration_id = ?1",
                params![id, now],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record a failed poll attempt. The message is truncated to 1 KiB and the
/// failure count feeds the backoff.
pub async fn mark_sync_error(
    db: &Database,
    id: &str,
    error_message: &str,
    now: DateTime<Utc>,
) -> Result<(), ComptoirError> {
    let id = id.to_string();
    let message = truncate_error_message(error_message, SYNC_ERROR_MAX_BYTES);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE integrations SET last_sync_at = ?2, last_sync_status = 'error',
                     last_sync_error = ?3, consecutive_failures = consecutive_failures + 1,
                     updated_at = ?2
                 WHERE integration_id = ?1",
                params![id, now, message],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Advance the IMAP fetch watermark after a batch completed.
pub async fn update_imap_watermark(
    db: &Database,
    id: &str,
    uid_validity: u32,
    last_uid: u32,
    now: DateTime<Utc>,
) -> Result<(), ComptoirError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE integrations SET imap_uid_validity = ?2, imap_last_uid = ?3,
                     updated_at = ?4
                 WHERE integration_id = ?1",
                params![id, uid_validity, last_uid, now],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Demote the current primary for `(company_id, kind)`, if any.
pub async fn demote_primary(
    db: &Database,
    company_id: &str,
    kind: comptoir_core::types::IntegrationKind,
    now: DateTime<Utc>,
) -> Result<(), ComptoirError> {
    let company_id = company_id.to_string();
    let kind = kind.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE integrations SET is_primary = 0, updated_at = ?3
                 WHERE company_id = ?1 AND kind = ?2 AND is_primary = 1",
                params![company_id, kind, now],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Activate or deactivate an integration. Deactivation is how credential
/// corruption quarantines a channel without deleting it.
pub async fn set_active(
    db: &Database,
    id: &str,
    active: bool,
    now: DateTime<Utc>,
) -> Result<(), ComptoirError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE integrations SET is_active = ?2, updated_at = ?3
                 WHERE integration_id = ?1",
                params![id, active, now],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IntegrationKind;
    use chrono::TimeZone;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn make_integration(id: &str, kind: IntegrationKind) -> Integration {
        Integration {
            integration_id: id.to_string(),
            company_id: "co-1".to_string(),
            kind,
            display_name: format!("integration {id}"),
            imap_host: Some("imap.example.com".to_string()),
            imap_port: Some(993),
            imap_user: Some("inbox@example.com".to_string()),
            imap_use_ssl: true,
            account_id: None,
            phone_number: None,
            password_ct: Some("v1:bm9uY2U=:Y2lwaGVy".to_string()),
            api_key_ct: None,
            webhook_secret_ct: None,
            is_active: true,
            is_primary: false,
            sync_interval_minutes: 5,
            last_sync_at: None,
            last_sync_status: SyncStatus::Never,
            last_sync_error: None,
            consecutive_failures: 0,
            imap_last_uid: None,
            imap_uid_validity: None,
            created_at: t0(),
            updated_at: t0(),
        }
    }

    #[tokio::test]
    async fn insert_and_get_roundtrips() {
        let db = setup_db().await;
        let integration = make_integration("int-1", IntegrationKind::Imap);

        insert(&db, &integration).await.unwrap();
        let retrieved = get(&db, "int-1").await.unwrap().unwrap();

        assert_eq!(retrieved.integration_id, "int-1");
        assert_eq!(retrieved.kind, IntegrationKind::Imap);
        assert_eq!(retrieved.imap_host.as_deref(), Some("imap.example.com"));
        assert_eq!(retrieved.imap_port, Some(993));
        assert_eq!(retrieved.last_sync_status, SyncStatus::Never);
        assert_eq!(retrieved.sync_interval_minutes, 5);
        assert!(retrieved.last_sync_at.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn get_nonexistent_returns_none() {
        let db = setup_db().await;
        assert!(get(&db, "nope").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn inserting_second_primary_demotes_the_first() {
        let db = setup_db().await;
        let mut first = make_integration("int-a", IntegrationKind::Imap);
        first.is_primary = true;
        let mut second = make_integration("int-b", IntegrationKind::Imap);
        second.is_primary = true;

        insert(&db, &first).await.unwrap();
        insert(&db, &second).await.unwrap();

        let a = get(&db, "int-a").await.unwrap().unwrap();
        let b = get(&db, "int-b").await.unwrap().unwrap();
        assert!(!a.is_primary, "first primary should be demoted");
        assert!(b.is_primary);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn primary_demotion_is_scoped_to_company_and_kind() {
        let db = setup_db().await;
        let mut imap = make_integration("int-imap", IntegrationKind::Imap);
        imap.is_primary = true;
        let mut sms = make_integration("int-sms", IntegrationKind::SmsWebhook);
        sms.is_primary = true;
        sms.account_id = Some("acct-1".to_string());

        insert(&db, &imap).await.unwrap();
        insert(&db, &sms).await.unwrap();

        // Different kind: both stay primary.
        assert!(get(&db, "int-imap").await.unwrap().unwrap().is_primary);
        assert!(get(&db, "int-sms").await.unwrap().unwrap().is_primary);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn update_promotes_and_demotes_atomically() {
        let db = setup_db().await;
        let mut a = make_integration("int-a", IntegrationKind::Imap);
        a.is_primary = true;
        let b = make_integration("int-b", IntegrationKind::Imap);

        insert(&db, &a).await.unwrap();
        insert(&db, &b).await.unwrap();

        let mut b = get(&db, "int-b").await.unwrap().unwrap();
        b.is_primary = true;
        update(&db, &b).await.unwrap();

        assert!(!get(&db, "int-a").await.unwrap().unwrap().is_primary);
        assert!(get(&db, "int-b").await.unwrap().unwrap().is_primary);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn find_by_account_matches_account_id_or_phone() {
        let db = setup_db().await;
        let mut sms = make_integration("int-sms", IntegrationKind::SmsWebhook);
        sms.account_id = Some("acct-42".to_string());
        sms.phone_number = Some("33612345678".to_string());
        insert(&db, &sms).await.unwrap();

        let by_account = find_by_account(&db, IntegrationKind::SmsWebhook, "acct-42")
            .await
            .unwrap();
        assert!(by_account.is_some());

        let by_phone = find_by_account(&db, IntegrationKind::SmsWebhook, "33612345678")
            .await
            .unwrap();
        assert!(by_phone.is_some());

        let wrong_kind = find_by_account(&db, IntegrationKind::ChatWebhook, "acct-42")
            .await
            .unwrap();
        assert!(wrong_kind.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn find_by_account_skips_inactive() {
        let db = setup_db().await;
        let mut sms = make_integration("int-sms", IntegrationKind::SmsWebhook);
        sms.account_id = Some("acct-42".to_string());
        sms.is_active = false;
        insert(&db, &sms).await.unwrap();

        let found = find_by_account(&db, IntegrationKind::SmsWebhook, "acct-42")
            .await
            .unwrap();
        assert!(found.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_due_includes_never_synced_and_overdue_only() {
        let db = setup_db().await;
        let now = t0();

        // Never synced: due.
        insert(&db, &make_integration("int-never", IntegrationKind::Imap))
            .await
            .unwrap();

        // Synced 2 minutes ago with a 5 minute interval: not due.
        let fresh = make_integration("int-fresh", IntegrationKind::Imap);
        insert(&db, &fresh).await.unwrap();
        mark_sync_ok(&db, "int-fresh", now - chrono::Duration::minutes(2))
            .await
            .unwrap();

        // Synced 10 minutes ago: due.
        let stale = make_integration("int-stale", IntegrationKind::Imap);
        insert(&db, &stale).await.unwrap();
        mark_sync_ok(&db, "int-stale", now - chrono::Duration::minutes(10))
            .await
            .unwrap();

        // Webhook kinds are never polled.
        let mut sms = make_integration("int-sms", IntegrationKind::SmsWebhook);
        sms.account_id = Some("acct".to_string());
        insert(&db, &sms).await.unwrap();

        // Inactive is never due.
        let mut inactive = make_integration("int-off", IntegrationKind::Imap);
        inactive.is_active = false;
        insert(&db, &inactive).await.unwrap();

        let due = list_due(&db, now).await.unwrap();
        let ids: Vec<&str> = due.iter().map(|i| i.integration_id.as_str()).collect();
        assert!(ids.contains(&"int-never"));
        assert!(ids.contains(&"int-stale"));
        assert!(!ids.contains(&"int-fresh"));
        assert!(!ids.contains(&"int-sms"));
        assert!(!ids.contains(&"int-off"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn failures_stretch_the_effective_interval() {
        let db = setup_db().await;
        let now = t0();

        let integration = make_integration("int-err", IntegrationKind::Imap);
        insert(&db, &integration).await.unwrap();

        // Two consecutive failures: effective interval 5 * 4 = 20 minutes.
        mark_sync_error(&db, "int-err", "connect timeout", now - chrono::Duration::minutes(15))
            .await
            .unwrap();
        mark_sync_error(&db, "int-err", "connect timeout", now - chrono::Duration::minutes(15))
            .await
            .unwrap();

        let due = list_due(&db, now).await.unwrap();
        assert!(
            due.is_empty(),
            "15 minutes elapsed < 20 minute backoff, got {due:?}"
        );

        let due_later = list_due(&db, now + chrono::Duration::minutes(6))
            .await
            .unwrap();
        assert_eq!(due_later.len(), 1);

        db.close().await.unwrap();
    }

    #[test]
    fn effective_interval_caps_at_eight_times() {
        assert_eq!(effective_interval_minutes(5, 0), 5);
        assert_eq!(effective_interval_minutes(5, 1), 10);
        assert_eq!(effective_interval_minutes(5, 2), 20);
        assert_eq!(effective_interval_minutes(5, 3), 40);
        assert_eq!(effective_interval_minutes(5, 4), 40);
        assert_eq!(effective_interval_minutes(5, 100), 40);
    }

    #[tokio::test]
    async fn mark_sync_ok_clears_error_state() {
        let db = setup_db().await;
        let now = t0();
        insert(&db, &make_integration("int-1", IntegrationKind::Imap))
            .await
            .unwrap();

        mark_sync_error(&db, "int-1", "boom", now).await.unwrap();
        let after_err = get(&db, "int-1").await.unwrap().unwrap();
        assert_eq!(after_err.last_sync_status, SyncStatus::Error);
        assert_eq!(after_err.last_sync_error.as_deref(), Some("boom"));
        assert_eq!(after_err.consecutive_failures, 1);

        mark_sync_ok(&db, "int-1", now + chrono::Duration::minutes(5))
            .await
            .unwrap();
        let after_ok = get(&db, "int-1").await.unwrap().unwrap();
        assert_eq!(after_ok.last_sync_status, SyncStatus::Ok);
        assert!(after_ok.last_sync_error.is_none());
        assert_eq!(after_ok.consecutive_failures, 0);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn sync_error_message_is_truncated() {
        let db = setup_db().await;
        insert(&db, &make_integration("int-1", IntegrationKind::Imap))
            .await
            .unwrap();

        let long = "x".repeat(5000);
        mark_sync_error(&db, "int-1", &long, t0()).await.unwrap();

        let row = get(&db, "int-1").await.unwrap().unwrap();
        assert!(row.last_sync_error.unwrap().len() <= SYNC_ERROR_MAX_BYTES);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn watermark_roundtrips() {
        let db = setup_db().await;
        insert(&db, &make_integration("int-1", IntegrationKind::Imap))
            .await
            .unwrap();

        update_imap_watermark(&db, "int-1", 777, 4242, t0())
            .await
            .unwrap();

        let row = get(&db, "int-1").await.unwrap().unwrap();
        assert_eq!(row.imap_uid_validity, Some(777));
        assert_eq!(row.imap_last_uid, Some(4242));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn set_active_toggles() {
        let db = setup_db().await;
        insert(&db, &make_integration("int-1", IntegrationKind::Imap))
            .await
            .unwrap();

        set_active(&db, "int-1", false, t0()).await.unwrap();
        assert!(!get(&db, "int-1").await.unwrap().unwrap().is_active);

        set_active(&db, "int-1", true, t0()).await.unwrap();
        assert!(get(&db, "int-1").await.unwrap().unwrap().is_active);

        db.close().await.unwrap();
    }
}
