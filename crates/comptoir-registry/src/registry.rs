// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Create/update contract for tenant integrations.
//!
//! The registry is the only writer of integration config columns. Plain
//! secrets enter here, are sealed through the vault, and leave as
//! ciphertext; an update with an empty or absent secret keeps the sealed
//! value already on the row. Runtime columns (sync status, failure count,
//! UID watermark) belong to the scheduler and are never touched here.

use chrono::{DateTime, Utc};
use comptoir_core::ComptoirError;
use comptoir_core::types::{Integration, IntegrationKind, SyncStatus};
use comptoir_storage::Database;
use comptoir_storage::queries::integrations;
use comptoir_vault::Vault;
use tracing::info;
use uuid::Uuid;

/// Tenant input for a new integration. Secrets arrive in plain text and
/// are sealed before anything is written.
#[derive(Debug, Clone)]
pub struct NewIntegration {
    pub company_id: String,
    pub kind: IntegrationKind,
    pub display_name: String,
    pub imap_host: Option<String>,
    pub imap_port: Option<u16>,
    pub imap_user: Option<String>,
    pub imap_use_ssl: bool,
    pub account_id: Option<String>,
    pub phone_number: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub is_primary: bool,
    pub sync_interval_minutes: u32,
}

/// Full config payload for an update. The kind is immutable; secrets left
/// `None` (or empty) preserve the existing ciphertext.
#[derive(Debug, Clone)]
pub struct UpdateIntegration {
    pub display_name: String,
    pub imap_host: Option<String>,
    pub imap_port: Option<u16>,
    pub imap_user: Option<String>,
    pub imap_use_ssl: bool,
    pub account_id: Option<String>,
    pub phone_number: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub is_active: bool,
    pub is_primary: bool,
    pub sync_interval_minutes: u32,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn seal_optional(vault: &Vault, plain: Option<String>) -> Result<Option<String>, ComptoirError> {
    match non_empty(plain) {
        Some(plain) => Ok(Some(vault.seal(&plain)?)),
        None => Ok(None),
    }
}

fn merge_secret(
    vault: &Vault,
    plain: Option<String>,
    existing_ct: Option<String>,
) -> Result<Option<String>, ComptoirError> {
    match non_empty(plain) {
        Some(plain) => Ok(Some(vault.seal(&plain)?)),
        None => Ok(existing_ct),
    }
}

fn require(present: bool, message: &str) -> Result<(), ComptoirError> {
    if present {
        Ok(())
    } else {
        Err(ComptoirError::Config(message.to_string()))
    }
}

/// Kind-specific required fields, checked on the sealed record so create
/// and update share one rule set.
fn validate(integration: &Integration) -> Result<(), ComptoirError> {
    require(
        !integration.display_name.trim().is_empty(),
        "display_name must not be empty",
    )?;
    require(
        integration.sync_interval_minutes >= 1,
        "sync_interval_minutes must be at least 1",
    )?;
    match integration.kind {
        IntegrationKind::Imap => {
            require(
                integration.imap_host.is_some(),
                "imap_host is required for IMAP integrations",
            )?;
            require(
                integration.imap_user.is_some(),
                "imap_user is required for IMAP integrations",
            )?;
            require(
                integration.password_ct.is_some(),
                "password is required for IMAP integrations",
            )?;
        }
        IntegrationKind::SmsWebhook => {
            require(
                integration.phone_number.is_some(),
                "phone_number is required for SMS_WEBHOOK integrations",
            )?;
        }
        IntegrationKind::ChatWebhook => {
            require(
                integration.account_id.is_some(),
                "account_id is required for CHAT_WEBHOOK integrations",
            )?;
        }
        IntegrationKind::GenericApi => {
            require(
                integration.api_key_ct.is_some(),
                "api_key is required for GENERIC_API integrations",
            )?;
        }
    }
    Ok(())
}

/// Validate, seal and persist a new integration. When `is_primary` is set,
/// the existing primary of the same `(company, kind)` is demoted in the
/// same transaction as the insert.
pub async fn create(
    db: &Database,
    vault: &Vault,
    new: NewIntegration,
    now: DateTime<Utc>,
) -> Result<Integration, ComptoirError> {
    let integration = Integration {
        integration_id: Uuid::new_v4().to_string(),
        company_id: new.company_id,
        kind: new.kind,
        display_name: new.display_name,
        imap_host: non_empty(new.imap_host),
        imap_port: new.imap_port,
        imap_user: non_empty(new.imap_user),
        imap_use_ssl: new.imap_use_ssl,
        account_id: non_empty(new.account_id),
        phone_number: non_empty(new.phone_number),
        password_ct: seal_optional(vault, new.password)?,
        api_key_ct: seal_optional(vault, new.api_key)?,
        webhook_secret_ct: seal_optional(vault, new.webhook_secret)?,
        is_active: true,
        is_primary: new.is_primary,
        sync_interval_minutes: new.sync_interval_minutes,
        last_sync_at: None,
        last_sync_status: SyncStatus::Never,
        last_sync_error: None,
        consecutive_failures: 0,
        imap_last_uid: None,
        imap_uid_validity: None,
        created_at: now,
        updated_at: now,
    };
    validate(&integration)?;
    integrations::insert(db, &integration).await?;
    info!(
        integration_id = %integration.integration_id,
        kind = %integration.kind,
        "integration created"
    );
    Ok(integration)
}

/// Re-validate and persist a config change. Runtime columns and the
/// creation timestamp ride through untouched.
pub async fn update(
    db: &Database,
    vault: &Vault,
    id: &str,
    update: UpdateIntegration,
    now: DateTime<Utc>,
) -> Result<Integration, ComptoirError> {
    let existing = integrations::get(db, id).await?.ok_or_else(|| {
        ComptoirError::NotFound {
            entity: "integration",
            id: id.to_string(),
        }
    })?;

    let merged = Integration {
        display_name: update.display_name,
        imap_host: non_empty(update.imap_host),
        imap_port: update.imap_port,
        imap_user: non_empty(update.imap_user),
        imap_use_ssl: update.imap_use_ssl,
        account_id: non_empty(update.account_id),
        phone_number: non_empty(update.phone_number),
        password_ct: merge_secret(vault, update.password, existing.password_ct.clone())?,
        api_key_ct: merge_secret(vault, update.api_key, existing.api_key_ct.clone())?,
        webhook_secret_ct: merge_secret(
            vault,
            update.webhook_secret,
            existing.webhook_secret_ct.clone(),
        )?,
        is_active: update.is_active,
        is_primary: update.is_primary,
        sync_interval_minutes: update.sync_interval_minutes,
        updated_at: now,
        ..existing
    };
    validate(&merged)?;
    integrations::update(db, &merged).await?;
    info!(integration_id = %merged.integration_id, "integration updated");
    Ok(merged)
}
