// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `comptoir integration` command implementation.
//!
//! Operator surface of the integration registry: register an inbound
//! channel for a tenant, list what a tenant has, deactivate a channel.
//! Secrets are never taken on the command line; flags such as
//! `--password-env` name an environment variable and the value is read
//! from there, sealed through the vault, and stored as ciphertext.

use chrono::Utc;
use clap::{Args, Subcommand};
use comptoir_config::ComptoirConfig;
use comptoir_core::ComptoirError;
use comptoir_core::types::{Integration, IntegrationKind};
use comptoir_registry::NewIntegration;
use comptoir_storage::Database;
use comptoir_storage::queries::integrations;
use comptoir_vault::Vault;

/// Manage inbound channel integrations.
#[derive(Subcommand, Debug)]
pub enum IntegrationCommands {
    /// Register a new inbound channel for a tenant.
    Add(AddArgs),
    /// List the channels registered for a tenant.
    List {
        /// Tenant identifier.
        #[arg(long)]
        company_id: String,
    },
    /// Deactivate a channel without deleting its message history.
    Deactivate {
        /// Integration id, as printed by `add` and `list`.
        id: String,
    },
}

/// Arguments for `comptoir integration add`.
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Tenant identifier.
    #[arg(long)]
    company_id: String,
    /// Channel kind: imap, sms-webhook, chat-webhook or generic-api.
    #[arg(long)]
    kind: String,
    /// Human-readable name shown in listings.
    #[arg(long)]
    display_name: String,
    /// IMAP server hostname.
    #[arg(long)]
    imap_host: Option<String>,
    /// IMAP server port (defaults to 993 when omitted).
    #[arg(long)]
    imap_port: Option<u16>,
    /// IMAP login user.
    #[arg(long)]
    imap_user: Option<String>,
    /// Connect over plain TCP instead of TLS.
    #[arg(long)]
    no_ssl: bool,
    /// Provider-side account identifier (chat webhooks).
    #[arg(long)]
    account_id: Option<String>,
    /// Provider-side phone number (SMS webhooks).
    #[arg(long)]
    phone_number: Option<String>,
    /// Name of the environment variable holding the IMAP password.
    #[arg(long)]
    password_env: Option<String>,
    /// Name of the environment variable holding the provider API key.
    #[arg(long)]
    api_key_env: Option<String>,
    /// Name of the environment variable holding the webhook signing secret.
    #[arg(long)]
    webhook_secret_env: Option<String>,
    /// Make this the primary channel of its kind for the tenant.
    #[arg(long)]
    primary: bool,
    /// Polling interval in minutes (IMAP only).
    #[arg(long, default_value_t = 5)]
    interval_minutes: u32,
}

/// Plain secret values after environment resolution, before sealing.
struct ResolvedSecrets {
    password: Option<String>,
    api_key: Option<String>,
    webhook_secret: Option<String>,
}

/// Runs a `comptoir integration` subcommand.
pub async fn run_integration(
    config: &ComptoirConfig,
    command: IntegrationCommands,
) -> Result<(), ComptoirError> {
    let db = Database::open(&config.database.url).await?;
    let result = match command {
        IntegrationCommands::Add(args) => add(&db, config, args).await,
        IntegrationCommands::List { company_id } => list(&db, &company_id).await,
        IntegrationCommands::Deactivate { id } => deactivate(&db, &id).await,
    };
    db.close().await?;
    result
}

async fn add(db: &Database, config: &ComptoirConfig, args: AddArgs) -> Result<(), ComptoirError> {
    let Some(key) = &config.vault.encryption_key else {
        return Err(ComptoirError::Config(
            "vault.encryption_key is not set; export ENCRYPTION_KEY or add it to comptoir.toml"
                .to_string(),
        ));
    };
    let vault = Vault::from_key_b64(key)?;

    let secrets = ResolvedSecrets {
        password: secret_from_env("--password-env", args.password_env.as_deref())?,
        api_key: secret_from_env("--api-key-env", args.api_key_env.as_deref())?,
        webhook_secret: secret_from_env(
            "--webhook-secret-env",
            args.webhook_secret_env.as_deref(),
        )?,
    };
    let new = new_integration(args, secrets)?;
    let integration = comptoir_registry::create(db, &vault, new, Utc::now()).await?;

    println!(
        "created {} ({})",
        integration.integration_id, integration.kind
    );
    if let Some(path) = webhook_path(&integration) {
        println!(
            "deliveries: POST http://{}{}",
            config.webhook.bind_address, path
        );
    }
    Ok(())
}

async fn list(db: &Database, company_id: &str) -> Result<(), ComptoirError> {
    let listed = integrations::list_for_company(db, company_id).await?;
    if listed.is_empty() {
        println!("no integrations for company {company_id}");
        return Ok(());
    }
    for integration in &listed {
        let state = if integration.is_active {
            "active"
        } else {
            "inactive"
        };
        println!(
            "{}  {:<12}  {:<24}  {:<8}  sync={} failures={}",
            integration.integration_id,
            integration.kind.to_string(),
            integration.display_name,
            state,
            integration.last_sync_status,
            integration.consecutive_failures,
        );
    }
    Ok(())
}

async fn deactivate(db: &Database, id: &str) -> Result<(), ComptoirError> {
    let integration =
        integrations::get(db, id)
            .await?
            .ok_or_else(|| ComptoirError::NotFound {
                entity: "integration",
                id: id.to_string(),
            })?;
    integrations::set_active(db, id, false, Utc::now()).await?;
    println!(
        "deactivated {} ({})",
        integration.integration_id, integration.display_name
    );
    Ok(())
}

/// Read a secret from the environment variable named by `var`.
///
/// The variable name travels through argv and logs; the value does not.
fn secret_from_env(flag: &str, var: Option<&str>) -> Result<Option<String>, ComptoirError> {
    match var {
        None => Ok(None),
        Some(name) => match std::env::var(name) {
            Ok(value) => Ok(Some(value)),
            Err(_) => Err(ComptoirError::Config(format!(
                "{flag} names environment variable {name}, which is not set"
            ))),
        },
    }
}

fn parse_kind(raw: &str) -> Result<IntegrationKind, ComptoirError> {
    let normalized = raw.trim().to_ascii_uppercase().replace('-', "_");
    normalized.parse().map_err(|_| {
        ComptoirError::Config(format!(
            "unknown integration kind `{raw}` (expected imap, sms-webhook, chat-webhook or generic-api)"
        ))
    })
}

fn new_integration(
    args: AddArgs,
    secrets: ResolvedSecrets,
) -> Result<NewIntegration, ComptoirError> {
    Ok(NewIntegration {
        company_id: args.company_id,
        kind: parse_kind(&args.kind)?,
        display_name: args.display_name,
        imap_host: args.imap_host,
        imap_port: args.imap_port,
        imap_user: args.imap_user,
        imap_use_ssl: !args.no_ssl,
        account_id: args.account_id,
        phone_number: args.phone_number,
        password: secrets.password,
        api_key: secrets.api_key,
        webhook_secret: secrets.webhook_secret,
        is_primary: args.primary,
        sync_interval_minutes: args.interval_minutes,
    })
}

/// Delivery path for webhook kinds, matching the receiver's routing: the
/// account id when set, else the phone number for SMS.
fn webhook_path(integration: &Integration) -> Option<String> {
    let identifier = integration
        .account_id
        .as_deref()
        .or(integration.phone_number.as_deref())?;
    match integration.kind {
        IntegrationKind::SmsWebhook => Some(format!("/hooks/sms/{identifier}")),
        IntegrationKind::ChatWebhook => Some(format!("/hooks/chat/{identifier}")),
        IntegrationKind::Imap | IntegrationKind::GenericApi => None,
    }
}
