// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./comptoir.toml` > `~/.config/comptoir/comptoir.toml`
//! > `/etc/comptoir/comptoir.toml`, then `COMPTOIR_*` environment overrides,
//! then the deployment environment variables (`ENCRYPTION_KEY`,
//! `DATABASE_URL`, ...) the platform injects.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use tracing::debug;

use crate::model::ComptoirConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/comptoir/comptoir.toml` (system-wide)
/// 3. `~/.config/comptoir/comptoir.toml` (user XDG config)
/// 4. `./comptoir.toml` (local directory)
/// 5. `COMPTOIR_*` environment variables
/// 6. Deployment environment variables (`ENCRYPTION_KEY`, `DATABASE_URL`, ...)
pub fn load_config() -> Result<ComptoirConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a specific TOML string only (no XDG lookup, no env).
///
/// Used by tests and callers that supply the full configuration inline.
pub fn load_config_from_str(toml_content: &str) -> Result<ComptoirConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ComptoirConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ComptoirConfig, figment::Error> {
    debug!(path = %path.display(), "loading config file");
    Figment::new()
        .merge(Serialized::defaults(ComptoirConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .merge(deployment_env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    let user_config = dirs::config_dir()
        .map(|d| d.join("comptoir/comptoir.toml"))
        .unwrap_or_default();
    debug!(user_config = %user_config.display(), "layering config sources");
    Figment::new()
        .merge(Serialized::defaults(ComptoirConfig::default()))
        .merge(Toml::file("/etc/comptoir/comptoir.toml"))
        .merge(Toml::file(user_config))
        .merge(Toml::file("comptoir.toml"))
        .merge(env_provider())
        .merge(deployment_env_provider())
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// CRITICAL: Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names. For example, `COMPTOIR_LLM_API_KEY` must
/// map to `llm.api_key`, not `llm.api.key`.
fn env_provider() -> Env {
    Env::prefixed("COMPTOIR_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: COMPTOIR_POLLER_TICK_SECONDS -> "poller_tick_seconds"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("database_", "database.", 1)
            .replacen("uploads_", "uploads.", 1)
            .replacen("vault_", "vault.", 1)
            .replacen("llm_", "llm.", 1)
            .replacen("poller_", "poller.", 1)
            .replacen("classifier_", "classifier.", 1)
            .replacen("webhook_", "webhook.", 1)
            .replacen("imap_", "imap.", 1)
            .replacen("logging_", "logging.", 1)
            .replacen("metrics_", "metrics.", 1);
        mapped.into()
    })
}

/// Provider for the unprefixed deployment variables the hosting platform
/// injects. Layered last so they win over every file and `COMPTOIR_*` value.
fn deployment_env_provider() -> Env {
    Env::raw()
        .only(&[
            "ENCRYPTION_KEY",
            "DATABASE_URL",
            "UPLOAD_DIR",
            "LLM_API_KEY",
            "LLM_MODEL",
            "LLM_MIN_GAP_MS",
            "POLL_TICK_SECONDS",
            "POLL_WORKERS",
            "CLASSIFY_WORKERS",
        ])
        .map(|key| {
            let mapped = match key.as_str() {
                "encryption_key" => "vault.encryption_key",
                "database_url" => "database.url",
                "upload_dir" => "uploads.dir",
                "llm_api_key" => "llm.api_key",
                "llm_model" => "llm.model",
                "llm_min_gap_ms" => "llm.min_gap_ms",
                "poll_tick_seconds" => "poller.tick_seconds",
                "poll_workers" => "poller.workers",
                "classify_workers" => "classifier.workers",
                other => other,
            };
            mapped.to_string().into()
        })
}
