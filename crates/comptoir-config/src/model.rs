// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Comptoir inbox core.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Comptoir configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values; the
/// deployment environment variables (`ENCRYPTION_KEY`, `DATABASE_URL`, ...)
/// are layered last.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ComptoirConfig {
    /// SQLite database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Attachment upload root.
    #[serde(default)]
    pub uploads: UploadsConfig,

    /// Credential vault key material.
    #[serde(default)]
    pub vault: VaultConfig,

    /// LLM provider settings for the folder classifier.
    #[serde(default)]
    pub llm: LlmConfig,

    /// IMAP polling scheduler settings.
    #[serde(default)]
    pub poller: PollerConfig,

    /// Classification worker settings.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Webhook receiver settings.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// IMAP client timeouts.
    #[serde(default)]
    pub imap: ImapConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics exporter settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// SQLite database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file. `DATABASE_URL` overrides.
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "comptoir.db".to_string()
}

/// Attachment storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UploadsConfig {
    /// Root directory for attachment files. Files land under
    /// `<dir>/<company_id>/<uuid>.<ext>`. `UPLOAD_DIR` overrides.
    #[serde(default = "default_upload_dir")]
    pub dir: String,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: default_upload_dir(),
        }
    }
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

/// Credential vault configuration.
///
/// The key encrypts integration secrets at rest. It never appears in logs;
/// the `Debug` impl redacts it.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Base64-encoded 32-byte AES key. `ENCRYPTION_KEY` overrides.
    /// Required in production; `comptoir doctor` checks it.
    #[serde(default)]
    pub encryption_key: Option<String>,
}

impl std::fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultConfig")
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

/// LLM provider configuration for folder classification.
///
/// The client speaks the OpenAI-compatible chat completions shape so any
/// conforming provider (or a local gateway) works.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// API key. `LLM_API_KEY` overrides. `None` disables folder
    /// classification; status classification still runs.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier. `LLM_MODEL` overrides.
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Provider base URL.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Minimum gap between any two outbound LLM requests, process-wide.
    /// `LLM_MIN_GAP_MS` overrides.
    #[serde(default = "default_llm_min_gap_ms")]
    pub min_gap_ms: u64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_llm_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_llm_model(),
            base_url: default_llm_base_url(),
            min_gap_ms: default_llm_min_gap_ms(),
            timeout_seconds: default_llm_timeout_seconds(),
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("min_gap_ms", &self.min_gap_ms)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

fn default_llm_model() -> String {
    "small".to_string()
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_min_gap_ms() -> u64 {
    350
}

fn default_llm_timeout_seconds() -> u64 {
    20
}

/// IMAP polling scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PollerConfig {
    /// Seconds between scheduler wakeups. `POLL_TICK_SECONDS` overrides.
    #[serde(default = "default_poll_tick_seconds")]
    pub tick_seconds: u64,

    /// Maximum concurrent poll jobs. `POLL_WORKERS` overrides.
    #[serde(default = "default_poll_workers")]
    pub workers: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            tick_seconds: default_poll_tick_seconds(),
            workers: default_poll_workers(),
        }
    }
}

fn default_poll_tick_seconds() -> u64 {
    30
}

fn default_poll_workers() -> usize {
    4
}

/// Classification worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierConfig {
    /// Number of classification workers draining the in-process queue.
    /// `CLASSIFY_WORKERS` overrides.
    #[serde(default = "default_classify_workers")]
    pub workers: usize,

    /// Keywords that mark the last inbound message as closing the thread.
    /// Matched case-insensitively against the message text.
    #[serde(default = "default_resolved_keywords")]
    pub resolved_keywords: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            workers: default_classify_workers(),
            resolved_keywords: default_resolved_keywords(),
        }
    }
}

fn default_classify_workers() -> usize {
    2
}

fn default_resolved_keywords() -> Vec<String> {
    ["resolved", "solved", "closed", "résolu", "réglé", "terminé"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Webhook receiver configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    /// Address the receiver binds to. Deployment fronting (TLS, routing)
    /// is out of scope; loopback by default.
    #[serde(default = "default_webhook_bind_address")]
    pub bind_address: String,

    /// Maximum accepted `X-Timestamp` skew in seconds, when the provider
    /// sends one. Replays older than this are rejected.
    #[serde(default = "default_replay_window_seconds")]
    pub replay_window_seconds: i64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            bind_address: default_webhook_bind_address(),
            replay_window_seconds: default_replay_window_seconds(),
        }
    }
}

fn default_webhook_bind_address() -> String {
    "127.0.0.1:8088".to_string()
}

fn default_replay_window_seconds() -> i64 {
    300
}

/// IMAP client timeouts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ImapConfig {
    /// TCP + TLS establishment deadline in seconds.
    #[serde(default = "default_imap_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Per-command deadline in seconds (LOGIN, SELECT, FETCH...).
    #[serde(default = "default_imap_command_timeout")]
    pub command_timeout_seconds: u64,
}

impl Default for ImapConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: default_imap_connect_timeout(),
            command_timeout_seconds: default_imap_command_timeout(),
        }
    }
}

fn default_imap_connect_timeout() -> u64 {
    30
}

fn default_imap_command_timeout() -> u64 {
    60
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error). `RUST_LOG`
    /// still takes precedence through the env filter.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Metrics exporter configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Address for the Prometheus scrape endpoint. `None` disables the
    /// exporter; recording helpers then hit the no-op facade.
    #[serde(default)]
    pub bind_address: Option<String>,
}
