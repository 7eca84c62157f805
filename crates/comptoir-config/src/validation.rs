// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as key material shape, bind addresses, and worker
//! counts.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::diagnostic::ConfigError;
use crate::model::ComptoirConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &ComptoirConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.database.url.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "database.url must not be empty".to_string(),
        });
    }

    if config.uploads.dir.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "uploads.dir must not be empty".to_string(),
        });
    }

    // The key is optional at load time (doctor and tests run without one)
    // but when present it must decode to exactly 32 bytes.
    if let Some(key) = &config.vault.encryption_key {
        match BASE64.decode(key.trim()) {
            Ok(bytes) if bytes.len() == 32 => {}
            Ok(bytes) => {
                errors.push(ConfigError::Validation {
                    message: format!(
                        "vault.encryption_key must decode to 32 bytes, got {}",
                        bytes.len()
                    ),
                });
            }
            Err(_) => {
                errors.push(ConfigError::Validation {
                    message: "vault.encryption_key is not valid base64".to_string(),
                });
            }
        }
    }

    if config.llm.model.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "llm.model must not be empty".to_string(),
        });
    }

    if !config.llm.base_url.starts_with("http://") && !config.llm.base_url.starts_with("https://")
    {
        errors.push(ConfigError::Validation {
            message: format!(
                "llm.base_url must be an http(s) URL, got `{}`",
                config.llm.base_url
            ),
        });
    }

    if config.poller.tick_seconds < 1 {
        errors.push(ConfigError::Validation {
            message: "poller.tick_seconds must be at least 1".to_string(),
        });
    }

    if config.poller.workers < 1 {
        errors.push(ConfigError::Validation {
            message: "poller.workers must be at least 1".to_string(),
        });
    }

    if config.classifier.workers < 1 {
        errors.push(ConfigError::Validation {
            message: "classifier.workers must be at least 1".to_string(),
        });
    }

    if config.webhook.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ConfigError::Validation {
            message: format!(
                "webhook.bind_address `{}` is not a valid socket address",
                config.webhook.bind_address
            ),
        });
    }

    if config.webhook.replay_window_seconds < 0 {
        errors.push(ConfigError::Validation {
            message: "webhook.replay_window_seconds must be non-negative".to_string(),
        });
    }

    if config.imap.connect_timeout_seconds < 1 {
        errors.push(ConfigError::Validation {
            message: "imap.connect_timeout_seconds must be at least 1".to_string(),
        });
    }

    if config.imap.command_timeout_seconds < 1 {
        errors.push(ConfigError::Validation {
            message: "imap.command_timeout_seconds must be at least 1".to_string(),
        });
    }

    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "logging.level must be one of {}, got `{}`",
                LOG_LEVELS.join(", "),
                config.logging.level
            ),
        });
    }

    if let Some(addr) = &config.metrics.bind_address {
        if addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(ConfigError::Validation {
                message: format!("metrics.bind_address `{addr}` is not a valid socket address"),
            });
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
