// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Comptoir inbox core.

use thiserror::Error;

/// The primary error type used across the ingestion and classification
/// pipeline.
#[derive(Debug, Error)]
pub enum ComptoirError {
    /// Configuration errors (invalid TOML, missing required fields, bad key
    /// material).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure,
    /// migration failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Credential vault errors other than corrupt ciphertext (bad key
    /// length, unusable envelope format on seal).
    #[error("vault error: {0}")]
    Vault(String),

    /// Sealed credential failed authentication on open. The integration
    /// holding it must be disabled until the tenant re-enters the secret.
    #[error("credential corrupt: {0}")]
    CredentialCorrupt(String),

    /// Remote end rejected our credentials (IMAP LOGIN refused). Retrying
    /// with the same secret will not help.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Transient upstream failures (socket reset, timeout downstream,
    /// provider 429/5xx). Safe to retry with backoff.
    #[error("transient error: {message}")]
    Transient {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A single payload could not be parsed (unparseable MIME, malformed
    /// JSON body). The item is skipped; the batch continues.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// The message is already ingested. Not a failure; producers treat the
    /// re-delivery as accepted.
    #[error("duplicate message")]
    Duplicate,

    /// Webhook signature missing or mismatched. Nothing is persisted.
    #[error("invalid webhook signature")]
    SignatureInvalid,

    /// A referenced entity does not exist (unknown integration, unknown
    /// conversation).
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// LLM provider errors that are not plain transport failures (HTTP 4xx,
    /// unparseable completion).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An external call exceeded its deadline.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Local filesystem errors (attachment persistence, upload dir).
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Operational classification of an error, driving retry and surfacing
/// behavior at the pipeline edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Surface on the integration row; do not tighten the retry loop.
    Auth,
    /// Retry with capped backoff; log only.
    Transient,
    /// Skip the single item, count it, keep the batch going.
    Malformed,
    /// No-op success.
    Duplicate,
    /// Reject the request (401); zero side effects.
    SigInvalid,
    /// Disable the integration; surface to the tenant.
    CredentialCorrupt,
    /// Fail the request or poll without acking; nothing is lost upstream.
    Fatal,
}

impl ComptoirError {
    /// Map this error onto the operational taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ComptoirError::Auth(_) => ErrorKind::Auth,
            ComptoirError::Transient { .. }
            | ComptoirError::Timeout { .. }
            | ComptoirError::Provider { .. } => ErrorKind::Transient,
            ComptoirError::Malformed(_) => ErrorKind::Malformed,
            ComptoirError::Duplicate => ErrorKind::Duplicate,
            ComptoirError::SignatureInvalid => ErrorKind::SigInvalid,
            ComptoirError::CredentialCorrupt(_) => ErrorKind::CredentialCorrupt,
            ComptoirError::Config(_)
            | ComptoirError::Storage { .. }
            | ComptoirError::Vault(_)
            | ComptoirError::NotFound { .. }
            | ComptoirError::Io { .. }
            | ComptoirError::Internal(_) => ErrorKind::Fatal,
        }
    }

    /// Whether a retry with backoff is worthwhile.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

/// Truncate an error message for persistence on an integration row.
///
/// Cuts on a char boundary at or below `max_bytes` so arbitrarily long
/// upstream errors (full TLS chains, provider JSON bodies) cannot bloat the
/// database.
pub fn truncate_error_message(msg: &str, max_bytes: usize) -> String {
    if msg.len() <= max_bytes {
        return msg.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !msg.is_char_boundary(end) {
        end -= 1;
    }
    msg[..end].to_string()
}
