// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Comptoir inbox pipeline.
//!
//! This crate provides the domain records, the error taxonomy, the
//! normalized ingress shape, and the metric helpers used throughout the
//! Comptoir workspace. It carries no I/O of its own.

pub mod error;
pub mod ingress;
pub mod metrics;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{ComptoirError, ErrorKind, truncate_error_message};
pub use ingress::{ClassifyJob, IngressAttachment, IngressMessage, synthesize_provider_id};
pub use types::{
    Attachment, Client, Conversation, ConversationStatus, Folder, InboxMessage, Integration,
    IntegrationKind, MediaClass, MessageDirection, SyncStatus,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_variants_construct() {
        let _config = ComptoirError::Config("bad key".into());
        let _storage = ComptoirError::Storage {
            source: Box::new(std::io::Error::other("down")),
        };
        let _vault = ComptoirError::Vault("short key".into());
        let _corrupt = ComptoirError::CredentialCorrupt("tag mismatch".into());
        let _auth = ComptoirError::Auth("LOGIN refused".into());
        let _transient = ComptoirError::Transient {
            message: "socket reset".into(),
            source: None,
        };
        let _malformed = ComptoirError::Malformed("bad mime".into());
        let _duplicate = ComptoirError::Duplicate;
        let _sig = ComptoirError::SignatureInvalid;
        let _not_found = ComptoirError::NotFound {
            entity: "integration",
            id: "int-1".into(),
        };
        let _provider = ComptoirError::Provider {
            message: "400".into(),
            source: None,
        };
        let _timeout = ComptoirError::Timeout {
            duration: std::time::Duration::from_secs(20),
        };
        let _internal = ComptoirError::Internal("unexpected".into());
    }

    #[test]
    fn records_are_cloneable() {
        let folder = Folder {
            folder_id: "f-1".into(),
            company_id: "co-1".into(),
            name: "Invoices".into(),
            is_system: false,
            auto_classify: true,
            ai_context: "Messages about billing".into(),
        };
        let copy = folder.clone();
        assert_eq!(copy.name, "Invoices");
        assert!(copy.auto_classify);
    }
}
