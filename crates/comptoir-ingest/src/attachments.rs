// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attachment persistence under the tenant upload directory.
//!
//! Files land at `<upload_root>/<company_id>/<uuid>.<ext>`; the original
//! filename is only ever stored in the database row, so a hostile name
//! like `../../etc/passwd` never reaches the filesystem. Files are written
//! before the ingest transaction commits and removed again (best effort)
//! when it rolls back.

use std::path::{Path, PathBuf};

use comptoir_core::ComptoirError;
use comptoir_core::ingress::IngressAttachment;
use comptoir_core::types::MediaClass;
use comptoir_storage::queries::ingest::IngestAttachment;
use tracing::warn;
use uuid::Uuid;

/// Longest extension carried over onto the stored file name.
const MAX_EXT_LEN: usize = 10;

/// Extension for the stored copy: lowercase ASCII alphanumerics from the
/// original name, else `bin`.
fn storage_extension(original_name: &str) -> String {
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if ext.is_empty()
        || ext.len() > MAX_EXT_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        "bin".to_string()
    } else {
        ext
    }
}

/// Write every attachment to disk and return the rows to persist.
///
/// On any write failure the files already written by this call are
/// removed before the error propagates, so a failed ingest leaves no
/// stray bytes behind.
pub async fn persist(
    upload_root: &Path,
    company_id: &str,
    incoming: &[IngressAttachment],
) -> Result<Vec<IngestAttachment>, ComptoirError> {
    if incoming.is_empty() {
        return Ok(Vec::new());
    }

    let dir = upload_root.join(company_id);
    tokio::fs::create_dir_all(&dir).await?;

    let mut stored = Vec::with_capacity(incoming.len());
    for attachment in incoming {
        let attachment_id = Uuid::new_v4().to_string();
        let ext = storage_extension(&attachment.file_name);
        let path = dir.join(format!("{attachment_id}.{ext}"));

        if let Err(e) = tokio::fs::write(&path, &attachment.data).await {
            remove_files(&stored).await;
            return Err(e.into());
        }

        stored.push(IngestAttachment {
            attachment_id,
            stored_path: path.to_string_lossy().into_owned(),
            original_name: attachment.file_name.clone(),
            media_class: MediaClass::from_file_name(&attachment.file_name),
            size_bytes: attachment.data.len() as u64,
        });
    }
    Ok(stored)
}

/// Best-effort removal of already-written attachment files after a
/// rolled-back transaction. Failures are logged and swallowed: a stray
/// file is recoverable garbage, a failed ingest is not.
pub async fn remove_files(stored: &[IngestAttachment]) {
    for attachment in stored {
        let path = PathBuf::from(&attachment.stored_path);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(
                path = %path.display(),
                error = %e,
                "could not remove orphaned attachment file"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_attachment(name: &str, data: &[u8]) -> IngressAttachment {
        IngressAttachment {
            file_name: name.to_string(),
            content_type: None,
            data: data.to_vec(),
        }
    }

    #[test]
    fn extensions_are_sanitized() {
        assert_eq!(storage_extension("devis.PDF"), "pdf");
        assert_eq!(storage_extension("photo.jpeg"), "jpeg");
        assert_eq!(storage_extension("no-extension"), "bin");
        assert_eq!(storage_extension("weird.p!f"), "bin");
        assert_eq!(storage_extension("piece.jointée"), "bin");
        assert_eq!(storage_extension("x.verylongextension"), "bin");
    }

    #[tokio::test]
    async fn files_land_under_the_tenant_directory() {
        let root = tempfile::tempdir().unwrap();
        let stored = persist(
            root.path(),
            "co-1",
            &[
                make_attachment("devis.pdf", b"%PDF-1.4"),
                make_attachment("photo.jpg", &[0xff, 0xd8]),
            ],
        )
        .await
        .unwrap();

        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].original_name, "devis.pdf");
        assert_eq!(stored[0].media_class, MediaClass::Pdf);
        assert_eq!(stored[0].size_bytes, 8);
        assert_eq!(stored[1].media_class, MediaClass::Image);

        for attachment in &stored {
            let path = PathBuf::from(&attachment.stored_path);
            assert!(path.starts_with(root.path().join("co-1")));
            assert!(path.exists());
            // Stored name is the generated id, never the original.
            assert!(!path.file_name().unwrap().to_string_lossy().contains("devis"));
        }
    }

    #[tokio::test]
    async fn hostile_names_cannot_escape_the_upload_root() {
        let root = tempfile::tempdir().unwrap();
        let stored = persist(
            root.path(),
            "co-1",
            &[make_attachment("../../etc/passwd", b"root:x:0:0")],
        )
        .await
        .unwrap();

        let path = PathBuf::from(&stored[0].stored_path);
        assert!(path.starts_with(root.path().join("co-1")));
        assert_eq!(stored[0].original_name, "../../etc/passwd");
    }

    #[tokio::test]
    async fn remove_files_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let stored = persist(root.path(), "co-1", &[make_attachment("a.txt", b"x")])
            .await
            .unwrap();
        let path = PathBuf::from(&stored[0].stored_path);
        assert!(path.exists());

        remove_files(&stored).await;
        assert!(!path.exists());
    }
}
