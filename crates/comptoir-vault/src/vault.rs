// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sealed-credential envelopes for integration secrets.
//!
//! IMAP passwords and webhook signing secrets are stored as envelopes of the
//! form `v1:<nonce_b64>:<ciphertext_b64>`. The leading key id selects the
//! decryption key so the deployment key can be rotated without breaking rows
//! sealed under the old one.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use comptoir_core::ComptoirError;
use secrecy::SecretString;
use tracing::debug;
use zeroize::Zeroizing;

use crate::crypto;

/// Key id written in front of every envelope sealed by this build.
pub const KEY_ID_CURRENT: &str = "v1";

/// The loaded sealing key.
///
/// Debug output intentionally omits the key material.
pub struct Vault {
    // Only in memory, never on disk.
    key: Zeroizing<[u8; 32]>,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault").field("key", &"[REDACTED]").finish()
    }
}

impl Vault {
    /// Build a vault from the base64 key material in `ENCRYPTION_KEY`.
    ///
    /// The decoded key must be exactly 32 bytes.
    pub fn from_key_b64(key_b64: &str) -> Result<Self, ComptoirError> {
        let bytes = BASE64
            .decode(key_b64.trim())
            .map_err(|_| ComptoirError::Vault("encryption key is not valid base64".to_string()))?;
        let key: [u8; 32] = bytes.try_into().map_err(|_| {
            ComptoirError::Vault("encryption key must decode to exactly 32 bytes".to_string())
        })?;

        debug!("vault key loaded");
        Ok(Self {
            key: Zeroizing::new(key),
        })
    }

    /// Encrypt a credential for storage.
    ///
    /// Every call produces a distinct envelope for the same plaintext
    /// because the nonce is random.
    pub fn seal(&self, plaintext: &str) -> Result<String, ComptoirError> {
        let (ciphertext, nonce) = crypto::seal(&self.key, plaintext.as_bytes())?;
        Ok(format!(
            "{KEY_ID_CURRENT}:{}:{}",
            BASE64.encode(nonce),
            BASE64.encode(&ciphertext)
        ))
    }

    /// Decrypt a stored envelope back into the credential.
    ///
    /// Any structural problem with the envelope, an unknown key id, or a
    /// failed authentication tag check surfaces as
    /// [`ComptoirError::CredentialCorrupt`] so the caller can quarantine the
    /// integration instead of retrying.
    pub fn open(&self, envelope: &str) -> Result<SecretString, ComptoirError> {
        let mut parts = envelope.splitn(3, ':');
        let key_id = parts.next().unwrap_or("");
        let (Some(nonce_b64), Some(ct_b64)) = (parts.next(), parts.next()) else {
            return Err(ComptoirError::CredentialCorrupt(
                "credential envelope is missing nonce or ciphertext".to_string(),
            ));
        };

        if key_id != KEY_ID_CURRENT {
            return Err(ComptoirError::CredentialCorrupt(format!(
                "unknown credential key id `{key_id}`"
            )));
        }

        let nonce_vec = BASE64.decode(nonce_b64).map_err(|_| {
            ComptoirError::CredentialCorrupt("credential nonce is not valid base64".to_string())
        })?;
        let nonce: [u8; 12] = nonce_vec.try_into().map_err(|_| {
            ComptoirError::CredentialCorrupt("credential nonce must be 12 bytes".to_string())
        })?;
        let ciphertext = BASE64.decode(ct_b64).map_err(|_| {
            ComptoirError::CredentialCorrupt(
                "credential ciphertext is not valid base64".to_string(),
            )
        })?;

        let plaintext = crypto::open(&self.key, &nonce, &ciphertext)?;
        let value = String::from_utf8(plaintext).map_err(|_| {
            ComptoirError::CredentialCorrupt("decrypted credential is not valid UTF-8".to_string())
        })?;
        Ok(SecretString::from(value))
    }
}

/// Mask a secret value for display: "sk-l...xyz9" format.
///
/// Shows prefix (up to 4 chars) and suffix (up to 4 chars) with "..." in
/// between. Short values (< 10 chars) are fully masked as "****".
pub fn mask_secret(value: &str) -> String {
    if value.len() < 10 {
        return "****".to_string();
    }
    let prefix = &value[..4.min(value.len())];
    let suffix = &value[value.len().saturating_sub(4)..];
    format!("{prefix}...{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use comptoir_core::ErrorKind;
    use proptest::prelude::*;
    use secrecy::ExposeSecret;

    fn test_key_b64() -> String {
        BASE64.encode([7u8; 32])
    }

    #[test]
    fn seal_open_roundtrip() {
        let vault = Vault::from_key_b64(&test_key_b64()).unwrap();

        let envelope = vault.seal("imap-password-123").unwrap();
        let opened = vault.open(&envelope).unwrap();

        assert_eq!(opened.expose_secret(), "imap-password-123");
    }

    #[test]
    fn envelope_has_key_id_prefix() {
        let vault = Vault::from_key_b64(&test_key_b64()).unwrap();

        let envelope = vault.seal("secret").unwrap();

        assert!(envelope.starts_with("v1:"));
        assert_eq!(envelope.split(':').count(), 3);
    }

    #[test]
    fn distinct_seals_of_same_plaintext_differ() {
        let vault = Vault::from_key_b64(&test_key_b64()).unwrap();

        let e1 = vault.seal("same").unwrap();
        let e2 = vault.seal("same").unwrap();

        assert_ne!(e1, e2);
    }

    #[test]
    fn open_with_wrong_key_is_credential_corrupt() {
        let vault1 = Vault::from_key_b64(&test_key_b64()).unwrap();
        let vault2 = Vault::from_key_b64(&BASE64.encode([9u8; 32])).unwrap();

        let envelope = vault1.seal("secret").unwrap();
        let err = vault2.open(&envelope).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CredentialCorrupt);
    }

    #[test]
    fn tampered_envelope_is_credential_corrupt() {
        let vault = Vault::from_key_b64(&test_key_b64()).unwrap();

        let envelope = vault.seal("secret").unwrap();
        // Corrupt the last ciphertext character.
        let mut tampered = envelope.clone();
        let last = if tampered.ends_with('A') { 'B' } else { 'A' };
        tampered.pop();
        tampered.push(last);

        let err = vault.open(&tampered).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CredentialCorrupt);
    }

    #[test]
    fn unknown_key_id_is_rejected() {
        let vault = Vault::from_key_b64(&test_key_b64()).unwrap();

        let envelope = vault.seal("secret").unwrap();
        let rotated = envelope.replacen("v1:", "v9:", 1);

        let err = vault.open(&rotated).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CredentialCorrupt);
        assert!(err.to_string().contains("v9"));
    }

    #[test]
    fn truncated_envelope_is_rejected() {
        let vault = Vault::from_key_b64(&test_key_b64()).unwrap();

        let err = vault.open("v1:onlyonepart").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CredentialCorrupt);
    }

    #[test]
    fn short_key_is_rejected() {
        let short = BASE64.encode([1u8; 16]);
        assert!(Vault::from_key_b64(&short).is_err());
    }

    #[test]
    fn non_base64_key_is_rejected() {
        assert!(Vault::from_key_b64("not valid base64!!!").is_err());
    }

    #[test]
    fn debug_output_hides_key() {
        let vault = Vault::from_key_b64(&test_key_b64()).unwrap();
        let rendered = format!("{vault:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains('7'));
    }

    #[test]
    fn mask_secret_long_value() {
        assert_eq!(mask_secret("sk-live-abcdefghijklmnop"), "sk-l...mnop");
    }

    #[test]
    fn mask_secret_short_value() {
        assert_eq!(mask_secret("short"), "****");
    }

    #[test]
    fn mask_secret_exact_boundary() {
        assert_eq!(mask_secret("1234567890"), "1234...7890");
    }

    proptest! {
        #[test]
        fn roundtrip_preserves_arbitrary_plaintext(plaintext in ".*") {
            let vault = Vault::from_key_b64(&test_key_b64()).unwrap();
            let envelope = vault.seal(&plaintext).unwrap();
            let opened = vault.open(&envelope).unwrap();
            prop_assert_eq!(opened.expose_secret(), &plaintext);
        }
    }
}
