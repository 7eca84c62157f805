// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HMAC-SHA256 verification of webhook request bodies.
//!
//! The signature covers the raw body bytes exactly as received, before any
//! JSON parsing. Comparison goes through `Mac::verify_slice`, which is
//! constant-time, so a mismatch leaks nothing about the expected value.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Check a hex-encoded HMAC-SHA256 signature over the raw request body.
///
/// Any structural problem with the presented value (odd length, non-hex
/// characters) fails the check the same way a wrong signature does.
pub fn verify(secret: &[u8], body: &[u8], signature_hex: &str) -> bool {
    let Ok(presented) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&presented).is_ok()
}

/// Produce the hex signature a well-behaved provider would send.
#[cfg(test)]
pub(crate) fn sign(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
