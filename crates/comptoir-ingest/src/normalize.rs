// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handle normalization and thread-key derivation.
//!
//! Two messages belong to the same conversation exactly when they derive
//! the same thread key, so every rule here is deterministic and pure.
//! Email threads follow the reference chain when one exists and fall back
//! to a normalized-subject + participant key; chat threads follow the
//! provider's thread id else collapse onto the remote address.

use sha2::{Digest, Sha256};

/// How many hex chars of the participant digest enter a subject key.
const PARTICIPANT_HASH_LEN: usize = 16;

/// Reply/forward markers stripped from subjects, lowercase. French mailers
/// emit "TR :" / "RE :" with a space before the colon.
const SUBJECT_MARKERS: &[&str] = &["re", "fwd", "fw", "tr"];

/// A sender handle sorted into the identity column it belongs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedHandle {
    /// Lowercased, trimmed e-mail address.
    Email(String),
    /// Digits with an optional leading `+`; formatting stripped.
    Phone(String),
    /// Anything else (chat usernames); kept trimmed but otherwise as-is.
    Opaque(String),
}

impl NormalizedHandle {
    /// The canonical string form, whatever the column.
    pub fn as_str(&self) -> &str {
        match self {
            NormalizedHandle::Email(s)
            | NormalizedHandle::Phone(s)
            | NormalizedHandle::Opaque(s) => s,
        }
    }

    /// A display name to seed a client row with when the provider gives
    /// none: the local part for e-mail, the full handle otherwise.
    pub fn display_name(&self) -> String {
        match self {
            NormalizedHandle::Email(addr) => addr
                .split_once('@')
                .map(|(local, _)| local.to_string())
                .unwrap_or_else(|| addr.clone()),
            NormalizedHandle::Phone(number) => number.clone(),
            NormalizedHandle::Opaque(handle) => handle.clone(),
        }
    }
}

/// Normalize a raw sender handle.
///
/// An `@` with something on both sides reads as e-mail; a string that is
/// digits once punctuation is stripped reads as a phone number; everything
/// else stays opaque.
pub fn normalize_handle(raw: &str) -> NormalizedHandle {
    let trimmed = raw.trim();
    if looks_like_email(trimmed) {
        return NormalizedHandle::Email(trimmed.to_lowercase());
    }
    if let Some(number) = normalize_phone(trimmed) {
        return NormalizedHandle::Phone(number);
    }
    NormalizedHandle::Opaque(trimmed.to_string())
}

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.contains(' '),
        None => false,
    }
}

/// Strip phone formatting down to digits, preserving one leading `+`.
/// Returns `None` when the input is not a phone number.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut digits = String::with_capacity(trimmed.len());
    for (i, c) in trimmed.chars().enumerate() {
        match c {
            '+' if i == 0 => digits.push('+'),
            '0'..='9' => digits.push(c),
            ' ' | '.' | '-' | '(' | ')' | '/' => {}
            _ => return None,
        }
    }
    // 00 is the ITU international call prefix.
    let digits = match digits.strip_prefix("00") {
        Some(rest) if !rest.is_empty() => format!("+{rest}"),
        _ => digits,
    };
    let digit_count = digits.chars().filter(char::is_ascii_digit).count();
    if digit_count >= 6 { Some(digits) } else { None }
}

/// Strip reply/forward markers, lowercase, and collapse whitespace so
/// "RE: Devis 42", "Re : devis 42" and "Devis  42" key identically.
pub fn normalized_subject(subject: &str) -> String {
    let mut rest = subject.trim();
    'strip: loop {
        for marker in SUBJECT_MARKERS {
            if rest.len() >= marker.len()
                && rest.is_char_boundary(marker.len())
                && rest[..marker.len()].eq_ignore_ascii_case(marker)
            {
                let after = rest[marker.len()..].trim_start();
                if let Some(stripped) = after.strip_prefix(':') {
                    rest = stripped.trim_start();
                    continue 'strip;
                }
            }
        }
        break;
    }
    rest.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Direction-invariant digest of the participant set, so a reply (sender
/// and recipients swapped) hashes the same as the original.
pub fn participant_hash(sender: &str, recipients: &[String]) -> String {
    let mut participants: Vec<String> = recipients
        .iter()
        .map(|r| r.trim().to_lowercase())
        .filter(|r| !r.is_empty())
        .collect();
    participants.push(sender.trim().to_lowercase());
    participants.sort();
    participants.dedup();

    let mut hasher = Sha256::new();
    for p in &participants {
        hasher.update(p.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())[..PARTICIPANT_HASH_LEN].to_string()
}

/// Thread key for e-mail: the reference-chain root when the message
/// carries one, else a subject + participants key.
pub fn email_thread_key(
    thread_hint: Option<&str>,
    subject: Option<&str>,
    sender: &str,
    recipients: &[String],
) -> String {
    if let Some(hint) = thread_hint.map(str::trim).filter(|h| !h.is_empty()) {
        return hint.to_string();
    }
    format!(
        "subj:{}|{}",
        normalized_subject(subject.unwrap_or_default()),
        participant_hash(sender, recipients)
    )
}

/// Thread key for chat/SMS: the provider thread id when present, else the
/// remote address itself (one rolling conversation per correspondent).
pub fn chat_thread_key(thread_hint: Option<&str>, remote: &str) -> String {
    thread_hint
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| remote.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_handles_lowercase_and_trim() {
        let handle = normalize_handle("  Alice.Martin@Example.FR ");
        assert_eq!(
            handle,
            NormalizedHandle::Email("alice.martin@example.fr".into())
        );
        assert_eq!(handle.display_name(), "alice.martin");
    }

    #[test]
    fn phone_handles_strip_formatting() {
        assert_eq!(
            normalize_handle("+33 6 12 34 56 78"),
            NormalizedHandle::Phone("+33612345678".into())
        );
        assert_eq!(
            normalize_handle("06.12.34.56.78"),
            NormalizedHandle::Phone("0612345678".into())
        );
        assert_eq!(
            normalize_handle("0033612345678"),
            NormalizedHandle::Phone("+33612345678".into())
        );
    }

    #[test]
    fn usernames_stay_opaque() {
        assert_eq!(
            normalize_handle("marcel_dupont"),
            NormalizedHandle::Opaque("marcel_dupont".into())
        );
        // Too few digits to be a phone number.
        assert_eq!(normalize_handle("42"), NormalizedHandle::Opaque("42".into()));
    }

    #[test]
    fn subject_markers_strip_recursively() {
        assert_eq!(normalized_subject("Devis 42"), "devis 42");
        assert_eq!(normalized_subject("RE: Devis 42"), "devis 42");
        assert_eq!(normalized_subject("Re: RE: Fwd: Devis 42"), "devis 42");
        // French typography puts a space before the colon.
        assert_eq!(normalized_subject("TR : Devis 42"), "devis 42");
        assert_eq!(normalized_subject("  Devis   42  "), "devis 42");
    }

    #[test]
    fn marker_words_without_colon_survive() {
        assert_eq!(normalized_subject("Retour client"), "retour client");
        assert_eq!(normalized_subject("Trajet lundi"), "trajet lundi");
    }

    #[test]
    fn participant_hash_is_direction_invariant() {
        let outbound = participant_hash(
            "atelier@comptoir.example",
            &["alice@example.fr".to_string()],
        );
        let inbound = participant_hash(
            "alice@example.fr",
            &["atelier@comptoir.example".to_string()],
        );
        assert_eq!(outbound, inbound);
        assert_eq!(outbound.len(), PARTICIPANT_HASH_LEN);
    }

    #[test]
    fn reply_without_references_threads_by_subject() {
        let original = email_thread_key(
            None,
            Some("Devis 42"),
            "alice@example.fr",
            &["atelier@comptoir.example".to_string()],
        );
        let reply = email_thread_key(
            None,
            Some("RE: Devis 42"),
            "atelier@comptoir.example",
            &["alice@example.fr".to_string()],
        );
        assert_eq!(original, reply);
        assert!(original.starts_with("subj:devis 42|"));
    }

    #[test]
    fn reference_root_wins_over_subject() {
        let key = email_thread_key(
            Some("<root-123@example.fr>"),
            Some("Completely different subject"),
            "alice@example.fr",
            &[],
        );
        assert_eq!(key, "<root-123@example.fr>");
    }

    #[test]
    fn same_subject_different_clients_do_not_merge() {
        let alice = email_thread_key(None, Some("Devis"), "alice@example.fr", &[]);
        let bruno = email_thread_key(None, Some("Devis"), "bruno@example.fr", &[]);
        assert_ne!(alice, bruno);
    }

    #[test]
    fn chat_key_prefers_provider_thread() {
        assert_eq!(chat_thread_key(Some("thr-9"), "+33612345678"), "thr-9");
        assert_eq!(chat_thread_key(None, "+33612345678"), "+33612345678");
        assert_eq!(chat_thread_key(Some("  "), "marcel"), "marcel");
    }
}
