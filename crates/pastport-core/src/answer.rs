//! Riddle answer normalization and hashing.
//!
//! Answers are compared case-insensitively with surrounding whitespace
//! stripped, so "Needle " matches a stored answer of "needle". Only the
//! SHA-256 digest of the normalized form is ever persisted.

use sha2::{Digest, Sha256};

/// Canonical form of an answer: trimmed, Unicode-lowercased.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Hex SHA-256 digest of the normalized answer. This is what the store
/// keeps in `riddle_answer_hash`.
pub fn hash_answer(raw: &str) -> String {
    hex::encode(Sha256::digest(normalize(raw).as_bytes()))
}

/// Compare a submitted answer against a stored digest.
pub fn verify_answer(submitted: &str, stored_hash: &str) -> bool {
    hash_answer(submitted).eq_ignore_ascii_case(stored_hash)
}
