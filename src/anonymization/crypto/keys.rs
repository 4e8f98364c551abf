//! Per-field key derivation

use crate::domain::ObjectId;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of the throwaway base secret drawn for irreversible anonymizers
pub const RANDOM_SECRET_LEN: usize = 128;

/// Delimiter placed between the parts of the key material
pub const KEY_DELIMITER: &str = "::";

/// Derives the encryption key of one field of one record
///
/// `hex(SHA-256(len:pk :: len:base_secret :: len:global_secret :: len:field))`.
/// Each part carries its byte length, so parts that themselves contain the
/// delimiter cannot shift into their neighbours. The raw secrets never reach
/// a field anonymizer.
pub fn derive_key(pk: &ObjectId, base_secret: &str, global_secret: &str, field: &str) -> String {
    let pk = pk.to_string();
    let material = [pk.as_str(), base_secret, global_secret, field]
        .iter()
        .map(|part| format!("{}:{part}", part.len()))
        .collect::<Vec<_>>()
        .join(KEY_DELIMITER);
    format!("{:x}", Sha256::digest(material.as_bytes()))
}

/// Draws a fresh alphanumeric secret of [`RANDOM_SECRET_LEN`] characters
pub fn random_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_SECRET_LEN)
        .map(char::from)
        .collect()
}
