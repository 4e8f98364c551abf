//! Cryptographic building blocks
//!
//! - [`keys`] - per-field key derivation and throwaway secrets
//! - [`cipher`] - the reversible keyed primitive field anonymizers build on

pub mod cipher;
pub mod keys;

pub use cipher::{decrypt_text, encrypt_text, numerize_key, Charset, Direction, Keystream};
pub use keys::{derive_key, random_secret, RANDOM_SECRET_LEN};
