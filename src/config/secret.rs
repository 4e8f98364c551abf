//! Key material held in memory
//!
//! The global secret and base encryption keys are wrapped in
//! [`secrecy::Secret`]: they are zeroed on drop, redacted in `Debug`
//! output, and serialize as a placeholder, so dumping a loaded
//! configuration never leaks them. Reading the raw value takes an explicit
//! `expose_secret()`, which only key derivation does.
//!
//! # Example
//!
//! ```rust
//! use obscura::config::secret_string;
//! use secrecy::ExposeSecret;
//!
//! let global_secret = secret_string("a-long-global-secret".to_string());
//! assert_eq!(global_secret.expose_secret().char_len(), 20);
//! assert!(!format!("{global_secret:?}").contains("global"));
//! ```

use secrecy::{CloneableSecret, DebugSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroize;

/// Placeholder written instead of a secret when serializing
pub const REDACTED: &str = "[REDACTED]";

/// Secret text; only reachable through [`secrecy::ExposeSecret`]
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl PartialEq<str> for SecretValue {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SecretValue {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length in characters, for minimum-strength checks
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }

    /// Short SHA-256 fingerprint, safe to log
    ///
    /// Lets two runs be checked for using the same key without revealing it.
    pub fn fingerprint(&self) -> String {
        let digest = format!("{:x}", Sha256::digest(self.0.as_bytes()));
        digest[..12].to_string()
    }
}

impl Serialize for SecretValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(REDACTED)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// A [`SecretValue`] in its zeroizing, redacting container
pub type SecretString = Secret<SecretValue>;

/// Wrap a string as a [`SecretString`]
///
/// ```rust
/// use obscura::config::secret_string;
///
/// let base_key = secret_string("per-job-key".to_string());
/// ```
#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue::from(value))
}
