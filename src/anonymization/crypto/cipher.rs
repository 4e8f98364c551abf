//! Keyed format-preserving cipher
//!
//! A SHA-256 counter-mode keystream drives per-character shifts inside the
//! character classes `a-z`, `A-Z` and `0-9`. Characters outside the selected
//! classes pass through and do not consume keystream, so the class layout of
//! a value (and therefore its length and separators) survives encryption and
//! decryption with the same key is the identity.

use sha2::{Digest, Sha256};

/// Which characters the cipher transforms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// Letters (both cases) and digits
    Alphanumeric,
    /// Digits only
    Digits,
}

/// Direction of a transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Anonymize
    Encrypt,
    /// Deanonymize
    Decrypt,
}

/// Byte stream derived from a key
///
/// Block `n` is `SHA-256(key || ":" || n)`; blocks are consumed byte by byte.
#[derive(Debug, Clone)]
pub struct Keystream {
    key: Vec<u8>,
    counter: u64,
    block: [u8; 32],
    position: usize,
}

impl Keystream {
    /// Creates a keystream for the given key
    pub fn new(key: &str) -> Self {
        Self {
            key: key.as_bytes().to_vec(),
            counter: 0,
            block: [0; 32],
            position: 32,
        }
    }

    /// Next keystream byte
    pub fn next_byte(&mut self) -> u8 {
        if self.position == self.block.len() {
            let mut hasher = Sha256::new();
            hasher.update(&self.key);
            hasher.update(b":");
            hasher.update(self.counter.to_be_bytes());
            self.block.copy_from_slice(&hasher.finalize());
            self.counter += 1;
            self.position = 0;
        }
        let byte = self.block[self.position];
        self.position += 1;
        byte
    }

    /// Next keystream value as a big-endian `u16`
    pub fn next_u16(&mut self) -> u16 {
        u16::from_be_bytes([self.next_byte(), self.next_byte()])
    }
}

/// Transforms every character of `charset` in `text`
pub fn transform(key: &str, text: &str, charset: Charset, direction: Direction) -> String {
    let mut stream = Keystream::new(key);
    text.chars()
        .map(|c| match class_of(c, charset) {
            Some((base, size)) => {
                let offset = u32::from(stream.next_byte()) % size;
                shift(c, base, size, offset, direction)
            }
            None => c,
        })
        .collect()
}

/// Encrypts letters and digits of `text`
pub fn encrypt_text(key: &str, text: &str) -> String {
    transform(key, text, Charset::Alphanumeric, Direction::Encrypt)
}

/// Reverses [`encrypt_text`]
pub fn decrypt_text(key: &str, text: &str) -> String {
    transform(key, text, Charset::Alphanumeric, Direction::Decrypt)
}

/// Turns a key into a number
///
/// The first eight bytes of `SHA-256(key)`, big-endian.
pub fn numerize_key(key: &str) -> u64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

fn class_of(c: char, charset: Charset) -> Option<(u32, u32)> {
    match (c, charset) {
        ('0'..='9', _) => Some(('0' as u32, 10)),
        ('a'..='z', Charset::Alphanumeric) => Some(('a' as u32, 26)),
        ('A'..='Z', Charset::Alphanumeric) => Some(('A' as u32, 26)),
        _ => None,
    }
}

fn shift(c: char, base: u32, size: u32, offset: u32, direction: Direction) -> char {
    let index = c as u32 - base;
    let shifted = match direction {
        Direction::Encrypt => (index + offset) % size,
        Direction::Decrypt => (index + size - offset) % size,
    };
    char::from_u32(base + shifted).unwrap_or(c)
}
