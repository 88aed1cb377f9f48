//! Cryptographically secure random generation.
//!
//! This module provides secure random values for:
//! - Protocol message identifiers
//! - Transient name identifiers
//! - Content encryption keys and nonces

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::distr::{Alphanumeric, SampleString};
use rand::Rng;

/// Generates a cryptographically secure random byte array.
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes[..]);
    bytes
}

/// Generates a cryptographically secure random alphanumeric string.
#[must_use]
pub fn random_alphanumeric(len: usize) -> String {
    let mut rng = rand::rng();
    Alphanumeric.sample_string(&mut rng, len)
}

/// Generates a random URL-safe base64 string from `bytes` random bytes.
#[must_use]
pub fn random_base64url(bytes: usize) -> String {
    URL_SAFE_NO_PAD.encode(random_bytes(bytes))
}

/// Generates an identifier for a protocol message.
///
/// XML IDs may not start with a digit, so the value is an underscore
/// followed by 32 hex characters (128 bits).
#[must_use]
pub fn generate_message_id() -> String {
    let mut id = String::with_capacity(33);
    id.push('_');
    for byte in random_bytes(16) {
        id.push_str(&format!("{byte:02x}"));
    }
    id
}
