//! # idp-crypto
//!
//! Cryptographic operations for the identity provider using aws-lc-rs.
//!
//! - Signature creation with the IdP's own key and verification of peer
//!   signatures against published certificates or public keys
//! - Assertion encryption (AES-256-GCM with RSA-OAEP key transport)
//! - Hashing, keyed MACs for pseudonymous identifiers, and secure randomness

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod algorithm;
pub mod encryption;
pub mod hash;
pub mod keys;
pub mod random;
pub mod signature;

pub use algorithm::{AlgorithmError, HashAlgorithm, SignatureAlgorithm};
pub use encryption::{
    can_encrypt_for, encrypt_for_recipient, AssertionDecrypter, EncryptedPayload, EncryptionError,
};
pub use hash::{constant_time_eq, hash, hmac_sha256, sha256, sha384, sha512};
pub use keys::{KeyKind, KeyMaterial, PublicKeyInfo, SigningKey};
pub use random::{generate_message_id, random_alphanumeric, random_base64url, random_bytes};
pub use signature::{AwsLcVerifier, SignatureError, SignatureProvider, SignatureVerifier};
