//! Digital signature operations.
//!
//! Signing goes through [`SignatureProvider`], implemented by the IdP's own
//! [`SigningKey`](crate::keys::SigningKey). Verification of peer signatures
//! goes through [`SignatureVerifier`], which checks raw signature bytes
//! against published [`KeyMaterial`].

use aws_lc_rs::signature::{self, UnparsedPublicKey, VerificationAlgorithm};
use thiserror::Error;

use crate::algorithm::SignatureAlgorithm;
use crate::keys::{KeyKind, KeyMaterial};

/// Error type for signature operations.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// Key generation failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Signing failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Verification failed.
    #[error("signature verification failed")]
    Verification,

    /// Invalid key format.
    #[error("invalid key format: {0}")]
    InvalidKey(String),

    /// Algorithm not supported.
    #[error("algorithm not supported: {0}")]
    UnsupportedAlgorithm(String),
}

/// Trait for signature providers.
pub trait SignatureProvider: Send + Sync {
    /// Signs the given data.
    ///
    /// ## Errors
    ///
    /// Returns an error if signing fails.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, SignatureError>;

    /// Returns the signature algorithm.
    fn algorithm(&self) -> SignatureAlgorithm;
}

/// Trait for verifying signatures made by peers.
pub trait SignatureVerifier: Send + Sync {
    /// Verifies `signature` over `data` with the given key.
    ///
    /// ## Errors
    ///
    /// Returns [`SignatureError::Verification`] if the signature does not
    /// match, or another variant if the key or algorithm cannot be used.
    fn verify(
        &self,
        key: &KeyMaterial,
        algorithm: SignatureAlgorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), SignatureError>;
}

/// Signature verifier backed by aws-lc-rs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AwsLcVerifier {
    allow_sha1: bool,
}

impl AwsLcVerifier {
    /// Creates a verifier that rejects SHA-1 signatures.
    #[must_use]
    pub const fn new() -> Self {
        Self { allow_sha1: false }
    }

    /// Sets whether SHA-1 signatures from legacy peers are accepted.
    #[must_use]
    pub const fn allow_sha1(mut self, allow: bool) -> Self {
        self.allow_sha1 = allow;
        self
    }
}

impl SignatureVerifier for AwsLcVerifier {
    fn verify(
        &self,
        key: &KeyMaterial,
        algorithm: SignatureAlgorithm,
        data: &[u8],
        sig: &[u8],
    ) -> Result<(), SignatureError> {
        if algorithm.is_deprecated() && !self.allow_sha1 {
            return Err(SignatureError::UnsupportedAlgorithm(format!(
                "{algorithm:?} is disabled"
            )));
        }

        let info = key.public_key_info()?;
        let expected = if algorithm.is_rsa() { KeyKind::Rsa } else { KeyKind::Ec };
        if info.kind != expected {
            return Err(SignatureError::InvalidKey(format!(
                "{algorithm:?} cannot be verified with a {:?} key",
                info.kind
            )));
        }

        UnparsedPublicKey::new(verification_algorithm(algorithm), &info.raw)
            .verify(data, sig)
            .map_err(|_| SignatureError::Verification)
    }
}

fn verification_algorithm(algorithm: SignatureAlgorithm) -> &'static dyn VerificationAlgorithm {
    match algorithm {
        SignatureAlgorithm::RsaSha256 => &signature::RSA_PKCS1_2048_8192_SHA256,
        SignatureAlgorithm::RsaSha384 => &signature::RSA_PKCS1_2048_8192_SHA384,
        SignatureAlgorithm::RsaSha512 => &signature::RSA_PKCS1_2048_8192_SHA512,
        SignatureAlgorithm::RsaSha1 => &signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
        SignatureAlgorithm::EcdsaSha256 => &signature::ECDSA_P256_SHA256_FIXED,
        SignatureAlgorithm::EcdsaSha384 => &signature::ECDSA_P384_SHA384_FIXED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::SigningKey;

    #[test]
    fn signature_error_verification_is_generic() {
        let error = SignatureError::Verification;
        // Don't leak information about why verification failed
        assert_eq!(error.to_string(), "signature verification failed");
    }

    #[test]
    fn ecdsa_sign_and_verify() {
        let key = SigningKey::generate(SignatureAlgorithm::EcdsaSha256).unwrap();
        let sig = key.sign(b"payload").unwrap();
        assert_eq!(sig.len(), 64);

        let verifier = AwsLcVerifier::new();
        let material = key.key_material();
        verifier
            .verify(&material, SignatureAlgorithm::EcdsaSha256, b"payload", &sig)
            .unwrap();
        assert!(matches!(
            verifier.verify(&material, SignatureAlgorithm::EcdsaSha256, b"tampered", &sig),
            Err(SignatureError::Verification)
        ));
    }

    #[test]
    fn rsa_sign_and_verify() {
        let key = SigningKey::generate(SignatureAlgorithm::RsaSha256).unwrap();
        let sig = key.sign(b"payload").unwrap();
        AwsLcVerifier::new()
            .verify(&key.key_material(), SignatureAlgorithm::RsaSha256, b"payload", &sig)
            .unwrap();
    }

    #[test]
    fn key_family_mismatch_is_rejected() {
        let key = SigningKey::generate(SignatureAlgorithm::EcdsaSha256).unwrap();
        let sig = key.sign(b"payload").unwrap();
        assert!(matches!(
            AwsLcVerifier::new().verify(
                &key.key_material(),
                SignatureAlgorithm::RsaSha256,
                b"payload",
                &sig
            ),
            Err(SignatureError::InvalidKey(_))
        ));
    }

    #[test]
    fn sha1_requires_opt_in() {
        let key = SigningKey::generate(SignatureAlgorithm::RsaSha256).unwrap();
        let result = AwsLcVerifier::new().verify(
            &key.key_material(),
            SignatureAlgorithm::RsaSha1,
            b"payload",
            b"sig",
        );
        assert!(matches!(result, Err(SignatureError::UnsupportedAlgorithm(_))));

        let result = AwsLcVerifier::new().allow_sha1(true).verify(
            &key.key_material(),
            SignatureAlgorithm::RsaSha1,
            b"payload",
            b"sig",
        );
        assert!(matches!(result, Err(SignatureError::Verification)));
    }
}
