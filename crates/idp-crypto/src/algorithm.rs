//! Cryptographic algorithm definitions.
//!
//! SAML peers in the wild still expect SHA-256 signatures, so the default is
//! RSA-SHA256. SHA-1 is recognised for verification only and must be enabled
//! explicitly by policy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for algorithm operations.
#[derive(Debug, Error)]
pub enum AlgorithmError {
    /// Unknown algorithm.
    #[error("unknown algorithm: {0}")]
    Unknown(String),

    /// Algorithm is recognised but disabled by policy.
    #[error("algorithm '{0}' is not permitted")]
    NotPermitted(String),
}

/// Hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// Legacy SHA-1 (verification of legacy peers only).
    #[serde(rename = "SHA1")]
    Sha1,

    /// SHA-256.
    #[serde(rename = "SHA256")]
    Sha256,

    /// SHA-384.
    #[serde(rename = "SHA384")]
    Sha384,

    /// SHA-512.
    #[serde(rename = "SHA512")]
    Sha512,
}

impl HashAlgorithm {
    /// Returns the output length in bytes.
    #[must_use]
    pub const fn output_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Returns the XML digest method URI.
    #[must_use]
    pub const fn digest_uri(self) -> &'static str {
        match self {
            Self::Sha1 => "http://www.w3.org/2000/09/xmldsig#sha1",
            Self::Sha256 => "http://www.w3.org/2001/04/xmlenc#sha256",
            Self::Sha384 => "http://www.w3.org/2001/04/xmldsig-more#sha384",
            Self::Sha512 => "http://www.w3.org/2001/04/xmlenc#sha512",
        }
    }

    /// Parses a hash algorithm from its XML digest method URI.
    #[must_use]
    pub fn from_digest_uri(uri: &str) -> Option<Self> {
        match uri {
            "http://www.w3.org/2000/09/xmldsig#sha1" => Some(Self::Sha1),
            "http://www.w3.org/2001/04/xmlenc#sha256" => Some(Self::Sha256),
            "http://www.w3.org/2001/04/xmldsig-more#sha384" => Some(Self::Sha384),
            "http://www.w3.org/2001/04/xmlenc#sha512" => Some(Self::Sha512),
            _ => None,
        }
    }
}

/// Signature algorithms used for XML and redirect-binding signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// RSA PKCS#1 v1.5 with SHA-256.
    #[default]
    #[serde(rename = "RS256")]
    RsaSha256,

    /// RSA PKCS#1 v1.5 with SHA-384.
    #[serde(rename = "RS384")]
    RsaSha384,

    /// RSA PKCS#1 v1.5 with SHA-512.
    #[serde(rename = "RS512")]
    RsaSha512,

    /// ECDSA using P-256 and SHA-256.
    #[serde(rename = "ES256")]
    EcdsaSha256,

    /// ECDSA using P-384 and SHA-384.
    #[serde(rename = "ES384")]
    EcdsaSha384,

    /// Legacy RSA PKCS#1 v1.5 with SHA-1 (verification only).
    #[serde(rename = "RS1")]
    RsaSha1,
}

impl SignatureAlgorithm {
    /// Returns the XML-DSig signature method URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::RsaSha256 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
            Self::RsaSha384 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384",
            Self::RsaSha512 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512",
            Self::EcdsaSha256 => "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256",
            Self::EcdsaSha384 => "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha384",
            Self::RsaSha1 => "http://www.w3.org/2000/09/xmldsig#rsa-sha1",
        }
    }

    /// Parses a signature algorithm from its XML-DSig URI.
    pub fn from_uri(uri: &str) -> Result<Self, AlgorithmError> {
        match uri {
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256" => Ok(Self::RsaSha256),
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384" => Ok(Self::RsaSha384),
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512" => Ok(Self::RsaSha512),
            "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256" => Ok(Self::EcdsaSha256),
            "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha384" => Ok(Self::EcdsaSha384),
            "http://www.w3.org/2000/09/xmldsig#rsa-sha1" => Ok(Self::RsaSha1),
            _ => Err(AlgorithmError::Unknown(uri.to_string())),
        }
    }

    /// Returns the hash algorithm used by this signature algorithm.
    #[must_use]
    pub const fn hash_algorithm(self) -> HashAlgorithm {
        match self {
            Self::RsaSha1 => HashAlgorithm::Sha1,
            Self::RsaSha256 | Self::EcdsaSha256 => HashAlgorithm::Sha256,
            Self::RsaSha384 | Self::EcdsaSha384 => HashAlgorithm::Sha384,
            Self::RsaSha512 => HashAlgorithm::Sha512,
        }
    }

    /// Returns whether this is an RSA algorithm.
    #[must_use]
    pub const fn is_rsa(self) -> bool {
        matches!(
            self,
            Self::RsaSha256 | Self::RsaSha384 | Self::RsaSha512 | Self::RsaSha1
        )
    }

    /// Returns whether this is an ECDSA algorithm.
    #[must_use]
    pub const fn is_ecdsa(self) -> bool {
        matches!(self, Self::EcdsaSha256 | Self::EcdsaSha384)
    }

    /// Returns true if this algorithm relies on SHA-1.
    #[must_use]
    pub const fn is_deprecated(self) -> bool {
        matches!(self, Self::RsaSha1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_lookup() {
        assert_eq!(
            SignatureAlgorithm::from_uri("http://www.w3.org/2001/04/xmldsig-more#rsa-sha256")
                .unwrap(),
            SignatureAlgorithm::RsaSha256
        );
        assert!(matches!(
            SignatureAlgorithm::from_uri("urn:bogus"),
            Err(AlgorithmError::Unknown(_))
        ));
    }

    #[test]
    fn hash_pairing() {
        assert_eq!(
            SignatureAlgorithm::EcdsaSha384.hash_algorithm(),
            HashAlgorithm::Sha384
        );
        assert_eq!(SignatureAlgorithm::RsaSha1.hash_algorithm(), HashAlgorithm::Sha1);
        assert_eq!(HashAlgorithm::Sha256.output_len(), 32);
    }

    #[test]
    fn algorithm_families() {
        assert!(SignatureAlgorithm::RsaSha512.is_rsa());
        assert!(!SignatureAlgorithm::RsaSha512.is_ecdsa());
        assert!(SignatureAlgorithm::EcdsaSha256.is_ecdsa());
        assert!(SignatureAlgorithm::RsaSha1.is_deprecated());
        assert!(!SignatureAlgorithm::default().is_deprecated());
    }

    #[test]
    fn digest_uri_lookup() {
        let uri = HashAlgorithm::Sha512.digest_uri();
        assert_eq!(HashAlgorithm::from_digest_uri(uri), Some(HashAlgorithm::Sha512));
        assert_eq!(HashAlgorithm::from_digest_uri("urn:bogus"), None);
    }
}
