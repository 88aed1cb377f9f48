//! Key material handling.
//!
//! Peers publish their keys either as X.509 certificates or as bare
//! `SubjectPublicKeyInfo` structures. Both are reduced to a [`PublicKeyInfo`]
//! before use. The IdP's own credential is a [`SigningKey`] loaded from a
//! PKCS#8 document.
//!
//! ## Supported Keys
//!
//! - RSA (PKCS#1 v1.5 signatures, RSA-OAEP key transport)
//! - ECDSA P-256 and P-384 (signatures only)

use aws_lc_rs::{
    rand::SystemRandom,
    rsa::KeySize,
    signature::{
        self, EcdsaKeyPair, EcdsaSigningAlgorithm, KeyPair, RsaKeyPair,
        ECDSA_P256_SHA256_FIXED_SIGNING, ECDSA_P384_SHA384_FIXED_SIGNING,
    },
};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};
use x509_parser::prelude::{FromDer, SubjectPublicKeyInfo};

use crate::algorithm::SignatureAlgorithm;
use crate::hash::sha256;
use crate::signature::{SignatureError, SignatureProvider};

const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";

// AlgorithmIdentifier encodings used when rebuilding a SubjectPublicKeyInfo.
const RSA_ALGORITHM_ID: &[u8] = &[
    0x30, 0x0d, 0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x01, 0x05, 0x00,
];
const P256_ALGORITHM_ID: &[u8] = &[
    0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x08, 0x2a, 0x86,
    0x48, 0xce, 0x3d, 0x03, 0x01, 0x07,
];
const P384_ALGORITHM_ID: &[u8] = &[
    0x30, 0x10, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x05, 0x2b, 0x81,
    0x04, 0x00, 0x22,
];

// ============================================================================
// Public key material
// ============================================================================

/// Key family of a public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// RSA key.
    Rsa,
    /// Elliptic curve key.
    Ec,
}

/// Public key material published by a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "der", rename_all = "snake_case")]
pub enum KeyMaterial {
    /// DER-encoded X.509 certificate.
    Certificate(#[serde(with = "base64_der")] Vec<u8>),
    /// DER-encoded `SubjectPublicKeyInfo`.
    PublicKey(#[serde(with = "base64_der")] Vec<u8>),
}

/// Decoded public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyInfo {
    /// Key family.
    pub kind: KeyKind,
    /// Full `SubjectPublicKeyInfo` DER.
    pub spki: Vec<u8>,
    /// Raw key bits: PKCS#1 `RSAPublicKey` for RSA, the encoded point for EC.
    pub raw: Vec<u8>,
}

impl KeyMaterial {
    /// Creates key material from a base64 encoded certificate, as found in
    /// `<ds:X509Certificate>` elements. Whitespace is ignored.
    pub fn certificate_from_base64(encoded: &str) -> Result<Self, SignatureError> {
        let compact: String = encoded.split_whitespace().collect();
        let der = STANDARD
            .decode(compact)
            .map_err(|e| SignatureError::InvalidKey(format!("certificate is not base64: {e}")))?;
        Ok(Self::Certificate(der))
    }

    /// Returns the DER bytes as stored.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        match self {
            Self::Certificate(der) | Self::PublicKey(der) => der,
        }
    }

    /// Extracts the public key.
    pub fn public_key_info(&self) -> Result<PublicKeyInfo, SignatureError> {
        match self {
            Self::Certificate(der) => {
                let (_, cert) = x509_parser::parse_x509_certificate(der)
                    .map_err(|e| SignatureError::InvalidKey(format!("invalid certificate: {e}")))?;
                decode_spki(cert.public_key())
            }
            Self::PublicKey(der) => {
                let (_, spki) = SubjectPublicKeyInfo::from_der(der).map_err(|e| {
                    SignatureError::InvalidKey(format!("invalid public key: {e}"))
                })?;
                decode_spki(&spki)
            }
        }
    }
}

fn decode_spki(spki: &SubjectPublicKeyInfo<'_>) -> Result<PublicKeyInfo, SignatureError> {
    let oid = spki.algorithm.algorithm.to_id_string();
    let kind = match oid.as_str() {
        OID_RSA_ENCRYPTION => KeyKind::Rsa,
        OID_EC_PUBLIC_KEY => KeyKind::Ec,
        other => {
            return Err(SignatureError::UnsupportedAlgorithm(format!(
                "public key algorithm {other}"
            )))
        }
    };

    Ok(PublicKeyInfo {
        kind,
        spki: spki.raw.to_vec(),
        raw: spki.subject_public_key.data.to_vec(),
    })
}

mod base64_der {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(der: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(der))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let compact: String = encoded.split_whitespace().collect();
        STANDARD.decode(compact).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Signing key
// ============================================================================

enum KeyPairKind {
    Rsa(RsaKeyPair),
    Ecdsa(EcdsaKeyPair),
}

/// Private signing credential of the identity provider.
pub struct SigningKey {
    key_pair: KeyPairKind,
    key_id: String,
    algorithm: SignatureAlgorithm,
    certificate: Option<Vec<u8>>,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Creates a signing key from a PKCS#8 DER-encoded private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key does not parse or does not match the
    /// algorithm family.
    pub fn from_pkcs8(pkcs8_der: &[u8], algorithm: SignatureAlgorithm) -> Result<Self, SignatureError> {
        if algorithm.is_deprecated() {
            return Err(SignatureError::UnsupportedAlgorithm(format!(
                "{algorithm:?} may not be used for signing"
            )));
        }

        let key_pair = if algorithm.is_rsa() {
            let key_pair = RsaKeyPair::from_pkcs8(pkcs8_der)
                .map_err(|e| SignatureError::InvalidKey(format!("invalid RSA PKCS#8 key: {e}")))?;
            KeyPairKind::Rsa(key_pair)
        } else {
            let key_pair = EcdsaKeyPair::from_pkcs8(ecdsa_signing_algorithm(algorithm)?, pkcs8_der)
                .map_err(|e| {
                    SignatureError::InvalidKey(format!("invalid ECDSA PKCS#8 key: {e}"))
                })?;
            KeyPairKind::Ecdsa(key_pair)
        };

        let key_id = match &key_pair {
            KeyPairKind::Rsa(kp) => generate_key_id(kp.public_key().as_ref()),
            KeyPairKind::Ecdsa(kp) => generate_key_id(kp.public_key().as_ref()),
        };

        Ok(Self {
            key_pair,
            key_id,
            algorithm,
            certificate: None,
        })
    }

    /// Generates a fresh key for the algorithm.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation fails.
    pub fn generate(algorithm: SignatureAlgorithm) -> Result<Self, SignatureError> {
        if algorithm.is_deprecated() {
            return Err(SignatureError::UnsupportedAlgorithm(format!(
                "{algorithm:?} may not be used for signing"
            )));
        }
        if algorithm.is_rsa() {
            let key_pair = RsaKeyPair::generate(KeySize::Rsa2048)
                .map_err(|e| SignatureError::KeyGeneration(e.to_string()))?;
            let key_id = generate_key_id(key_pair.public_key().as_ref());
            return Ok(Self {
                key_pair: KeyPairKind::Rsa(key_pair),
                key_id,
                algorithm,
                certificate: None,
            });
        }

        let document = EcdsaKeyPair::generate_pkcs8(
            ecdsa_signing_algorithm(algorithm)?,
            &SystemRandom::new(),
        )
        .map_err(|e| SignatureError::KeyGeneration(e.to_string()))?;
        Self::from_pkcs8(document.as_ref(), algorithm)
    }

    /// Attaches the certificate that vouches for this key, published in metadata.
    #[must_use]
    pub fn with_certificate(mut self, certificate_der: Vec<u8>) -> Self {
        self.certificate = Some(certificate_der);
        self
    }

    /// Returns the key ID.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Returns the certificate, if one was attached.
    #[must_use]
    pub fn certificate(&self) -> Option<&[u8]> {
        self.certificate.as_deref()
    }

    /// Returns the DER-encoded `SubjectPublicKeyInfo` for this key.
    #[must_use]
    pub fn public_key_der(&self) -> Vec<u8> {
        let (algorithm_id, raw) = match &self.key_pair {
            KeyPairKind::Rsa(kp) => (RSA_ALGORITHM_ID, kp.public_key().as_ref().to_vec()),
            KeyPairKind::Ecdsa(kp) => {
                let algorithm_id = if self.algorithm == SignatureAlgorithm::EcdsaSha384 {
                    P384_ALGORITHM_ID
                } else {
                    P256_ALGORITHM_ID
                };
                (algorithm_id, kp.public_key().as_ref().to_vec())
            }
        };

        let mut bit_string = Vec::with_capacity(raw.len() + 1);
        bit_string.push(0x00);
        bit_string.extend_from_slice(&raw);

        let mut body = algorithm_id.to_vec();
        body.push(0x03);
        write_length(&mut body, bit_string.len());
        body.extend_from_slice(&bit_string);

        let mut spki = vec![0x30];
        write_length(&mut spki, body.len());
        spki.extend_from_slice(&body);
        spki
    }

    /// Returns the public half as peer-style key material.
    ///
    /// The certificate is preferred when one is attached.
    #[must_use]
    pub fn key_material(&self) -> KeyMaterial {
        self.certificate.as_ref().map_or_else(
            || KeyMaterial::PublicKey(self.public_key_der()),
            |cert| KeyMaterial::Certificate(cert.clone()),
        )
    }
}

impl SignatureProvider for SigningKey {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, SignatureError> {
        let rng = SystemRandom::new();
        match &self.key_pair {
            KeyPairKind::Rsa(kp) => {
                let padding = match self.algorithm {
                    SignatureAlgorithm::RsaSha256 => &signature::RSA_PKCS1_SHA256,
                    SignatureAlgorithm::RsaSha384 => &signature::RSA_PKCS1_SHA384,
                    SignatureAlgorithm::RsaSha512 => &signature::RSA_PKCS1_SHA512,
                    other => {
                        return Err(SignatureError::UnsupportedAlgorithm(format!(
                            "{other:?} not supported for RSA signing"
                        )))
                    }
                };
                let mut sig = vec![0u8; kp.public_modulus_len()];
                kp.sign(padding, &rng, data, &mut sig)
                    .map_err(|e| SignatureError::Signing(format!("RSA signing failed: {e}")))?;
                Ok(sig)
            }
            KeyPairKind::Ecdsa(kp) => kp
                .sign(&rng, data)
                .map(|sig| sig.as_ref().to_vec())
                .map_err(|e| SignatureError::Signing(format!("ECDSA signing failed: {e}"))),
        }
    }

    fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }
}

fn ecdsa_signing_algorithm(
    algorithm: SignatureAlgorithm,
) -> Result<&'static EcdsaSigningAlgorithm, SignatureError> {
    match algorithm {
        SignatureAlgorithm::EcdsaSha256 => Ok(&ECDSA_P256_SHA256_FIXED_SIGNING),
        SignatureAlgorithm::EcdsaSha384 => Ok(&ECDSA_P384_SHA384_FIXED_SIGNING),
        other => Err(SignatureError::UnsupportedAlgorithm(format!(
            "{other:?} is not an ECDSA algorithm"
        ))),
    }
}

/// Generates a key ID from the public key bytes.
fn generate_key_id(public_key: &[u8]) -> String {
    let hash = sha256(public_key);
    URL_SAFE_NO_PAD.encode(&hash[..8])
}

fn write_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        #[allow(clippy::cast_possible_truncation)]
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    #[allow(clippy::cast_possible_truncation)]
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}
