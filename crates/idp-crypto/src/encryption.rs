//! Assertion encryption.
//!
//! Content is encrypted with a fresh AES-256-GCM key which is then wrapped
//! for the recipient with RSA-OAEP (SHA-256, MGF1 with SHA-256). The cipher
//! value carries the nonce, the ciphertext and the tag in that order.

use aws_lc_rs::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use aws_lc_rs::rsa::{
    OaepPrivateDecryptingKey, OaepPublicEncryptingKey, PrivateDecryptingKey, PublicEncryptingKey,
    OAEP_SHA256_MGF1SHA256,
};
use thiserror::Error;

use crate::keys::{KeyKind, KeyMaterial};
use crate::random::random_bytes;

/// Block encryption algorithm URI.
pub const AES256_GCM_URI: &str = "http://www.w3.org/2009/xmlenc11#aes256-gcm";

/// Key transport algorithm URI.
pub const RSA_OAEP_URI: &str = "http://www.w3.org/2009/xmlenc11#rsa-oaep";

/// Mask generation function URI used with [`RSA_OAEP_URI`].
pub const MGF1_SHA256_URI: &str = "http://www.w3.org/2009/xmlenc11#mgf1sha256";

const CONTENT_KEY_LEN: usize = 32;

/// Error type for encryption operations.
#[derive(Debug, Error)]
pub enum EncryptionError {
    /// The recipient key cannot be used for key transport.
    #[error("unusable encryption key: {0}")]
    UnusableKey(String),

    /// Encryption failed.
    #[error("encryption failed")]
    Encryption,

    /// Decryption failed.
    #[error("decryption failed")]
    Decryption,
}

/// Output of [`encrypt_for_recipient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    /// Content key wrapped for the recipient.
    pub encrypted_key: Vec<u8>,
    /// Nonce, ciphertext and authentication tag.
    pub cipher_value: Vec<u8>,
}

/// Returns true if content can be encrypted for this key.
#[must_use]
pub fn can_encrypt_for(key: &KeyMaterial) -> bool {
    key.public_key_info()
        .is_ok_and(|info| info.kind == KeyKind::Rsa && PublicEncryptingKey::from_der(&info.spki).is_ok())
}

/// Encrypts `plaintext` for the holder of `recipient`.
///
/// # Errors
///
/// Returns an error if the key is not an RSA key or encryption fails.
pub fn encrypt_for_recipient(
    recipient: &KeyMaterial,
    plaintext: &[u8],
) -> Result<EncryptedPayload, EncryptionError> {
    let info = recipient
        .public_key_info()
        .map_err(|e| EncryptionError::UnusableKey(e.to_string()))?;
    if info.kind != KeyKind::Rsa {
        return Err(EncryptionError::UnusableKey(
            "key transport requires an RSA key".to_string(),
        ));
    }

    let public_key = PublicEncryptingKey::from_der(&info.spki)
        .map_err(|e| EncryptionError::UnusableKey(e.to_string()))?;
    let oaep = OaepPublicEncryptingKey::new(public_key)
        .map_err(|e| EncryptionError::UnusableKey(e.to_string()))?;

    let content_key = random_bytes(CONTENT_KEY_LEN);
    let mut wrapped = vec![0u8; oaep.ciphertext_size()];
    let encrypted_key = oaep
        .encrypt(&OAEP_SHA256_MGF1SHA256, &content_key, &mut wrapped, None)
        .map_err(|_| EncryptionError::Encryption)?
        .to_vec();

    let key = aes_key(&content_key)?;
    let nonce_bytes = random_bytes(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(&nonce_bytes)
        .map_err(|_| EncryptionError::Encryption)?;
    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| EncryptionError::Encryption)?;

    let mut cipher_value = nonce_bytes;
    cipher_value.extend_from_slice(&in_out);

    Ok(EncryptedPayload {
        encrypted_key,
        cipher_value,
    })
}

/// Decrypts payloads produced by [`encrypt_for_recipient`].
///
/// This is the relying party's half and is used to check what the IdP emits.
pub struct AssertionDecrypter {
    key: OaepPrivateDecryptingKey,
    public_key_der: Vec<u8>,
}

impl std::fmt::Debug for AssertionDecrypter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssertionDecrypter").finish_non_exhaustive()
    }
}

impl AssertionDecrypter {
    /// Creates a decrypter from a PKCS#8 encoded RSA private key.
    pub fn from_pkcs8(pkcs8_der: &[u8]) -> Result<Self, EncryptionError> {
        let private_key = PrivateDecryptingKey::from_pkcs8(pkcs8_der)
            .map_err(|e| EncryptionError::UnusableKey(e.to_string()))?;
        Self::from_private_key(private_key)
    }

    /// Generates a fresh 2048-bit decryption key.
    pub fn generate() -> Result<Self, EncryptionError> {
        let private_key = PrivateDecryptingKey::generate(aws_lc_rs::rsa::KeySize::Rsa2048)
            .map_err(|e| EncryptionError::UnusableKey(e.to_string()))?;
        Self::from_private_key(private_key)
    }

    fn from_private_key(private_key: PrivateDecryptingKey) -> Result<Self, EncryptionError> {
        use aws_lc_rs::encoding::{AsDer, PublicKeyX509Der};

        let public_key_der: PublicKeyX509Der<'static> = private_key
            .public_key()
            .as_der()
            .map_err(|e| EncryptionError::UnusableKey(e.to_string()))?;
        let public_key_der = public_key_der.as_ref().to_vec();
        let key = OaepPrivateDecryptingKey::new(private_key)
            .map_err(|e| EncryptionError::UnusableKey(e.to_string()))?;
        Ok(Self {
            key,
            public_key_der,
        })
    }

    /// Returns the public half to publish as encryption key material.
    #[must_use]
    pub fn key_material(&self) -> KeyMaterial {
        KeyMaterial::PublicKey(self.public_key_der.clone())
    }

    /// Recovers the plaintext.
    pub fn decrypt(&self, payload: &EncryptedPayload) -> Result<Vec<u8>, EncryptionError> {
        let mut unwrapped = vec![0u8; self.key.min_output_size()];
        let content_key = self
            .key
            .decrypt(
                &OAEP_SHA256_MGF1SHA256,
                &payload.encrypted_key,
                &mut unwrapped,
                None,
            )
            .map_err(|_| EncryptionError::Decryption)?;
        let key = aes_key(content_key).map_err(|_| EncryptionError::Decryption)?;

        if payload.cipher_value.len() < NONCE_LEN {
            return Err(EncryptionError::Decryption);
        }
        let (nonce_bytes, sealed) = payload.cipher_value.split_at(NONCE_LEN);
        let nonce =
            Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| EncryptionError::Decryption)?;
        let mut in_out = sealed.to_vec();
        let plaintext = key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| EncryptionError::Decryption)?;
        Ok(plaintext.to_vec())
    }
}

fn aes_key(bytes: &[u8]) -> Result<LessSafeKey, EncryptionError> {
    UnboundKey::new(&AES_256_GCM, bytes)
        .map(LessSafeKey::new)
        .map_err(|_| EncryptionError::Encryption)
}
