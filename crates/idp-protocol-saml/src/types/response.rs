//! SAML Response types.
//!
//! Response messages sent by an identity provider to a service provider.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use idp_crypto::encryption::{AES256_GCM_URI, MGF1_SHA256_URI, RSA_OAEP_URI};
use idp_crypto::EncryptedPayload;
use serde::{Deserialize, Serialize};

use super::{IssuedAssertion, Status};

/// SAML Response.
///
/// A response message sent from an identity provider to a service provider
/// containing authentication results. A response carries at most one
/// assertion, and none when the status is an error.
#[derive(Debug, Clone)]
pub struct Response {
    /// Unique identifier for this response.
    pub id: String,

    /// Version of the SAML protocol (always "2.0").
    pub version: String,

    /// Timestamp when this response was issued.
    pub issue_instant: DateTime<Utc>,

    /// The entity ID of the identity provider that issued this response.
    pub issuer: String,

    /// The ID of the request this response is for.
    pub in_response_to: Option<String>,

    /// The URL where this response is sent.
    pub destination: Option<String>,

    /// The status of the response.
    pub status: Status,

    /// The assertion carried by a success response.
    pub assertion: Option<ResponseAssertion>,
}

/// The assertion element of a response.
#[derive(Debug, Clone)]
pub enum ResponseAssertion {
    /// An assertion in the clear.
    Plain(IssuedAssertion),
    /// An assertion encrypted for the peer.
    Encrypted(EncryptedAssertion),
}

impl Response {
    /// Creates a response with the given ID, issue instant and status.
    #[must_use]
    pub fn new_at(
        id: impl Into<String>,
        issuer: impl Into<String>,
        now: DateTime<Utc>,
        status: Status,
    ) -> Self {
        Self {
            id: id.into(),
            version: "2.0".to_string(),
            issue_instant: now,
            issuer: issuer.into(),
            in_response_to: None,
            destination: None,
            status,
            assertion: None,
        }
    }

    /// Creates a new success response.
    #[must_use]
    pub fn success(issuer: impl Into<String>) -> Self {
        Self::new_at(
            idp_crypto::generate_message_id(),
            issuer,
            Utc::now(),
            Status::success(),
        )
    }

    /// Creates a new error response.
    #[must_use]
    pub fn error(issuer: impl Into<String>, status: Status) -> Self {
        Self::new_at(idp_crypto::generate_message_id(), issuer, Utc::now(), status)
    }

    /// Sets the request ID this response is for.
    #[must_use]
    pub fn in_response_to(mut self, request_id: impl Into<String>) -> Self {
        self.in_response_to = Some(request_id.into());
        self
    }

    /// Sets the destination URL.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Sets the assertion.
    #[must_use]
    pub fn with_assertion(mut self, assertion: ResponseAssertion) -> Self {
        self.assertion = Some(assertion);
        self
    }

    /// Returns true if this response indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns the plain assertion, if the response carries one.
    #[must_use]
    pub fn plain_assertion(&self) -> Option<&IssuedAssertion> {
        match &self.assertion {
            Some(ResponseAssertion::Plain(issued)) => Some(issued),
            _ => None,
        }
    }

    /// Returns the encrypted assertion, if the response carries one.
    #[must_use]
    pub fn encrypted_assertion(&self) -> Option<&EncryptedAssertion> {
        match &self.assertion {
            Some(ResponseAssertion::Encrypted(encrypted)) => Some(encrypted),
            _ => None,
        }
    }

    /// Validates the basic structure of this response.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("ID is required".to_string());
        }
        if self.version != "2.0" {
            return Err(format!("Unsupported SAML version: {}", self.version));
        }
        if self.issuer.is_empty() {
            return Err("Issuer is required".to_string());
        }
        if !self.is_success() && self.assertion.is_some() {
            return Err("Error responses must not carry an assertion".to_string());
        }
        Ok(())
    }
}

/// Encrypted assertion.
///
/// Contains the encrypted XML data for an assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedAssertion {
    /// The encrypted data.
    pub encrypted_data: EncryptedData,
}

impl EncryptedAssertion {
    /// Wraps an encryption result in the XML Encryption structure.
    #[must_use]
    pub fn from_payload(payload: &EncryptedPayload) -> Self {
        Self {
            encrypted_data: EncryptedData {
                encryption_method: Some(AES256_GCM_URI.to_string()),
                key_info: Some(KeyInfo {
                    encrypted_key: Some(EncryptedKey {
                        encryption_method: Some(RSA_OAEP_URI.to_string()),
                        mgf: Some(MGF1_SHA256_URI.to_string()),
                        cipher_data: CipherData {
                            cipher_value: STANDARD.encode(&payload.encrypted_key),
                        },
                    }),
                    key_name: None,
                }),
                cipher_data: CipherData {
                    cipher_value: STANDARD.encode(&payload.cipher_value),
                },
            },
        }
    }

    /// Recovers the raw payload for decryption.
    pub fn to_payload(&self) -> Result<EncryptedPayload, base64::DecodeError> {
        let encrypted_key = self
            .encrypted_data
            .key_info
            .as_ref()
            .and_then(|k| k.encrypted_key.as_ref())
            .map(|k| STANDARD.decode(&k.cipher_data.cipher_value))
            .transpose()?
            .unwrap_or_default();
        Ok(EncryptedPayload {
            encrypted_key,
            cipher_value: STANDARD.decode(&self.encrypted_data.cipher_data.cipher_value)?,
        })
    }
}

/// Encrypted data structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    /// The encryption algorithm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_method: Option<String>,

    /// Key info for decryption.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_info: Option<KeyInfo>,

    /// The cipher data.
    pub cipher_data: CipherData,
}

/// Key information for encryption/decryption.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    /// Encrypted key data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_key: Option<EncryptedKey>,

    /// Key name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
}

/// Encrypted key data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKey {
    /// The encryption algorithm used for the key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_method: Option<String>,

    /// Mask generation function for RSA-OAEP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mgf: Option<String>,

    /// The cipher data containing the encrypted key.
    pub cipher_data: CipherData,
}

/// Cipher data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherData {
    /// The cipher value (base64 encoded).
    pub cipher_value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{status_codes, sub_status_codes, Assertion};

    #[test]
    fn response_success() {
        let response = Response::success("https://idp.example.com")
            .in_response_to("_req123")
            .with_destination("https://sp.example.com/acs");

        assert!(response.is_success());
        assert!(!response.id.is_empty());
        assert_eq!(response.in_response_to.as_deref(), Some("_req123"));
        assert!(response.validate().is_ok());
    }

    #[test]
    fn response_error() {
        let response = Response::error(
            "https://idp.example.com",
            Status::error(
                status_codes::RESPONDER,
                Some(sub_status_codes::AUTHN_FAILED),
                "Invalid credentials",
            ),
        );

        assert!(!response.is_success());
        assert!(response.assertion.is_none());
        assert!(response.validate().is_ok());
    }

    #[test]
    fn error_response_with_assertion_is_invalid() {
        let issued = IssuedAssertion {
            assertion: Assertion::new("https://idp.example.com"),
            xml: String::new(),
            signed: false,
        };
        let response = Response::error("https://idp.example.com", Status::requester_error("no"))
            .with_assertion(ResponseAssertion::Plain(issued));
        assert!(response.validate().is_err());
        assert!(response.plain_assertion().is_some());
        assert!(response.encrypted_assertion().is_none());
    }

    #[test]
    fn response_validation() {
        let response = Response::success("https://idp.example.com");
        assert!(response.validate().is_ok());

        let mut invalid = response.clone();
        invalid.id = String::new();
        assert!(invalid.validate().is_err());

        let mut invalid = response;
        invalid.version = "1.1".to_string();
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn encrypted_assertion_payload_survives_encoding() {
        let payload = EncryptedPayload {
            encrypted_key: vec![1, 2, 3],
            cipher_value: vec![4, 5, 6, 7],
        };
        let encrypted = EncryptedAssertion::from_payload(&payload);
        assert_eq!(
            encrypted.encrypted_data.encryption_method.as_deref(),
            Some(AES256_GCM_URI)
        );
        assert_eq!(encrypted.to_payload().unwrap(), payload);
    }
}
