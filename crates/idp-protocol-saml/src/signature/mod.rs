//! XML Signature support for SAML.
//!
//! [`XmlSigner`] produces enveloped signatures over elements identified by
//! their `ID` attribute. [`XmlSignatureValidator`] checks enveloped and
//! detached (HTTP-Redirect) signatures against the peer's trusted keys.
//!
//! The referenced element (without its enveloped signature) and `SignedInfo`
//! are digested and signed in exclusive canonical form. Namespaces declared
//! on ancestors are carried onto the fragment before canonicalization.
//!
//! # Signing Algorithms
//!
//! - RSA-SHA256 (recommended), RSA-SHA384, RSA-SHA512
//! - ECDSA-SHA256, ECDSA-SHA384
//!
//! RSA-SHA1 is only accepted from peers when explicitly allowed.

mod signer;
mod validator;

pub use idp_crypto::SignatureAlgorithm;
pub use signer::*;
pub use validator::*;

use crate::types::canonicalization_algorithms;

/// Canonicalization algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CanonicalizationAlgorithm {
    /// Exclusive C14N without comments (recommended).
    #[default]
    ExclusiveC14N,
    /// Exclusive C14N with comments.
    ExclusiveC14NWithComments,
}

impl CanonicalizationAlgorithm {
    /// Returns the URI for this canonicalization algorithm.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::ExclusiveC14N => canonicalization_algorithms::EXCLUSIVE_C14N,
            Self::ExclusiveC14NWithComments => {
                canonicalization_algorithms::EXCLUSIVE_C14N_WITH_COMMENTS
            }
        }
    }

    /// Returns true if comments are kept in the canonical form.
    #[must_use]
    pub const fn with_comments(&self) -> bool {
        matches!(self, Self::ExclusiveC14NWithComments)
    }

    /// Parses a canonicalization algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            canonicalization_algorithms::EXCLUSIVE_C14N => Some(Self::ExclusiveC14N),
            canonicalization_algorithms::EXCLUSIVE_C14N_WITH_COMMENTS => {
                Some(Self::ExclusiveC14NWithComments)
            }
            _ => None,
        }
    }
}

/// XML Signature structure.
///
/// Represents a parsed `<ds:Signature>` element.
#[derive(Debug, Clone)]
pub struct XmlSignature {
    /// The signature algorithm used.
    pub algorithm: SignatureAlgorithm,
    /// The digest algorithm URI of the reference.
    pub digest_algorithm: String,
    /// The canonicalization algorithm used.
    pub canonicalization: CanonicalizationAlgorithm,
    /// The reference URI (`#` followed by the ID of the signed element).
    pub reference_uri: String,
    /// The digest value (base64 encoded).
    pub digest_value: String,
    /// The signature value (base64 encoded).
    pub signature_value: String,
    /// Embedded X.509 certificate (base64 encoded, DER format).
    ///
    /// Informational only. Trust always comes from peer metadata.
    pub x509_certificate: Option<String>,
    /// The `SignedInfo` element exactly as it appeared in the document.
    pub signed_info: String,
}

/// Configuration for signature creation.
#[derive(Debug, Clone)]
pub struct SignatureConfig {
    /// The canonicalization algorithm to declare.
    pub canonicalization: CanonicalizationAlgorithm,
    /// Whether to include the X.509 certificate in the signature.
    pub include_certificate: bool,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            canonicalization: CanonicalizationAlgorithm::ExclusiveC14N,
            include_certificate: true,
        }
    }
}
