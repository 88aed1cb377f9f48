//! XML Signature validation.
//!
//! Signatures are only ever checked against keys taken from peer metadata.
//! A certificate embedded in the message is parsed but never trusted on its
//! own.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use idp_crypto::{HashAlgorithm, KeyMaterial, SignatureVerifier};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use crate::error::{SamlError, SamlResult};
use crate::types::canonicalization_algorithms;
use crate::xml::{attribute, canonicalize, detach, find_by_id, index_elements, local_name};

use super::{CanonicalizationAlgorithm, SignatureAlgorithm, XmlSignature};

/// XML signature validator.
#[derive(Clone)]
pub struct XmlSignatureValidator {
    verifier: Arc<dyn SignatureVerifier>,
    allow_sha1: bool,
}

impl std::fmt::Debug for XmlSignatureValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlSignatureValidator")
            .field("allow_sha1", &self.allow_sha1)
            .finish_non_exhaustive()
    }
}

impl XmlSignatureValidator {
    /// Creates a validator that checks raw signatures with `verifier`.
    #[must_use]
    pub fn new(verifier: Arc<dyn SignatureVerifier>) -> Self {
        Self {
            verifier,
            allow_sha1: false,
        }
    }

    /// Allows SHA-1 based signatures and digests (not recommended).
    #[must_use]
    pub const fn allow_sha1(mut self, allow: bool) -> Self {
        self.allow_sha1 = allow;
        self
    }

    /// Validates the enveloped signature of the element with the given `ID`.
    ///
    /// The signature must be a direct child of that element, its reference
    /// must point at the element, and it must verify under one of
    /// `trusted_keys`.
    pub fn validate(
        &self,
        xml: &str,
        reference_id: &str,
        trusted_keys: &[KeyMaterial],
    ) -> SamlResult<XmlSignature> {
        if trusted_keys.is_empty() {
            return Err(SamlError::SignatureInvalid(
                "no trusted signing keys for peer".to_string(),
            ));
        }

        let spans = index_elements(xml)?;
        let target = find_by_id(&spans, reference_id)?;
        let mut signatures = spans
            .iter()
            .filter(|s| s.local == "Signature" && target.is_parent_of(s));
        let signature_span = signatures
            .next()
            .ok_or_else(|| SamlError::MissingElement("Signature".to_string()))?;
        if signatures.next().is_some() {
            return Err(SamlError::SignatureInvalid(
                "element carries more than one signature".to_string(),
            ));
        }

        let signature = parse_signature(signature_span.slice(xml))?;
        if signature.reference_uri != format!("#{reference_id}") {
            return Err(SamlError::SignatureInvalid(format!(
                "signature references '{}' instead of '#{reference_id}'",
                signature.reference_uri
            )));
        }

        let digest_algorithm = HashAlgorithm::from_digest_uri(&signature.digest_algorithm)
            .ok_or_else(|| {
                SamlError::SignatureInvalid(format!(
                    "unknown digest algorithm: {}",
                    signature.digest_algorithm
                ))
            })?;
        self.check_algorithms(signature.algorithm, digest_algorithm)?;

        let with_comments = signature.canonicalization.with_comments();
        let canonical = canonicalize(
            &detach(xml, &spans, target, Some(signature_span)),
            with_comments,
        )?;
        let computed = idp_crypto::hash(digest_algorithm, canonical.as_bytes());
        let expected = decode_b64(&signature.digest_value)?;
        if !idp_crypto::constant_time_eq(&computed, &expected) {
            return Err(SamlError::SignatureInvalid(
                "digest value mismatch".to_string(),
            ));
        }

        let signed_info_span = spans
            .iter()
            .find(|s| s.local == "SignedInfo" && signature_span.is_parent_of(s))
            .ok_or_else(|| SamlError::MissingElement("SignedInfo".to_string()))?;
        let signed_info = canonicalize(
            &detach(xml, &spans, signed_info_span, None),
            with_comments,
        )?;

        let signature_bytes = decode_b64(&signature.signature_value)?;
        self.verify_with_any(
            trusted_keys,
            signature.algorithm,
            signed_info.as_bytes(),
            &signature_bytes,
        )?;

        Ok(signature)
    }

    /// Validates a detached HTTP-Redirect signature.
    ///
    /// `signed_octets` must be the query parameters exactly as received:
    /// `SAMLRequest=...[&RelayState=...]&SigAlg=...`, still URL encoded.
    pub fn validate_detached(
        &self,
        signed_octets: &str,
        signature_b64: &str,
        sig_alg: &str,
        trusted_keys: &[KeyMaterial],
    ) -> SamlResult<()> {
        if trusted_keys.is_empty() {
            return Err(SamlError::SignatureInvalid(
                "no trusted signing keys for peer".to_string(),
            ));
        }
        let algorithm = SignatureAlgorithm::from_uri(sig_alg)
            .map_err(|e| SamlError::SignatureInvalid(e.to_string()))?;
        self.check_algorithms(algorithm, algorithm.hash_algorithm())?;

        let signature = decode_b64(signature_b64)?;
        self.verify_with_any(trusted_keys, algorithm, signed_octets.as_bytes(), &signature)
    }

    fn check_algorithms(
        &self,
        algorithm: SignatureAlgorithm,
        digest: HashAlgorithm,
    ) -> SamlResult<()> {
        if !self.allow_sha1 && (algorithm.is_deprecated() || digest == HashAlgorithm::Sha1) {
            return Err(SamlError::SignatureInvalid(
                "SHA-1 signatures are not allowed".to_string(),
            ));
        }
        Ok(())
    }

    fn verify_with_any(
        &self,
        keys: &[KeyMaterial],
        algorithm: SignatureAlgorithm,
        data: &[u8],
        signature: &[u8],
    ) -> SamlResult<()> {
        for (index, key) in keys.iter().enumerate() {
            match self.verifier.verify(key, algorithm, data, signature) {
                Ok(()) => return Ok(()),
                Err(e) => debug!(key_index = index, error = %e, "signature did not verify with key"),
            }
        }
        Err(SamlError::SignatureInvalid(
            "signature verification failed with all trusted keys".to_string(),
        ))
    }
}

/// Parses a `<ds:Signature>` element.
///
/// Exactly one `Reference` is supported, and only the enveloped-signature
/// and exclusive canonicalization transforms are accepted.
pub fn parse_signature(xml: &str) -> SamlResult<XmlSignature> {
    let spans = index_elements(xml)?;
    if spans[0].local != "Signature" {
        return Err(SamlError::SignatureInvalid(format!(
            "expected Signature, found {}",
            spans[0].local
        )));
    }
    let signed_info = spans
        .iter()
        .find(|s| s.local == "SignedInfo" && spans[0].is_parent_of(s))
        .ok_or_else(|| SamlError::MissingElement("SignedInfo".to_string()))?
        .slice(xml)
        .to_string();
    if spans.iter().filter(|s| s.local == "Reference").count() != 1 {
        return Err(SamlError::SignatureInvalid(
            "exactly one Reference is required".to_string(),
        ));
    }

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut canonicalization = None;
    let mut algorithm = None;
    let mut reference_uri = None;
    let mut digest_algorithm = None;
    let mut digest_value = None;
    let mut signature_value = None;
    let mut x509_certificate = None;
    let mut current: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                let local = local_name(&e)?;
                match local.as_str() {
                    "CanonicalizationMethod" => {
                        let uri = required_algorithm(&e)?;
                        canonicalization =
                            Some(CanonicalizationAlgorithm::from_uri(&uri).ok_or_else(|| {
                                SamlError::SignatureInvalid(format!(
                                    "unsupported canonicalization: {uri}"
                                ))
                            })?);
                    }
                    "SignatureMethod" => {
                        let uri = required_algorithm(&e)?;
                        algorithm = Some(
                            SignatureAlgorithm::from_uri(&uri)
                                .map_err(|e| SamlError::SignatureInvalid(e.to_string()))?,
                        );
                    }
                    "Reference" => reference_uri = attribute(&e, "URI")?,
                    "Transform" => {
                        let uri = required_algorithm(&e)?;
                        if uri != canonicalization_algorithms::ENVELOPED_SIGNATURE
                            && CanonicalizationAlgorithm::from_uri(&uri).is_none()
                        {
                            return Err(SamlError::SignatureInvalid(format!(
                                "unsupported transform: {uri}"
                            )));
                        }
                    }
                    "DigestMethod" => digest_algorithm = Some(required_algorithm(&e)?),
                    _ => {}
                }
                current = Some(local);
            }
            Event::Text(e) => {
                let text = e.unescape()?;
                let text: String = text.chars().filter(|c| !c.is_whitespace()).collect();
                match current.as_deref() {
                    Some("DigestValue") => digest_value = Some(text),
                    Some("SignatureValue") => signature_value = Some(text),
                    Some("X509Certificate") if x509_certificate.is_none() => {
                        x509_certificate = Some(text);
                    }
                    _ => {}
                }
            }
            Event::End(_) => current = None,
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(XmlSignature {
        algorithm: algorithm
            .ok_or_else(|| SamlError::MissingElement("SignatureMethod".to_string()))?,
        digest_algorithm: digest_algorithm
            .ok_or_else(|| SamlError::MissingElement("DigestMethod".to_string()))?,
        canonicalization: canonicalization
            .ok_or_else(|| SamlError::MissingElement("CanonicalizationMethod".to_string()))?,
        reference_uri: reference_uri
            .ok_or_else(|| SamlError::MissingElement("Reference/@URI".to_string()))?,
        digest_value: digest_value
            .ok_or_else(|| SamlError::MissingElement("DigestValue".to_string()))?,
        signature_value: signature_value
            .ok_or_else(|| SamlError::MissingElement("SignatureValue".to_string()))?,
        x509_certificate,
        signed_info,
    })
}

fn required_algorithm(e: &quick_xml::events::BytesStart<'_>) -> SamlResult<String> {
    attribute(e, "Algorithm")?
        .ok_or_else(|| SamlError::MissingElement("Algorithm attribute".to_string()))
}

fn decode_b64(value: &str) -> SamlResult<Vec<u8>> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| SamlError::SignatureInvalid(format!("invalid base64 value: {e}")))
}
