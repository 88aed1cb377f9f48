//! XML Signature creation.
//!
//! Provides functionality for signing SAML documents using XML-DSig.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use idp_crypto::{SignatureProvider, SigningKey};

use crate::error::{SamlError, SamlResult};
use crate::types::{canonicalization_algorithms, XMLDSIG_NS};
use crate::xml::{canonicalize, detach, find_by_id, index_elements};

use super::{CanonicalizationAlgorithm, SignatureAlgorithm, SignatureConfig};

/// XML document signer.
///
/// Signs SAML documents with the identity provider's signing key.
#[derive(Debug, Clone)]
pub struct XmlSigner {
    key: Arc<SigningKey>,
    config: SignatureConfig,
}

impl XmlSigner {
    /// Creates a new signer using the given key.
    #[must_use]
    pub fn new(key: Arc<SigningKey>) -> Self {
        Self {
            key,
            config: SignatureConfig::default(),
        }
    }

    /// Sets the signature configuration.
    #[must_use]
    pub fn with_config(mut self, config: SignatureConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the signature algorithm of the key.
    #[must_use]
    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.key.algorithm()
    }

    /// Returns the signing key.
    #[must_use]
    pub fn key(&self) -> &SigningKey {
        &self.key
    }

    /// Signs the element with the given `ID`.
    ///
    /// The `<ds:Signature>` element is inserted directly after the element's
    /// `Issuer` child, or as its first child if it has no `Issuer`.
    pub fn sign(&self, xml: &str, reference_id: &str) -> SamlResult<String> {
        let spans = index_elements(xml)?;
        let target = find_by_id(&spans, reference_id)
            .map_err(|e| SamlError::SignatureCreation(e.to_string()))?;
        if target.is_empty() {
            return Err(SamlError::SignatureCreation(format!(
                "element '{reference_id}' has no content to sign into"
            )));
        }

        let algorithm = self.algorithm();
        let with_comments = self.config.canonicalization.with_comments();
        let canonical = canonicalize(&detach(xml, &spans, target, None), with_comments)?;
        let digest = idp_crypto::hash(algorithm.hash_algorithm(), canonical.as_bytes());
        let signed_info = build_signed_info(
            reference_id,
            &STANDARD.encode(digest),
            algorithm,
            self.config.canonicalization,
        );

        let signature_value = self
            .key
            .sign(canonicalize(&signed_info, with_comments)?.as_bytes())
            .map_err(|e| SamlError::SignatureCreation(e.to_string()))?;

        let certificate = self
            .config
            .include_certificate
            .then(|| self.key.certificate())
            .flatten();
        let signature_element =
            build_signature_element(&signed_info, &STANDARD.encode(signature_value), certificate);

        let insert_at = spans
            .iter()
            .find(|s| target.is_parent_of(s))
            .filter(|first_child| first_child.local == "Issuer")
            .map_or(target.content_start, |issuer| issuer.end);

        Ok(format!(
            "{}{}{}",
            &xml[..insert_at],
            signature_element,
            &xml[insert_at..]
        ))
    }

    /// Builds a signed HTTP-Redirect query string.
    ///
    /// `encoded_message` is the deflated and base64 encoded message. The
    /// result contains the message, relay state, algorithm and signature
    /// parameters, URL encoded, in the order the signature covers them.
    pub fn sign_redirect_binding(
        &self,
        encoded_message: &str,
        relay_state: Option<&str>,
        is_request: bool,
    ) -> SamlResult<String> {
        let param_name = if is_request {
            "SAMLRequest"
        } else {
            "SAMLResponse"
        };

        let mut query = format!("{param_name}={}", urlencoding::encode(encoded_message));
        if let Some(rs) = relay_state {
            query.push_str(&format!("&RelayState={}", urlencoding::encode(rs)));
        }
        query.push_str(&format!(
            "&SigAlg={}",
            urlencoding::encode(self.algorithm().uri())
        ));

        let signature = self
            .key
            .sign(query.as_bytes())
            .map_err(|e| SamlError::SignatureCreation(e.to_string()))?;
        query.push_str(&format!(
            "&Signature={}",
            urlencoding::encode(&STANDARD.encode(signature))
        ));
        Ok(query)
    }
}

fn build_signed_info(
    reference_id: &str,
    digest_b64: &str,
    algorithm: SignatureAlgorithm,
    canonicalization: CanonicalizationAlgorithm,
) -> String {
    format!(
        r##"<ds:SignedInfo xmlns:ds="{XMLDSIG_NS}"><ds:CanonicalizationMethod Algorithm="{c14n}"/><ds:SignatureMethod Algorithm="{sig}"/><ds:Reference URI="#{reference_id}"><ds:Transforms><ds:Transform Algorithm="{enveloped}"/><ds:Transform Algorithm="{c14n}"/></ds:Transforms><ds:DigestMethod Algorithm="{digest}"/><ds:DigestValue>{digest_b64}</ds:DigestValue></ds:Reference></ds:SignedInfo>"##,
        c14n = canonicalization.uri(),
        sig = algorithm.uri(),
        enveloped = canonicalization_algorithms::ENVELOPED_SIGNATURE,
        digest = algorithm.hash_algorithm().digest_uri(),
    )
}

fn build_signature_element(
    signed_info: &str,
    signature_value: &str,
    certificate_der: Option<&[u8]>,
) -> String {
    let mut signature = format!(
        r#"<ds:Signature xmlns:ds="{XMLDSIG_NS}">{signed_info}<ds:SignatureValue>{signature_value}</ds:SignatureValue>"#
    );
    if let Some(cert) = certificate_der {
        signature.push_str(&format!(
            "<ds:KeyInfo><ds:X509Data><ds:X509Certificate>{}</ds:X509Certificate></ds:X509Data></ds:KeyInfo>",
            STANDARD.encode(cert)
        ));
    }
    signature.push_str("</ds:Signature>");
    signature
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> XmlSigner {
        let key = SigningKey::generate(SignatureAlgorithm::EcdsaSha256).unwrap();
        XmlSigner::new(Arc::new(key))
    }

    #[test]
    fn signature_follows_issuer() {
        let xml = r#"<saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_a1"><saml:Issuer>idp</saml:Issuer><saml:Subject/></saml:Assertion>"#;
        let signed = signer().sign(xml, "_a1").unwrap();

        let spans = index_elements(&signed).unwrap();
        let children: Vec<_> = spans
            .iter()
            .filter(|s| spans[0].is_parent_of(s))
            .map(|s| s.local.as_str())
            .collect();
        assert_eq!(children, ["Issuer", "Signature", "Subject"]);
        assert!(signed.contains(r##"URI="#_a1""##));
        assert!(signed.contains(SignatureAlgorithm::EcdsaSha256.uri()));
    }

    #[test]
    fn signature_is_first_child_without_issuer() {
        let xml = r#"<root ID="_x"><child/></root>"#;
        let signed = signer().sign(xml, "_x").unwrap();
        assert!(signed.starts_with(r#"<root ID="_x"><ds:Signature"#));
    }

    #[test]
    fn certificate_is_embedded_when_present() {
        let key = SigningKey::generate(SignatureAlgorithm::EcdsaSha256)
            .unwrap()
            .with_certificate(vec![1, 2, 3]);
        let signer = XmlSigner::new(Arc::new(key));
        let signed = signer.sign(r#"<root ID="_x"><a/></root>"#, "_x").unwrap();
        assert!(signed.contains("<ds:X509Certificate>AQID</ds:X509Certificate>"));

        let signer = signer.with_config(SignatureConfig {
            include_certificate: false,
            ..SignatureConfig::default()
        });
        let signed = signer.sign(r#"<root ID="_x"><a/></root>"#, "_x").unwrap();
        assert!(!signed.contains("X509Certificate"));
    }

    #[test]
    fn unknown_or_empty_targets_fail() {
        let signer = signer();
        assert!(matches!(
            signer.sign(r#"<root ID="_x"><a/></root>"#, "_y"),
            Err(SamlError::SignatureCreation(_))
        ));
        assert!(matches!(
            signer.sign(r#"<root ID="_x"/>"#, "_x"),
            Err(SamlError::SignatureCreation(_))
        ));
    }

    #[test]
    fn digest_covers_exclusive_canonical_form() {
        let xml = r#"<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_req1" Version="2.0" IssueInstant="2026-03-01T12:00:00Z">
  <saml:Issuer>https://sp.example.com</saml:Issuer>
  <samlp:NameIDPolicy AllowCreate="true"/>
</samlp:AuthnRequest>"#;
        let signed = signer().sign(xml, "_req1").unwrap();

        let mut c14n = Vec::new();
        xml_canonicalization::Canonicalizer::read_from_str(xml)
            .write_to_writer(&mut c14n)
            .canonicalize(false)
            .unwrap();
        let expected = STANDARD.encode(idp_crypto::hash(
            idp_crypto::HashAlgorithm::Sha256,
            &c14n,
        ));
        assert!(
            signed.contains(&format!("<ds:DigestValue>{expected}</ds:DigestValue>")),
            "digest is not over the canonical form: {signed}"
        );
    }

    #[test]
    fn redirect_query_parameter_order() {
        let query = signer()
            .sign_redirect_binding("abc+/=", Some("state 1"), true)
            .unwrap();
        assert!(query.starts_with("SAMLRequest=abc%2B%2F%3D&RelayState=state%201&SigAlg="));
        assert!(query.contains("&Signature="));
    }
}
