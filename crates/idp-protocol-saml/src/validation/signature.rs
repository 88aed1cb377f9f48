//! Request signature validation.

use std::sync::Arc;

use async_trait::async_trait;
use idp_crypto::SignatureVerifier;
use tracing::{debug, warn};

use crate::error::{IdpError, UnrecoverableKind};
use crate::request::{ReceivedAuthnRequest, RequestSignature};
use crate::signature::XmlSignatureValidator;
use crate::types::PeerMetadata;

use super::{RequestContext, RequestValidator, ValidationOutcome};

/// Verifies the request signature against the peer's signing keys.
///
/// A signature is required when the IdP requires signed requests or the
/// peer declares `AuthnRequestsSigned`. A signature that is present is
/// always verified, required or not.
#[derive(Debug, Clone)]
pub struct SignatureValidator {
    validator: XmlSignatureValidator,
    require_signed: bool,
}

impl SignatureValidator {
    /// Creates a signature validator.
    #[must_use]
    pub fn new(verifier: Arc<dyn SignatureVerifier>, require_signed: bool, allow_sha1: bool) -> Self {
        Self {
            validator: XmlSignatureValidator::new(verifier).allow_sha1(allow_sha1),
            require_signed,
        }
    }
}

#[async_trait]
impl RequestValidator for SignatureValidator {
    fn name(&self) -> &'static str {
        "signature"
    }

    async fn validate(
        &self,
        request: &ReceivedAuthnRequest,
        peer: &PeerMetadata,
        _ctx: &mut RequestContext,
    ) -> ValidationOutcome {
        let required = self.require_signed || peer.authn_requests_signed;

        let result = match &request.signature {
            None if required => {
                warn!(request_id = %request.id(), peer = %peer.entity_id, "unsigned request rejected");
                return Err(IdpError::unrecoverable(
                    UnrecoverableKind::MissingAuthnRequestSignature,
                    format!("request from '{}' must be signed", peer.entity_id),
                ));
            }
            None => {
                debug!(request_id = %request.id(), "request is not signed, signature not required");
                return Ok(());
            }
            Some(RequestSignature::Enveloped) => self
                .validator
                .validate(&request.xml, request.id(), &peer.signing_keys)
                .map(|_| ()),
            Some(RequestSignature::Detached {
                signed_octets,
                signature,
                sig_alg,
            }) => self.validator.validate_detached(
                signed_octets,
                signature,
                sig_alg,
                &peer.signing_keys,
            ),
        };

        result.map_err(|e| {
            warn!(request_id = %request.id(), peer = %peer.entity_id, error = %e, "request signature invalid");
            IdpError::unrecoverable(UnrecoverableKind::InvalidAuthnRequestSignature, e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use chrono::Utc;
    use idp_crypto::{AwsLcVerifier, SignatureAlgorithm, SigningKey};

    use super::*;
    use crate::bindings::{HttpRedirectBinding, SamlMessageType};
    use crate::request::RawAuthnRequest;
    use crate::signature::XmlSigner;
    use crate::types::AuthnRequest;
    use crate::xml::authn_request_xml;

    fn signer() -> XmlSigner {
        XmlSigner::new(Arc::new(
            SigningKey::generate(SignatureAlgorithm::EcdsaSha256).unwrap(),
        ))
    }

    fn request_xml() -> String {
        authn_request_xml(
            &AuthnRequest::with_id("_req1", "https://sp.example.com").issued_at(Utc::now()),
        )
    }

    fn post(xml: &str) -> ReceivedAuthnRequest {
        ReceivedAuthnRequest::decode(&RawAuthnRequest::post(STANDARD.encode(xml), None).message)
            .unwrap()
    }

    fn validator(require_signed: bool) -> SignatureValidator {
        SignatureValidator::new(Arc::new(AwsLcVerifier::new()), require_signed, false)
    }

    async fn run(
        validator: &SignatureValidator,
        request: &ReceivedAuthnRequest,
        peer: &PeerMetadata,
    ) -> ValidationOutcome {
        let mut ctx = RequestContext::new(Utc::now(), None);
        validator.validate(request, peer, &mut ctx).await
    }

    #[tokio::test]
    async fn enveloped_signature_verifies() {
        let signer = signer();
        let signed = signer.sign(&request_xml(), "_req1").unwrap();
        let peer = PeerMetadata::new("https://sp.example.com")
            .with_signing_key(signer.key().key_material());

        assert!(run(&validator(true), &post(&signed), &peer).await.is_ok());
    }

    #[tokio::test]
    async fn detached_signature_verifies() {
        let signer = signer();
        let url = HttpRedirectBinding::encode_signed(
            &request_xml(),
            "https://idp.example.com/saml/sso",
            Some("state"),
            SamlMessageType::Request,
            &signer,
        )
        .unwrap();
        let query = url.split_once('?').unwrap().1;
        let request =
            ReceivedAuthnRequest::decode(&RawAuthnRequest::redirect(query).message).unwrap();
        let peer = PeerMetadata::new("https://sp.example.com")
            .with_signing_key(signer.key().key_material());

        assert!(run(&validator(true), &request, &peer).await.is_ok());

        let stranger = PeerMetadata::new("https://sp.example.com")
            .with_signing_key(self::signer().key().key_material());
        let err = run(&validator(true), &request, &stranger).await.unwrap_err();
        assert_eq!(
            err.unrecoverable_kind(),
            Some(UnrecoverableKind::InvalidAuthnRequestSignature)
        );
    }

    #[tokio::test]
    async fn unsigned_request_policy() {
        let peer = PeerMetadata::new("https://sp.example.com");
        let request = post(&request_xml());

        let err = run(&validator(true), &request, &peer).await.unwrap_err();
        assert_eq!(
            err.unrecoverable_kind(),
            Some(UnrecoverableKind::MissingAuthnRequestSignature)
        );

        assert!(run(&validator(false), &request, &peer).await.is_ok());

        let strict_peer = PeerMetadata::new("https://sp.example.com").authn_requests_signed(true);
        assert!(run(&validator(false), &request, &strict_peer).await.is_err());
    }

    #[tokio::test]
    async fn present_signature_is_checked_even_if_optional() {
        let signed = signer().sign(&request_xml(), "_req1").unwrap();
        let peer = PeerMetadata::new("https://sp.example.com")
            .with_signing_key(signer().key().key_material());

        let err = run(&validator(false), &post(&signed), &peer).await.unwrap_err();
        assert_eq!(
            err.unrecoverable_kind(),
            Some(UnrecoverableKind::InvalidAuthnRequestSignature)
        );
    }

    #[tokio::test]
    async fn peer_without_keys_cannot_be_verified() {
        let signed = signer().sign(&request_xml(), "_req1").unwrap();
        let err = run(
            &validator(true),
            &post(&signed),
            &PeerMetadata::new("https://sp.example.com"),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.unrecoverable_kind(),
            Some(UnrecoverableKind::InvalidAuthnRequestSignature)
        );
    }
}
