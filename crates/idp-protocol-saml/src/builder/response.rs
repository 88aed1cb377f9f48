//! Response construction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use idp_core::IdpConfig;
use idp_crypto::{encrypt_for_recipient, KeyMaterial};
use tracing::{debug, error};

use crate::error::{IdpError, ProtocolError};
use crate::request::ReceivedAuthnRequest;
use crate::signature::XmlSigner;
use crate::types::{
    AcsEndpoint, EncryptedAssertion, IssuedAssertion, Response, ResponseAssertion, SamlBinding,
    Status,
};
use crate::validation::RequestContext;
use crate::xml::response_xml;

/// Hook run on every response before it is serialized and signed.
pub type ResponseCustomizer = Arc<dyn Fn(&mut Response) -> Result<(), ProtocolError> + Send + Sync>;

/// Where a response goes and what it answers.
#[derive(Debug, Clone, Default)]
pub struct ResponseTarget {
    /// The validated assertion consumer service.
    pub destination: Option<AcsEndpoint>,
    /// ID of the request being answered.
    pub in_response_to: Option<String>,
    /// Relay state to return unchanged.
    pub relay_state: Option<String>,
}

impl ResponseTarget {
    /// Creates the target for a validated request.
    #[must_use]
    pub fn for_request(request: &ReceivedAuthnRequest, context: &RequestContext) -> Self {
        Self {
            destination: context.resolved_acs.clone(),
            in_response_to: Some(request.id().to_string()),
            relay_state: request.relay_state.clone(),
        }
    }
}

/// A serialized response ready for delivery.
#[derive(Debug, Clone)]
pub struct FinishedResponse {
    /// The response model.
    pub response: Response,
    /// The serialized response, signed if the IdP signs responses.
    pub xml: String,
    /// The endpoint URL.
    pub destination: String,
    /// How the response is delivered.
    pub binding: SamlBinding,
    /// Relay state to return unchanged.
    pub relay_state: Option<String>,
}

/// Wraps assertions and error statuses into responses.
#[derive(Clone)]
pub struct ResponseFactory {
    issuer: String,
    signer: Option<Arc<XmlSigner>>,
    sign_responses: bool,
    customizer: Option<ResponseCustomizer>,
}

impl std::fmt::Debug for ResponseFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseFactory")
            .field("issuer", &self.issuer)
            .field("sign_responses", &self.sign_responses)
            .field("customizer", &self.customizer.is_some())
            .finish_non_exhaustive()
    }
}

impl ResponseFactory {
    /// Creates a factory following the configured signing policy.
    #[must_use]
    pub fn new(config: &IdpConfig) -> Self {
        Self {
            issuer: config.entity_id.clone(),
            signer: None,
            sign_responses: config.assertion.sign_responses,
            customizer: None,
        }
    }

    /// Sets the response signer.
    #[must_use]
    pub fn with_signer(mut self, signer: Arc<XmlSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Sets the customization hook.
    #[must_use]
    pub fn with_customizer(mut self, customizer: ResponseCustomizer) -> Self {
        self.customizer = Some(customizer);
        self
    }

    /// Builds a success response carrying `assertion`.
    ///
    /// With an `encryption_key` the assertion is encrypted for the peer and
    /// the encrypted form replaces the plain one.
    pub fn success(
        &self,
        now: DateTime<Utc>,
        target: &ResponseTarget,
        assertion: IssuedAssertion,
        encryption_key: Option<&KeyMaterial>,
    ) -> Result<FinishedResponse, IdpError> {
        let (destination, in_response_to) = Self::require_target(target)?;

        let assertion = match encryption_key {
            Some(key) => {
                let payload = encrypt_for_recipient(key, assertion.xml.as_bytes()).map_err(|e| {
                    error!(assertion_id = %assertion.assertion.id, error = %e, "assertion encryption failed");
                    IdpError::internal(format!("assertion encryption failed: {e}"))
                })?;
                ResponseAssertion::Encrypted(EncryptedAssertion::from_payload(&payload))
            }
            None => ResponseAssertion::Plain(assertion),
        };

        let response = Response::new_at(
            idp_crypto::generate_message_id(),
            &self.issuer,
            now,
            Status::success(),
        )
        .in_response_to(in_response_to)
        .with_destination(&destination.location)
        .with_assertion(assertion);

        self.finish(response, destination, target)
    }

    /// Builds a status-only response for a recoverable error.
    pub fn error(
        &self,
        now: DateTime<Utc>,
        target: &ResponseTarget,
        failure: &ProtocolError,
    ) -> Result<FinishedResponse, IdpError> {
        let (destination, in_response_to) = Self::require_target(target)?;
        let response = Response::new_at(
            idp_crypto::generate_message_id(),
            &self.issuer,
            now,
            failure.to_status(),
        )
        .in_response_to(in_response_to)
        .with_destination(&destination.location);

        self.finish(response, destination, target).map_err(|e| match e {
            // an error response must not turn into another error response
            IdpError::Protocol(p) => IdpError::internal(format!("error response rejected: {p}")),
            other => other,
        })
    }

    fn require_target(target: &ResponseTarget) -> Result<(&AcsEndpoint, &str), IdpError> {
        let destination = target
            .destination
            .as_ref()
            .ok_or_else(|| IdpError::internal("response has no destination"))?;
        let in_response_to = target
            .in_response_to
            .as_deref()
            .ok_or_else(|| IdpError::internal("response has no InResponseTo"))?;
        Ok((destination, in_response_to))
    }

    fn finish(
        &self,
        mut response: Response,
        destination: &AcsEndpoint,
        target: &ResponseTarget,
    ) -> Result<FinishedResponse, IdpError> {
        if let Some(customizer) = &self.customizer {
            customizer(&mut response)?;
        }

        let mut xml = response_xml(&response);
        if self.sign_responses {
            let signer = self
                .signer
                .as_ref()
                .ok_or_else(|| IdpError::internal("no signing key configured for responses"))?;
            xml = signer.sign(&xml, &response.id).map_err(|e| {
                error!(response_id = %response.id, error = %e, "response signing failed");
                IdpError::internal(format!("response signing failed: {e}"))
            })?;
        }

        debug!(
            response_id = %response.id,
            destination = %destination.location,
            success = response.is_success(),
            "response built"
        );
        Ok(FinishedResponse {
            response,
            xml,
            destination: destination.location.clone(),
            binding: destination.binding,
            relay_state: target.relay_state.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use idp_crypto::{AssertionDecrypter, AwsLcVerifier, SignatureAlgorithm, SigningKey};

    use super::*;
    use crate::error::ErrorStatus;
    use crate::signature::XmlSignatureValidator;
    use crate::types::{status_codes, sub_status_codes, Assertion};
    use crate::xml::assertion_xml;

    const IDP: &str = "https://idp.example.com";
    const ACS: &str = "https://sp.example.com/acs";

    fn target() -> ResponseTarget {
        ResponseTarget {
            destination: Some(AcsEndpoint::new(SamlBinding::HttpPost, ACS, 0)),
            in_response_to: Some("_req1".to_string()),
            relay_state: Some("state-1".to_string()),
        }
    }

    fn issued() -> IssuedAssertion {
        let assertion = Assertion::new_at("_a1", IDP, Utc::now());
        IssuedAssertion {
            xml: assertion_xml(&assertion),
            assertion,
            signed: false,
        }
    }

    fn key() -> Arc<SigningKey> {
        Arc::new(SigningKey::generate(SignatureAlgorithm::EcdsaSha256).unwrap())
    }

    fn unsigned_factory() -> ResponseFactory {
        ResponseFactory::new(&IdpConfig::new(IDP).sign_responses(false))
    }

    #[test]
    fn success_response_is_signed_and_addressed() {
        let key = key();
        let factory = ResponseFactory::new(&IdpConfig::new(IDP))
            .with_signer(Arc::new(XmlSigner::new(Arc::clone(&key))));
        let finished = factory.success(Utc::now(), &target(), issued(), None).unwrap();

        assert_eq!(finished.destination, ACS);
        assert_eq!(finished.binding, SamlBinding::HttpPost);
        assert_eq!(finished.relay_state.as_deref(), Some("state-1"));
        assert_eq!(finished.response.in_response_to.as_deref(), Some("_req1"));
        assert_eq!(finished.response.destination.as_deref(), Some(ACS));
        assert!(finished.response.plain_assertion().is_some());

        XmlSignatureValidator::new(Arc::new(AwsLcVerifier::new()))
            .validate(&finished.xml, &finished.response.id, &[key.key_material()])
            .unwrap();
    }

    #[test]
    fn encrypted_assertion_replaces_plain() {
        let decrypter = AssertionDecrypter::generate().unwrap();
        let finished = unsigned_factory()
            .success(Utc::now(), &target(), issued(), Some(&decrypter.key_material()))
            .unwrap();

        assert!(finished.response.plain_assertion().is_none());
        assert!(!finished.xml.contains("<saml:Assertion "));
        let encrypted = finished.response.encrypted_assertion().unwrap();
        let plaintext = decrypter.decrypt(&encrypted.to_payload().unwrap()).unwrap();
        assert_eq!(String::from_utf8(plaintext).unwrap(), issued().xml);
    }

    #[test]
    fn error_response_carries_status_only() {
        let finished = unsigned_factory()
            .error(
                Utc::now(),
                &target(),
                &ProtocolError::new(ErrorStatus::ReplayDetected),
            )
            .unwrap();

        assert!(!finished.response.is_success());
        assert!(finished.response.assertion.is_none());
        assert_eq!(finished.response.status.status_code.value, status_codes::REQUESTER);
        assert_eq!(
            finished.response.status.status_code.sub_status_value(),
            Some(sub_status_codes::REQUEST_DENIED)
        );
        assert_eq!(finished.destination, ACS);
    }

    #[test]
    fn missing_target_or_signer_is_internal() {
        let no_destination = ResponseTarget {
            destination: None,
            ..target()
        };
        let err = unsigned_factory()
            .success(Utc::now(), &no_destination, issued(), None)
            .unwrap_err();
        assert!(!err.is_recoverable());

        let no_request_id = ResponseTarget {
            in_response_to: None,
            ..target()
        };
        assert!(unsigned_factory()
            .error(
                Utc::now(),
                &no_request_id,
                &ProtocolError::new(ErrorStatus::AuthnFailed)
            )
            .is_err());

        let err = ResponseFactory::new(&IdpConfig::new(IDP))
            .success(Utc::now(), &target(), issued(), None)
            .unwrap_err();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn customizer_errors() {
        let factory = unsigned_factory().with_customizer(Arc::new(|_: &mut Response| {
            Err(ProtocolError::new(ErrorStatus::RequestDenied))
        }));
        let err = factory
            .success(Utc::now(), &target(), issued(), None)
            .unwrap_err();
        assert_eq!(err.error_status(), Some(ErrorStatus::RequestDenied));

        let err = factory
            .error(Utc::now(), &target(), &ProtocolError::new(ErrorStatus::AuthnFailed))
            .unwrap_err();
        assert!(!err.is_recoverable());
    }
}
