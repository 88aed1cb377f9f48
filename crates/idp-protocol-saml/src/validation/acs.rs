//! Assertion consumer service resolution.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{IdpError, UnrecoverableKind};
use crate::request::ReceivedAuthnRequest;
use crate::types::{AcsEndpoint, AuthnRequest, PeerMetadata, SamlBinding};

use super::{RequestContext, RequestValidator, ValidationOutcome};

/// Resolves the endpoint a response to `request` is delivered to.
///
/// - An explicit `AssertionConsumerServiceURL` must match a declared
///   endpoint exactly, and its binding if the request names one.
/// - An `AssertionConsumerServiceIndex` selects the endpoint by index.
/// - Otherwise the default endpoint is used: the one flagged as default,
///   else the one with the lowest index.
///
/// Only endpoints with a binding that can carry a response are considered.
pub fn resolve_acs(request: &AuthnRequest, peer: &PeerMetadata) -> Result<AcsEndpoint, IdpError> {
    let candidates = || {
        peer.assertion_consumer_services
            .iter()
            .filter(|e| e.binding.supports_response())
    };

    let requested_binding = match request.protocol_binding.as_deref() {
        Some(uri) => Some(SamlBinding::from_uri(uri).ok_or_else(|| {
            IdpError::unrecoverable(
                UnrecoverableKind::InvalidAssertionConsumerService,
                format!("unknown ProtocolBinding '{uri}'"),
            )
        })?),
        None => None,
    };

    let found = if let Some(url) = &request.assertion_consumer_service_url {
        let mut matching = candidates().filter(|e| &e.location == url);
        match requested_binding {
            Some(binding) => matching.find(|e| e.binding == binding),
            None => matching.next(),
        }
    } else if let Some(index) = request.assertion_consumer_service_index {
        candidates().find(|e| e.index == index)
    } else {
        candidates()
            .find(|e| e.is_default)
            .or_else(|| candidates().min_by_key(|e| e.index))
    };

    found.cloned().ok_or_else(|| {
        let requested = request
            .assertion_consumer_service_url
            .clone()
            .or_else(|| {
                request
                    .assertion_consumer_service_index
                    .map(|i| format!("index {i}"))
            })
            .unwrap_or_else(|| "default endpoint".to_string());
        IdpError::unrecoverable(
            UnrecoverableKind::InvalidAssertionConsumerService,
            format!("{requested} is not a registered endpoint of '{}'", peer.entity_id),
        )
    })
}

/// Binds the resolved assertion consumer service into the request context.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcsValidator;

#[async_trait]
impl RequestValidator for AcsValidator {
    fn name(&self) -> &'static str {
        "acs"
    }

    async fn validate(
        &self,
        request: &ReceivedAuthnRequest,
        peer: &PeerMetadata,
        ctx: &mut RequestContext,
    ) -> ValidationOutcome {
        let endpoint = resolve_acs(&request.request, peer).inspect_err(|e| {
            warn!(request_id = %request.id(), peer = %peer.entity_id, error = %e, "no valid ACS");
        })?;
        debug!(
            request_id = %request.id(),
            location = %endpoint.location,
            binding = endpoint.binding.uri(),
            "resolved ACS"
        );
        ctx.resolved_acs = Some(endpoint);
        Ok(())
    }
}
