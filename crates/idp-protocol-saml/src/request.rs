//! Inbound authentication requests.
//!
//! A [`RawAuthnRequest`] is what the transport hands to the engine: the
//! binding parameters as received, the caller's network address and any
//! identity the session store holds for the caller. Decoding turns it into
//! a [`ReceivedAuthnRequest`], which is immutable from then on.

use std::sync::Arc;

use crate::authn::VerifiedIdentity;
use crate::bindings::{DecodedMessage, HttpPostBinding, HttpRedirectBinding, SamlMessageType};
use crate::error::{IdpError, SamlError, UnrecoverableKind};
use crate::types::{AuthnRequest, SamlBinding};
use crate::xml::parse_authn_request;

/// Binding parameters of an inbound message.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    /// HTTP-POST form fields.
    Post {
        /// The `SAMLRequest` field.
        saml_request: String,
        /// The `RelayState` field.
        relay_state: Option<String>,
    },
    /// HTTP-Redirect query string, still URL-encoded.
    Redirect {
        /// The raw query string, without the leading `?`.
        query: String,
    },
}

impl InboundMessage {
    /// Returns the binding the message arrived on.
    #[must_use]
    pub const fn binding(&self) -> SamlBinding {
        match self {
            Self::Post { .. } => SamlBinding::HttpPost,
            Self::Redirect { .. } => SamlBinding::HttpRedirect,
        }
    }
}

/// An authentication request as handed over by the transport.
#[derive(Debug, Clone)]
pub struct RawAuthnRequest {
    /// The binding parameters.
    pub message: InboundMessage,
    /// Network address of the user agent.
    pub client_address: Option<String>,
    /// Identity from an earlier authentication, if the session store has one.
    pub sso_session: Option<Arc<VerifiedIdentity>>,
}

impl RawAuthnRequest {
    /// Creates a request received on the HTTP-POST binding.
    #[must_use]
    pub fn post(saml_request: impl Into<String>, relay_state: Option<String>) -> Self {
        Self {
            message: InboundMessage::Post {
                saml_request: saml_request.into(),
                relay_state,
            },
            client_address: None,
            sso_session: None,
        }
    }

    /// Creates a request received on the HTTP-Redirect binding.
    #[must_use]
    pub fn redirect(query: impl Into<String>) -> Self {
        Self {
            message: InboundMessage::Redirect {
                query: query.into(),
            },
            client_address: None,
            sso_session: None,
        }
    }

    /// Sets the client address.
    #[must_use]
    pub fn with_client_address(mut self, address: impl Into<String>) -> Self {
        self.client_address = Some(address.into());
        self
    }

    /// Attaches an identity from the session store.
    #[must_use]
    pub fn with_sso_session(mut self, identity: Arc<VerifiedIdentity>) -> Self {
        self.sso_session = Some(identity);
        self
    }
}

/// How an inbound request was signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestSignature {
    /// An enveloped XML signature inside the request.
    Enveloped,
    /// A detached HTTP-Redirect signature.
    Detached {
        /// The signed query octets, as received.
        signed_octets: String,
        /// Base64 encoded signature value.
        signature: String,
        /// Signature algorithm URI.
        sig_alg: String,
    },
}

/// A decoded and parsed authentication request.
#[derive(Debug, Clone)]
pub struct ReceivedAuthnRequest {
    /// The parsed request.
    pub request: AuthnRequest,
    /// The request document as received.
    pub xml: String,
    /// The request signature, if any.
    pub signature: Option<RequestSignature>,
    /// The relay state to return with the response.
    pub relay_state: Option<String>,
    /// The binding the request arrived on.
    pub binding: SamlBinding,
}

impl ReceivedAuthnRequest {
    /// Decodes and parses the binding message.
    ///
    /// Decoding failures are reported as `FailedDecode`, malformed or
    /// unexpected documents as `InvalidAuthnRequestFormat`. Neither can be
    /// answered with a protocol message.
    pub fn decode(message: &InboundMessage) -> Result<Self, IdpError> {
        let decoded = match message {
            InboundMessage::Post {
                saml_request,
                relay_state,
            } => HttpPostBinding::decode(Some(saml_request), None, relay_state.as_deref()),
            InboundMessage::Redirect { query } => HttpRedirectBinding::decode_query(query),
        }
        .map_err(|e| decode_error(&e))?;

        Self::from_decoded(decoded, message.binding())
    }

    /// Parses an already decoded message.
    pub fn from_decoded(decoded: DecodedMessage, binding: SamlBinding) -> Result<Self, IdpError> {
        if decoded.message_type != SamlMessageType::Request {
            return Err(IdpError::unrecoverable(
                UnrecoverableKind::InvalidAuthnRequestFormat,
                "expected a SAMLRequest",
            ));
        }

        let request = parse_authn_request(&decoded.xml).map_err(|e| {
            IdpError::unrecoverable(UnrecoverableKind::InvalidAuthnRequestFormat, e.to_string())
        })?;

        let signature = match decoded.detached_signature {
            Some(detached) => Some(RequestSignature::Detached {
                signed_octets: detached.signed_octets,
                signature: detached.signature,
                sig_alg: detached.sig_alg,
            }),
            None if request.has_signature => Some(RequestSignature::Enveloped),
            None => None,
        };

        Ok(Self {
            request,
            xml: decoded.xml,
            signature,
            relay_state: decoded.relay_state,
            binding,
        })
    }

    /// Returns the request ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.request.id
    }

    /// Returns the entity ID of the requesting peer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.request.issuer
    }

    /// Returns true if the request carries a signature of either kind.
    #[must_use]
    pub const fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

fn decode_error(err: &SamlError) -> IdpError {
    let kind = if err.is_decode_error() {
        UnrecoverableKind::FailedDecode
    } else {
        UnrecoverableKind::InvalidAuthnRequestFormat
    };
    IdpError::unrecoverable(kind, err.to_string())
}
