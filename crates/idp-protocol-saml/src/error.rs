//! SAML error types.
//!
//! Two layers of errors live here:
//!
//! - [`SamlError`] is raised by the low-level building blocks (XML parsing,
//!   bindings, signatures). It says what went wrong, not what to do about it.
//! - [`IdpError`] is the engine's taxonomy. Every component on the request
//!   path raises one of its two kinds, and the handler decides delivery from
//!   the kind alone: an [`UnrecoverableError`] becomes a local fault and no
//!   protocol message, a [`ProtocolError`] becomes a status response sent to
//!   the validated destination.

use thiserror::Error;

use crate::types::{status_codes, sub_status_codes, Status};

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// Result type for engine operations.
pub type IdpResult<T> = Result<T, IdpError>;

/// Low-level SAML processing errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// Invalid SAML request format or content.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// XML parsing error.
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// XML signature validation failed.
    #[error("signature validation failed: {0}")]
    SignatureInvalid(String),

    /// XML signature creation failed.
    #[error("signature creation failed: {0}")]
    SignatureCreation(String),

    /// Missing required element or attribute.
    #[error("missing required element: {0}")]
    MissingElement(String),

    /// Unknown or unsupported binding.
    #[error("unsupported binding: {0}")]
    UnsupportedBinding(String),

    /// Base64 decoding error.
    #[error("base64 decode error: {0}")]
    Base64Decode(String),

    /// Deflate compression or decompression error.
    #[error("deflate error: {0}")]
    Deflate(String),

    /// Encryption error.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SamlError {
    /// Returns true if the error stems from an undecodable transport encoding
    /// rather than from the XML inside it.
    #[must_use]
    pub const fn is_decode_error(&self) -> bool {
        matches!(self, Self::Base64Decode(_) | Self::Deflate(_))
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for SamlError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64Decode(err.to_string())
    }
}

// ============================================================================
// Unrecoverable errors
// ============================================================================

/// Kinds of error after which no protocol response can safely be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnrecoverableKind {
    /// Internal error, for example a signing failure or missing configuration.
    Internal,
    /// The requester is not a registered peer.
    UnknownPeer,
    /// The requested assertion consumer service is not registered.
    InvalidAssertionConsumerService,
    /// The request is unsigned although a signature is required.
    MissingAuthnRequestSignature,
    /// The request signature could not be verified.
    InvalidAuthnRequestSignature,
    /// The request is not a well-formed authentication request.
    InvalidAuthnRequestFormat,
    /// The message could not be decoded from its transport encoding.
    FailedDecode,
    /// Required session data is missing.
    InvalidSession,
}

impl UnrecoverableKind {
    /// Returns the message code used to look up a localized description.
    #[must_use]
    pub const fn message_code(self) -> &'static str {
        match self {
            Self::Internal => "idp.error.internal",
            Self::UnknownPeer => "idp.error.unknown-peer",
            Self::InvalidAssertionConsumerService => "idp.error.acs",
            Self::MissingAuthnRequestSignature => "idp.error.no-signature",
            Self::InvalidAuthnRequestSignature => "idp.error.bad-signature",
            Self::InvalidAuthnRequestFormat => "idp.error.format",
            Self::FailedDecode => "idp.error.decode",
            Self::InvalidSession => "idp.error.session",
        }
    }

    /// Returns a description that is safe to show to the end user.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Internal => "An internal error occurred",
            Self::UnknownPeer => {
                "The sender of the authentication request is not registered at this Identity Provider"
            }
            Self::InvalidAssertionConsumerService => {
                "The indicated Assertion Consumer Service is not registered"
            }
            Self::MissingAuthnRequestSignature => {
                "The authentication request was not signed, which is required"
            }
            Self::InvalidAuthnRequestSignature => {
                "Signature validation of the authentication request failed"
            }
            Self::InvalidAuthnRequestFormat => {
                "The received authentication request has an invalid format"
            }
            Self::FailedDecode => "The received message could not be decoded",
            Self::InvalidSession => "Required session data could not be found",
        }
    }

    /// Returns the HTTP status the transport should answer with.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::Internal => 500,
            Self::UnknownPeer => 403,
            Self::InvalidSession => 409,
            _ => 400,
        }
    }
}

/// An error that is surfaced locally instead of being sent to the peer.
#[derive(Debug, Clone, Error)]
#[error("{}: {message}", kind.message_code())]
pub struct UnrecoverableError {
    kind: UnrecoverableKind,
    message: String,
}

impl UnrecoverableError {
    /// Creates an error of the given kind.
    #[must_use]
    pub fn new(kind: UnrecoverableKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(UnrecoverableKind::Internal, message)
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> UnrecoverableKind {
        self.kind
    }

    /// Returns the diagnostic message. Intended for logs, not for users.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status the transport should answer with.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.kind.http_status()
    }
}

// ============================================================================
// Protocol errors
// ============================================================================

/// Error statuses that are reported to the peer in a status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorStatus {
    /// User authentication failed.
    AuthnFailed,
    /// The user cancelled authentication.
    Cancel,
    /// The request asks for something this IdP does not support.
    RequestUnsupported,
    /// The request is invalid.
    InvalidAuthnRequest,
    /// The requested name ID format cannot be issued.
    InvalidNameIdPolicy,
    /// Passive authentication was requested but is not possible.
    NoPassive,
    /// The assertion cannot be encrypted for the peer.
    EncryptNotPossible,
    /// The request has already been processed.
    ReplayDetected,
    /// The request is too old, or issued in the future.
    MessageTooOld,
    /// None of the requested authentication contexts can be satisfied.
    NoAuthnContext,
    /// A sign message that must be shown was not displayed.
    SignMessageNotDisplayed,
    /// The request was denied by policy.
    RequestDenied,
}

impl ErrorStatus {
    /// Returns the top-level status code.
    #[must_use]
    pub const fn status_code(self) -> &'static str {
        match self {
            Self::AuthnFailed
            | Self::Cancel
            | Self::NoPassive
            | Self::SignMessageNotDisplayed
            | Self::EncryptNotPossible => status_codes::RESPONDER,
            Self::RequestUnsupported
            | Self::InvalidAuthnRequest
            | Self::InvalidNameIdPolicy
            | Self::ReplayDetected
            | Self::MessageTooOld
            | Self::NoAuthnContext
            | Self::RequestDenied => status_codes::REQUESTER,
        }
    }

    /// Returns the second-level status code.
    #[must_use]
    pub const fn sub_status_code(self) -> Option<&'static str> {
        match self {
            Self::AuthnFailed => Some(sub_status_codes::AUTHN_FAILED),
            Self::Cancel => Some(sub_status_codes::CANCEL),
            Self::RequestUnsupported | Self::InvalidAuthnRequest => {
                Some(sub_status_codes::REQUEST_UNSUPPORTED)
            }
            Self::InvalidNameIdPolicy => Some(sub_status_codes::INVALID_NAMEID_POLICY),
            Self::NoPassive => Some(sub_status_codes::NO_PASSIVE),
            Self::EncryptNotPossible
            | Self::ReplayDetected
            | Self::MessageTooOld
            | Self::RequestDenied => Some(sub_status_codes::REQUEST_DENIED),
            Self::NoAuthnContext => Some(sub_status_codes::NO_AUTHN_CONTEXT),
            Self::SignMessageNotDisplayed => Some(sub_status_codes::SIGN_MESSAGE_NOT_DISPLAYED),
        }
    }

    /// Returns the message code used to look up a localized status message.
    #[must_use]
    pub const fn message_code(self) -> &'static str {
        match self {
            Self::AuthnFailed => "idp.error.status.authn-failed",
            Self::Cancel => "idp.error.status.cancel",
            Self::RequestUnsupported => "idp.error.status.request-unsupported",
            Self::InvalidAuthnRequest => "idp.error.status.invalid-request",
            Self::InvalidNameIdPolicy => "idp.error.status.invalid-nameid",
            Self::NoPassive => "idp.error.status.passive",
            Self::EncryptNotPossible => "idp.error.status.encrypt-not-possible",
            Self::ReplayDetected => "idp.error.status.replay",
            Self::MessageTooOld => "idp.error.status.too-old",
            Self::NoAuthnContext => "idp.error.status.no-authn-context",
            Self::SignMessageNotDisplayed => "idp.error.status.sign-message-not-displayed",
            Self::RequestDenied => "idp.error.status.request-denied",
        }
    }

    /// Returns the status message used when no other text is given.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::AuthnFailed => "User authentication failed",
            Self::Cancel => "User cancelled authentication",
            Self::RequestUnsupported => "Request is not supported",
            Self::InvalidAuthnRequest => "Invalid authentication request",
            Self::InvalidNameIdPolicy => "Invalid NameIDPolicy in authentication request",
            Self::NoPassive => "Passive authentication not possible",
            Self::EncryptNotPossible => "Assertion encryption is required but not possible",
            Self::ReplayDetected => "Authentication request message has already been processed",
            Self::MessageTooOld => "Received message is too old and not accepted",
            Self::NoAuthnContext => "None of the requested authentication contexts is supported",
            Self::SignMessageNotDisplayed => "Sign message was not displayed",
            Self::RequestDenied => "Request denied",
        }
    }
}

/// An error that is reported to the peer as a status response.
#[derive(Debug, Clone, Error)]
#[error("{}: {message}", status.message_code())]
pub struct ProtocolError {
    status: ErrorStatus,
    message: String,
}

impl ProtocolError {
    /// Creates an error with the status' default message.
    #[must_use]
    pub fn new(status: ErrorStatus) -> Self {
        Self::with_message(status, status.default_message())
    }

    /// Creates an error with a custom status message.
    #[must_use]
    pub fn with_message(status: ErrorStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Returns the error status.
    #[must_use]
    pub const fn status(&self) -> ErrorStatus {
        self.status
    }

    /// Returns the status message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Converts the error into the status element of a response.
    #[must_use]
    pub fn to_status(&self) -> Status {
        Status::error(
            self.status.status_code(),
            self.status.sub_status_code(),
            self.message.clone(),
        )
    }
}

// ============================================================================
// Engine error
// ============================================================================

/// Error raised by components on the request path.
#[derive(Debug, Clone, Error)]
pub enum IdpError {
    /// No protocol response may be sent.
    #[error(transparent)]
    Unrecoverable(#[from] UnrecoverableError),

    /// A status response is sent to the peer.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl IdpError {
    /// Creates an unrecoverable error.
    #[must_use]
    pub fn unrecoverable(kind: UnrecoverableKind, message: impl Into<String>) -> Self {
        Self::Unrecoverable(UnrecoverableError::new(kind, message))
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Unrecoverable(UnrecoverableError::internal(message))
    }

    /// Creates a protocol error with the status' default message.
    #[must_use]
    pub fn protocol(status: ErrorStatus) -> Self {
        Self::Protocol(ProtocolError::new(status))
    }

    /// Creates a protocol error with a custom message.
    #[must_use]
    pub fn protocol_with(status: ErrorStatus, message: impl Into<String>) -> Self {
        Self::Protocol(ProtocolError::with_message(status, message))
    }

    /// Returns true if a status response can be sent for this error.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// Returns the protocol status, if recoverable.
    #[must_use]
    pub const fn error_status(&self) -> Option<ErrorStatus> {
        match self {
            Self::Protocol(e) => Some(e.status()),
            Self::Unrecoverable(_) => None,
        }
    }

    /// Returns the unrecoverable kind, if unrecoverable.
    #[must_use]
    pub const fn unrecoverable_kind(&self) -> Option<UnrecoverableKind> {
        match self {
            Self::Unrecoverable(e) => Some(e.kind()),
            Self::Protocol(_) => None,
        }
    }
}
