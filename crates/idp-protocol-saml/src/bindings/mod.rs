//! SAML bindings implementation.
//!
//! This module implements the SAML 2.0 bindings for message transport:
//!
//! - **HTTP-POST Binding** - Messages are base64-encoded and sent in HTML forms
//! - **HTTP-Redirect Binding** - Messages are deflated, base64-encoded, and URL-encoded
//!
//! Inbound messages are size-limited before and after decoding.
//!
//! # Usage
//!
//! ```rust,ignore
//! use idp_protocol_saml::bindings::{HttpPostBinding, HttpRedirectBinding};
//!
//! // Deliver a response with an auto-submitting form
//! let html = HttpPostBinding::encode_response(&response_xml, "https://sp.example.com/acs", Some("relay_state"));
//!
//! // Decode a request received on the redirect endpoint
//! let message = HttpRedirectBinding::decode_query(raw_query)?;
//! ```

mod post;
mod redirect;

pub use post::*;
pub use redirect::*;

/// Maximum size of an encoded HTTP-Redirect message parameter.
pub const MAX_ENCODED_SIZE_REDIRECT: usize = 128 * 1024;

/// Maximum size of an encoded HTTP-POST message parameter.
pub const MAX_ENCODED_SIZE_POST: usize = 512 * 1024;

/// Maximum size of an inflated HTTP-Redirect message.
pub const MAX_DECOMPRESSED_SIZE: u64 = 64 * 1024;

/// SAML message type for binding operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamlMessageType {
    /// AuthnRequest message.
    Request,
    /// Response message.
    Response,
}

impl SamlMessageType {
    /// Returns the form parameter name for this message type.
    #[must_use]
    pub const fn form_param(&self) -> &'static str {
        match self {
            Self::Request => "SAMLRequest",
            Self::Response => "SAMLResponse",
        }
    }
}

/// A detached HTTP-Redirect signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedSignature {
    /// The signed query octets, exactly as received.
    pub signed_octets: String,
    /// The base64 encoded signature.
    pub signature: String,
    /// The signature algorithm URI.
    pub sig_alg: String,
}

/// Decoded SAML binding message.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    /// The decoded XML message.
    pub xml: String,
    /// The message type (request or response).
    pub message_type: SamlMessageType,
    /// The RelayState if present.
    pub relay_state: Option<String>,
    /// The detached signature (redirect binding only).
    pub detached_signature: Option<DetachedSignature>,
}

/// Escapes text for inclusion in HTML attribute values.
pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
