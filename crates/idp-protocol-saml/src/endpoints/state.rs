//! Shared endpoint state.

use std::sync::Arc;

use crate::authn::SessionStore;
use crate::handler::AuthnRequestHandler;
use crate::metadata::IdpMetadataInfo;
use crate::sender::ResponseSender;

/// Name of the cookie carrying the SSO session key.
pub const SESSION_COOKIE: &str = "idp_session";

/// State shared by the SAML endpoints.
#[derive(Clone)]
pub struct SamlState {
    /// Processes authentication requests.
    pub handler: Arc<AuthnRequestHandler>,
    /// Encodes responses for delivery.
    pub sender: Arc<ResponseSender>,
    /// Identities kept for SSO.
    pub sessions: Arc<dyn SessionStore>,
    /// The rendered IdP metadata.
    pub metadata: Arc<str>,
}

impl SamlState {
    /// Creates the state. Responses are encoded by a default [`ResponseSender`].
    #[must_use]
    pub fn new(
        handler: Arc<AuthnRequestHandler>,
        metadata: &IdpMetadataInfo,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            handler,
            sender: Arc::new(ResponseSender::new()),
            sessions,
            metadata: Arc::from(metadata.to_xml()),
        }
    }

    /// Replaces the response sender.
    #[must_use]
    pub fn with_sender(mut self, sender: ResponseSender) -> Self {
        self.sender = Arc::new(sender);
        self
    }
}
