//! Outbound response encoding.

use std::sync::Arc;

use tracing::error;

use crate::bindings::{HttpPostBinding, HttpRedirectBinding, SamlMessageType};
use crate::builder::FinishedResponse;
use crate::error::IdpError;
use crate::signature::XmlSigner;
use crate::types::SamlBinding;

/// What the transport has to do to deliver a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Serve an auto-submitting HTML form.
    Post {
        /// The form page.
        html: String,
    },
    /// Redirect the user agent.
    Redirect {
        /// The `Location` URL.
        location: String,
    },
}

/// Encodes finished responses for their binding.
#[derive(Debug, Clone, Default)]
pub struct ResponseSender {
    redirect_signer: Option<Arc<XmlSigner>>,
}

impl ResponseSender {
    /// Creates a sender.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signs HTTP-Redirect responses with a detached query signature.
    #[must_use]
    pub fn with_redirect_signer(mut self, signer: Arc<XmlSigner>) -> Self {
        self.redirect_signer = Some(signer);
        self
    }

    /// Encodes `response` for its destination binding.
    pub fn encode(&self, response: &FinishedResponse) -> Result<Delivery, IdpError> {
        let relay_state = response.relay_state.as_deref();
        match response.binding {
            SamlBinding::HttpPost => Ok(Delivery::Post {
                html: HttpPostBinding::encode_response(
                    &response.xml,
                    &response.destination,
                    relay_state,
                ),
            }),
            SamlBinding::HttpRedirect => {
                let location = match &self.redirect_signer {
                    Some(signer) => HttpRedirectBinding::encode_signed(
                        &response.xml,
                        &response.destination,
                        relay_state,
                        SamlMessageType::Response,
                        signer,
                    ),
                    None => HttpRedirectBinding::encode_response(
                        &response.xml,
                        &response.destination,
                        relay_state,
                    ),
                }
                .map_err(|e| {
                    error!(response_id = %response.response.id, error = %e, "redirect encoding failed");
                    IdpError::internal(format!("redirect encoding failed: {e}"))
                })?;
                Ok(Delivery::Redirect { location })
            }
            other => Err(IdpError::internal(format!(
                "responses cannot be delivered over {}",
                other.uri()
            ))),
        }
    }
}
