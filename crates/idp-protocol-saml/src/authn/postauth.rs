//! Checks run after user authentication and before an assertion is issued.

use tracing::warn;

use crate::error::{ErrorStatus, IdpError};

use super::{AuthenticationRequirements, RequestOverlay, VerifiedIdentity};

/// A check on the outcome of a user authentication.
pub trait PostAuthenticationProcessor: Send + Sync {
    /// Returns an error if the authentication does not satisfy the request.
    fn process(
        &self,
        identity: &VerifiedIdentity,
        overlay: &RequestOverlay,
        requirements: &AuthenticationRequirements,
    ) -> Result<(), IdpError>;
}

/// Fails when a must-show sign message was not displayed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignMessageDisplayedProcessor;

impl PostAuthenticationProcessor for SignMessageDisplayedProcessor {
    fn process(
        &self,
        _identity: &VerifiedIdentity,
        overlay: &RequestOverlay,
        requirements: &AuthenticationRequirements,
    ) -> Result<(), IdpError> {
        if requirements.sign_message_must_show() && !overlay.sign_message_displayed {
            return Err(IdpError::protocol(ErrorStatus::SignMessageNotDisplayed));
        }
        Ok(())
    }
}

/// Fails when the authenticated user contradicts a principal selection hint.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrincipalSelectionProcessor;

impl PostAuthenticationProcessor for PrincipalSelectionProcessor {
    fn process(
        &self,
        identity: &VerifiedIdentity,
        _overlay: &RequestOverlay,
        requirements: &AuthenticationRequirements,
    ) -> Result<(), IdpError> {
        for hint in &requirements.principal_selection {
            if let Some(attribute) = identity.attribute(&hint.name) {
                if !attribute.values.contains(&hint.value) {
                    warn!(attribute = %hint.name, "authenticated user does not match principal selection");
                    return Err(IdpError::protocol_with(
                        ErrorStatus::AuthnFailed,
                        format!("authenticated user does not match requested '{}'", hint.name),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Fails when the identity's context is not one the request accepts.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthnContextProcessor;

impl PostAuthenticationProcessor for AuthnContextProcessor {
    fn process(
        &self,
        identity: &VerifiedIdentity,
        _overlay: &RequestOverlay,
        requirements: &AuthenticationRequirements,
    ) -> Result<(), IdpError> {
        if requirements.accepts_authn_context(identity.authn_context()) {
            Ok(())
        } else {
            Err(IdpError::protocol_with(
                ErrorStatus::NoAuthnContext,
                format!(
                    "authentication context '{}' was not requested",
                    identity.authn_context()
                ),
            ))
        }
    }
}

/// The processors every request runs through, in order.
#[must_use]
pub fn standard_processors() -> Vec<Box<dyn PostAuthenticationProcessor>> {
    vec![
        Box::new(SignMessageDisplayedProcessor),
        Box::new(PrincipalSelectionProcessor),
        Box::new(AuthnContextProcessor),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Attribute, PrincipalSelectionHint, SignMessage};

    const LOA3: &str = "http://id.elegnamnden.se/loa/1.0/loa3";

    fn identity() -> VerifiedIdentity {
        VerifiedIdentity::builder("uid")
            .attribute(Attribute::single("uid", "alice"))
            .authn_context(LOA3)
            .build()
            .unwrap()
    }

    fn requirements() -> AuthenticationRequirements {
        AuthenticationRequirements {
            authn_contexts: vec![LOA3.to_string()],
            ..AuthenticationRequirements::default()
        }
    }

    fn run(overlay: &RequestOverlay, requirements: &AuthenticationRequirements) -> Result<(), IdpError> {
        let identity = identity();
        standard_processors()
            .iter()
            .try_for_each(|p| p.process(&identity, overlay, requirements))
    }

    #[test]
    fn plain_request_passes() {
        assert!(run(&RequestOverlay::default(), &requirements()).is_ok());
    }

    #[test]
    fn sign_message_must_be_displayed() {
        let mut requirements = requirements();
        requirements.sign_message = Some(SignMessage::new("Approve", true));

        let err = run(&RequestOverlay::default(), &requirements).unwrap_err();
        assert_eq!(err.error_status(), Some(ErrorStatus::SignMessageNotDisplayed));

        let overlay = RequestOverlay {
            sign_message_displayed: true,
            ..RequestOverlay::default()
        };
        assert!(run(&overlay, &requirements).is_ok());
    }

    #[test]
    fn principal_selection_mismatch_fails() {
        let mut requirements = requirements();
        requirements.principal_selection = vec![PrincipalSelectionHint::new("uid", "bob")];
        let err = run(&RequestOverlay::default(), &requirements).unwrap_err();
        assert_eq!(err.error_status(), Some(ErrorStatus::AuthnFailed));

        requirements.principal_selection = vec![PrincipalSelectionHint::new("unknown", "x")];
        assert!(run(&RequestOverlay::default(), &requirements).is_ok());
    }

    #[test]
    fn unrequested_context_fails() {
        let requirements = AuthenticationRequirements {
            authn_contexts: vec!["urn:other".to_string()],
            ..AuthenticationRequirements::default()
        };
        let err = run(&RequestOverlay::default(), &requirements).unwrap_err();
        assert_eq!(err.error_status(), Some(ErrorStatus::NoAuthnContext));
    }
}
