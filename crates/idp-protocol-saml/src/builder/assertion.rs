//! Assertion building.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use idp_core::IdpConfig;
use tracing::{debug, error};

use crate::attributes::ReleasedAttributeSet;
use crate::authn::{RequestOverlay, VerifiedIdentity};
use crate::error::{IdpError, ProtocolError};
use crate::signature::XmlSigner;
use crate::types::{
    Assertion, AuthnRequest, AuthnStatement, Conditions, IssuedAssertion, NameId, PeerMetadata,
    Subject, SubjectConfirmation, SubjectConfirmationData,
};
use crate::validation::RequestContext;
use crate::xml::assertion_xml;

use super::offset;

/// Hook run on every assertion after it is built and before it is signed.
///
/// Returning an error aborts the response with that status.
pub type AssertionCustomizer =
    Arc<dyn Fn(&mut Assertion, &AssertionInput<'_>) -> Result<(), ProtocolError> + Send + Sync>;

/// Everything an assertion is built from.
#[derive(Debug, Clone, Copy)]
pub struct AssertionInput<'a> {
    /// The request being answered.
    pub request: &'a AuthnRequest,
    /// The receiving peer.
    pub peer: &'a PeerMetadata,
    /// Facts established while validating the request.
    pub context: &'a RequestContext,
    /// The authenticated subject.
    pub identity: &'a VerifiedIdentity,
    /// Request-scoped facts about the subject.
    pub overlay: &'a RequestOverlay,
    /// The subject's name identifier at this peer.
    pub name_id: &'a NameId,
    /// The attributes approved for release.
    pub attributes: &'a ReleasedAttributeSet,
}

/// Builds assertions on behalf of the IdP.
#[derive(Clone)]
pub struct AssertionBuilder {
    issuer: String,
    signer: Option<Arc<XmlSigner>>,
    not_before: Duration,
    not_on_or_after: Duration,
    customizer: Option<AssertionCustomizer>,
}

impl std::fmt::Debug for AssertionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssertionBuilder")
            .field("issuer", &self.issuer)
            .field("signer", &self.signer.as_ref().map(|s| s.algorithm()))
            .field("not_before", &self.not_before)
            .field("not_on_or_after", &self.not_on_or_after)
            .field("customizer", &self.customizer.is_some())
            .finish()
    }
}

impl AssertionBuilder {
    /// Creates a builder for the IdP's entity ID using the configured
    /// validity window.
    #[must_use]
    pub fn new(config: &IdpConfig) -> Self {
        Self {
            issuer: config.entity_id.clone(),
            signer: None,
            not_before: config.assertion.not_before(),
            not_on_or_after: config.assertion.not_on_or_after(),
            customizer: None,
        }
    }

    /// Sets the signer used for peers that want signed assertions.
    #[must_use]
    pub fn with_signer(mut self, signer: Arc<XmlSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Sets the customization hook.
    #[must_use]
    pub fn with_customizer(mut self, customizer: AssertionCustomizer) -> Self {
        self.customizer = Some(customizer);
        self
    }

    /// Builds an assertion issued now.
    pub fn build(&self, input: &AssertionInput<'_>) -> Result<IssuedAssertion, IdpError> {
        self.build_at(Utc::now(), input)
    }

    /// Builds an assertion issued at `now`.
    ///
    /// Every timestamp in the assertion derives from `now`. The subject
    /// confirmation expires together with the conditions.
    ///
    /// # Errors
    ///
    /// An internal error if no endpoint was resolved for the request, or the
    /// peer wants signed assertions and signing is not possible. The
    /// customizer's error otherwise.
    pub fn build_at(
        &self,
        now: DateTime<Utc>,
        input: &AssertionInput<'_>,
    ) -> Result<IssuedAssertion, IdpError> {
        let acs = input
            .context
            .resolved_acs
            .as_ref()
            .ok_or_else(|| IdpError::internal("no assertion consumer service resolved"))?;

        let id = idp_crypto::generate_message_id();
        let not_before = now
            .checked_sub_signed(offset(self.not_before, "assertion not-before offset")?)
            .ok_or_else(|| IdpError::internal("assertion not-before offset out of range"))?;
        let not_on_or_after = now
            .checked_add_signed(offset(self.not_on_or_after, "assertion lifetime")?)
            .ok_or_else(|| IdpError::internal("assertion lifetime out of range"))?;

        let confirmation_data =
            SubjectConfirmationData::for_request(&input.request.id, &acs.location, not_on_or_after)
                .with_address(input.overlay.client_address.clone());
        let subject = Subject::new(input.name_id.clone())
            .with_confirmation(SubjectConfirmation::bearer().with_data(confirmation_data));

        let conditions = Conditions::new(not_before, not_on_or_after).with_audience(&input.peer.entity_id);

        let mut authn_statement =
            AuthnStatement::new(input.identity.authn_instant(), input.identity.authn_context())
                .with_session_index(&id)
                .with_authenticating_authorities(
                    input
                        .identity
                        .authenticating_authority()
                        .map(str::to_string)
                        .into_iter()
                        .collect(),
                );
        if let Some(address) = &input.overlay.client_address {
            authn_statement = authn_statement.with_locality(address);
        }

        let mut assertion = Assertion::new_at(&id, &self.issuer, now)
            .with_subject(subject)
            .with_conditions(conditions)
            .with_authn_statement(authn_statement);
        if let Some(statement) = input.attributes.to_statement() {
            assertion = assertion.with_attribute_statement(statement);
        }

        if let Some(customizer) = &self.customizer {
            customizer(&mut assertion, input)?;
        }

        let xml = assertion_xml(&assertion);
        if !input.peer.want_assertions_signed {
            debug!(assertion_id = %assertion.id, peer = %input.peer.entity_id, "assertion issued unsigned");
            return Ok(IssuedAssertion {
                assertion,
                xml,
                signed: false,
            });
        }

        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| IdpError::internal("no signing key configured for assertions"))?;
        let xml = signer.sign(&xml, &assertion.id).map_err(|e| {
            error!(assertion_id = %assertion.id, error = %e, "assertion signing failed");
            IdpError::internal(format!("assertion signing failed: {e}"))
        })?;
        debug!(assertion_id = %assertion.id, peer = %input.peer.entity_id, "assertion issued signed");
        Ok(IssuedAssertion {
            assertion,
            xml,
            signed: true,
        })
    }
}
