//! Authenticated identities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IdpError;
use crate::types::Attribute;

/// The result of a user authentication.
///
/// An identity is immutable once built. Facts that only hold for the request
/// that produced it live in a [`RequestOverlay`] instead, so the identity can
/// be cached and reused for SSO without carrying them along.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    attributes: Vec<Attribute>,
    primary_attribute: String,
    authn_context: String,
    authn_instant: DateTime<Utc>,
    authenticating_authority: Option<String>,
    client_address: Option<String>,
    sign_message_displayed: bool,
}

impl VerifiedIdentity {
    /// Starts building an identity keyed by `primary_attribute`.
    #[must_use]
    pub fn builder(primary_attribute: impl Into<String>) -> VerifiedIdentityBuilder {
        VerifiedIdentityBuilder::new(primary_attribute)
    }

    /// Returns all attributes of the subject.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Looks up an attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Returns the first value of the named attribute.
    #[must_use]
    pub fn attribute_value(&self, name: &str) -> Option<&str> {
        self.attribute(name)?.values.first().map(String::as_str)
    }

    /// Returns the name of the attribute that identifies the subject.
    #[must_use]
    pub fn primary_attribute(&self) -> &str {
        &self.primary_attribute
    }

    /// Returns the value that identifies the subject.
    ///
    /// Always present, the builder refuses identities without it.
    #[must_use]
    pub fn primary_value(&self) -> &str {
        self.attribute_value(&self.primary_attribute)
            .unwrap_or_default()
    }

    /// Returns the authentication context class URI.
    #[must_use]
    pub fn authn_context(&self) -> &str {
        &self.authn_context
    }

    /// Returns when the user authenticated.
    #[must_use]
    pub const fn authn_instant(&self) -> DateTime<Utc> {
        self.authn_instant
    }

    /// Returns the authority that authenticated the user, if not this IdP.
    #[must_use]
    pub fn authenticating_authority(&self) -> Option<&str> {
        self.authenticating_authority.as_deref()
    }

    /// Returns the network address the user authenticated from.
    #[must_use]
    pub fn client_address(&self) -> Option<&str> {
        self.client_address.as_deref()
    }

    /// Returns true if a sign message was shown during authentication.
    #[must_use]
    pub const fn sign_message_displayed(&self) -> bool {
        self.sign_message_displayed
    }

    /// Returns a copy without the per-request fields, suitable for the
    /// session store.
    #[must_use]
    pub fn without_transient_fields(&self) -> Self {
        Self {
            client_address: None,
            sign_message_displayed: false,
            ..self.clone()
        }
    }
}

/// Builder for [`VerifiedIdentity`].
#[derive(Debug, Clone)]
pub struct VerifiedIdentityBuilder {
    attributes: Vec<Attribute>,
    primary_attribute: String,
    authn_context: Option<String>,
    authn_instant: Option<DateTime<Utc>>,
    authenticating_authority: Option<String>,
    client_address: Option<String>,
    sign_message_displayed: bool,
}

impl VerifiedIdentityBuilder {
    fn new(primary_attribute: impl Into<String>) -> Self {
        Self {
            attributes: Vec::new(),
            primary_attribute: primary_attribute.into(),
            authn_context: None,
            authn_instant: None,
            authenticating_authority: None,
            client_address: None,
            sign_message_displayed: false,
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Adds several attributes.
    #[must_use]
    pub fn attributes(mut self, attributes: impl IntoIterator<Item = Attribute>) -> Self {
        self.attributes.extend(attributes);
        self
    }

    /// Sets the authentication context class URI.
    #[must_use]
    pub fn authn_context(mut self, uri: impl Into<String>) -> Self {
        self.authn_context = Some(uri.into());
        self
    }

    /// Sets the authentication instant. Defaults to now.
    #[must_use]
    pub const fn authn_instant(mut self, instant: DateTime<Utc>) -> Self {
        self.authn_instant = Some(instant);
        self
    }

    /// Sets the authenticating authority.
    #[must_use]
    pub fn authenticating_authority(mut self, authority: impl Into<String>) -> Self {
        self.authenticating_authority = Some(authority.into());
        self
    }

    /// Sets the client address.
    #[must_use]
    pub fn client_address(mut self, address: impl Into<String>) -> Self {
        self.client_address = Some(address.into());
        self
    }

    /// Records whether a sign message was shown.
    #[must_use]
    pub const fn sign_message_displayed(mut self, displayed: bool) -> Self {
        self.sign_message_displayed = displayed;
        self
    }

    /// Builds the identity.
    ///
    /// Fails with an internal error if there are no attributes, if the
    /// primary attribute has no value or if no context was given.
    pub fn build(self) -> Result<VerifiedIdentity, IdpError> {
        if self.attributes.is_empty() {
            return Err(IdpError::internal("identity has no attributes"));
        }
        let has_primary = self
            .attributes
            .iter()
            .find(|a| a.name == self.primary_attribute)
            .is_some_and(|a| a.values.iter().any(|v| !v.is_empty()));
        if !has_primary {
            return Err(IdpError::internal(format!(
                "primary attribute '{}' has no value",
                self.primary_attribute
            )));
        }
        let authn_context = self
            .authn_context
            .ok_or_else(|| IdpError::internal("identity has no authentication context"))?;

        Ok(VerifiedIdentity {
            attributes: self.attributes,
            primary_attribute: self.primary_attribute,
            authn_context,
            authn_instant: self.authn_instant.unwrap_or_else(Utc::now),
            authenticating_authority: self.authenticating_authority,
            client_address: self.client_address,
            sign_message_displayed: self.sign_message_displayed,
        })
    }
}

/// Request-scoped facts layered over an identity.
///
/// A fresh overlay is created for every request and dropped once the
/// response has been produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOverlay {
    /// Address the current request came from.
    pub client_address: Option<String>,
    /// Whether a sign message was shown for this request.
    pub sign_message_displayed: bool,
    /// Whether the identity was reused from an earlier authentication.
    pub sso: bool,
}

impl RequestOverlay {
    /// Overlay for an identity that was just authenticated.
    #[must_use]
    pub fn fresh(identity: &VerifiedIdentity) -> Self {
        Self {
            client_address: identity.client_address.clone(),
            sign_message_displayed: identity.sign_message_displayed,
            sso: false,
        }
    }

    /// Overlay for an identity reused from the session store.
    #[must_use]
    pub fn reused(client_address: Option<String>) -> Self {
        Self {
            client_address,
            sign_message_displayed: false,
            sso: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> VerifiedIdentity {
        VerifiedIdentity::builder("uid")
            .attribute(Attribute::single("uid", "alice"))
            .attribute(Attribute::single("mail", "alice@example.com"))
            .authn_context("urn:oasis:names:tc:SAML:2.0:ac:classes:Password")
            .client_address("192.0.2.7")
            .sign_message_displayed(true)
            .build()
            .unwrap()
    }

    #[test]
    fn builds_valid_identity() {
        let identity = identity();
        assert_eq!(identity.primary_value(), "alice");
        assert_eq!(identity.attribute_value("mail"), Some("alice@example.com"));
        assert_eq!(identity.client_address(), Some("192.0.2.7"));
    }

    #[test]
    fn rejects_incomplete_identities() {
        assert!(VerifiedIdentity::builder("uid")
            .authn_context("ctx")
            .build()
            .is_err());
        assert!(VerifiedIdentity::builder("uid")
            .attribute(Attribute::single("mail", "a@example.com"))
            .authn_context("ctx")
            .build()
            .is_err());
        assert!(VerifiedIdentity::builder("uid")
            .attribute(Attribute::single("uid", ""))
            .authn_context("ctx")
            .build()
            .is_err());
        assert!(VerifiedIdentity::builder("uid")
            .attribute(Attribute::single("uid", "alice"))
            .build()
            .is_err());
    }

    #[test]
    fn session_copy_drops_request_facts() {
        let cached = identity().without_transient_fields();
        assert_eq!(cached.client_address(), None);
        assert!(!cached.sign_message_displayed());
        assert_eq!(cached.primary_value(), "alice");
    }

    #[test]
    fn overlays() {
        let identity = identity();
        let fresh = RequestOverlay::fresh(&identity);
        assert!(!fresh.sso);
        assert!(fresh.sign_message_displayed);

        let reused = RequestOverlay::reused(Some("198.51.100.1".to_string()));
        assert!(reused.sso);
        assert!(!reused.sign_message_displayed);
    }
}
