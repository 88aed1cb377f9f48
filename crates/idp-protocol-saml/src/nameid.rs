//! Subject name identifiers.
//!
//! One [`NameIdGenerator`] exists per supported format. The
//! [`NameIdGeneratorFactory`] negotiates the format for a request and
//! exposes the supported formats for metadata publication.
//!
//! Persistent identifiers are derived, not stored: an HMAC-SHA256 over
//! `spNameQualifier!nameQualifier!userId` under an IdP secret. The same
//! user always gets the same identifier at the same SP, and different
//! identifiers at different SPs.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use idp_core::IdpConfig;
use tracing::debug;

use crate::authn::VerifiedIdentity;
use crate::error::{ErrorStatus, IdpError, ProtocolError};
use crate::types::{NameId, NameIdFormat, NameIdPolicy, PeerMetadata};

/// Produces name identifiers of one format.
pub trait NameIdGenerator: Send + Sync {
    /// The format this generator produces.
    fn format(&self) -> NameIdFormat;

    /// Generates an identifier for `identity` at the SP named by
    /// `sp_name_qualifier`.
    fn generate(
        &self,
        identity: &VerifiedIdentity,
        sp_name_qualifier: &str,
    ) -> Result<NameId, IdpError>;
}

/// Deterministic pairwise identifiers.
pub struct PersistentNameIdGenerator {
    secret: Vec<u8>,
    name_qualifier: String,
}

impl PersistentNameIdGenerator {
    /// Creates a generator keyed by `secret`, qualified by the IdP entity ID.
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>, name_qualifier: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            name_qualifier: name_qualifier.into(),
        }
    }
}

impl std::fmt::Debug for PersistentNameIdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentNameIdGenerator")
            .field("name_qualifier", &self.name_qualifier)
            .finish_non_exhaustive()
    }
}

impl NameIdGenerator for PersistentNameIdGenerator {
    fn format(&self) -> NameIdFormat {
        NameIdFormat::Persistent
    }

    fn generate(
        &self,
        identity: &VerifiedIdentity,
        sp_name_qualifier: &str,
    ) -> Result<NameId, IdpError> {
        let input = format!(
            "{sp_name_qualifier}!{}!{}",
            self.name_qualifier,
            identity.primary_value()
        );
        let value = STANDARD.encode(idp_crypto::hmac_sha256(&self.secret, input.as_bytes()));
        Ok(NameId::persistent(value)
            .with_name_qualifier(&self.name_qualifier)
            .with_sp_name_qualifier(sp_name_qualifier))
    }
}

/// Random single-use identifiers.
#[derive(Debug, Clone)]
pub struct TransientNameIdGenerator {
    name_qualifier: String,
}

impl TransientNameIdGenerator {
    /// Creates a generator qualified by the IdP entity ID.
    #[must_use]
    pub fn new(name_qualifier: impl Into<String>) -> Self {
        Self {
            name_qualifier: name_qualifier.into(),
        }
    }
}

impl NameIdGenerator for TransientNameIdGenerator {
    fn format(&self) -> NameIdFormat {
        NameIdFormat::Transient
    }

    fn generate(
        &self,
        _identity: &VerifiedIdentity,
        sp_name_qualifier: &str,
    ) -> Result<NameId, IdpError> {
        Ok(NameId::transient(format!("_{}", idp_crypto::random_base64url(24)))
            .with_name_qualifier(&self.name_qualifier)
            .with_sp_name_qualifier(sp_name_qualifier))
    }
}

/// Identifiers taken from the subject's e-mail attribute.
#[derive(Debug, Clone)]
pub struct EmailNameIdGenerator {
    attribute: String,
}

impl EmailNameIdGenerator {
    /// Creates a generator reading the named attribute.
    #[must_use]
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
        }
    }
}

impl NameIdGenerator for EmailNameIdGenerator {
    fn format(&self) -> NameIdFormat {
        NameIdFormat::Email
    }

    fn generate(
        &self,
        identity: &VerifiedIdentity,
        _sp_name_qualifier: &str,
    ) -> Result<NameId, IdpError> {
        identity
            .attribute_value(&self.attribute)
            .filter(|v| !v.is_empty())
            .map(NameId::email)
            .ok_or_else(|| {
                IdpError::protocol_with(
                    ErrorStatus::InvalidNameIdPolicy,
                    format!("subject has no '{}' attribute for an e-mail NameID", self.attribute),
                )
            })
    }
}

/// Resolves the generator for a request.
pub struct NameIdGeneratorFactory {
    generators: Vec<Arc<dyn NameIdGenerator>>,
    default_format: NameIdFormat,
}

impl NameIdGeneratorFactory {
    /// Creates a factory without generators.
    #[must_use]
    pub fn new(default_format: NameIdFormat) -> Self {
        Self {
            generators: Vec::new(),
            default_format,
        }
    }

    /// Creates the persistent, transient and e-mail generators from config.
    ///
    /// `secret` keys persistent identifiers and must stay stable across
    /// restarts.
    pub fn from_config(config: &IdpConfig, secret: impl Into<Vec<u8>>) -> Result<Self, IdpError> {
        let default_format = NameIdFormat::from_uri(&config.name_id.default_format).ok_or_else(|| {
            IdpError::internal(format!(
                "unknown default NameID format '{}'",
                config.name_id.default_format
            ))
        })?;
        Ok(Self::new(default_format)
            .with_generator(PersistentNameIdGenerator::new(secret, &config.entity_id))
            .with_generator(TransientNameIdGenerator::new(&config.entity_id))
            .with_generator(EmailNameIdGenerator::new(&config.name_id.email_attribute)))
    }

    /// Registers a generator, replacing any for the same format.
    #[must_use]
    pub fn with_generator(mut self, generator: impl NameIdGenerator + 'static) -> Self {
        let format = generator.format();
        self.generators.retain(|g| g.format() != format);
        self.generators.push(Arc::new(generator));
        self
    }

    /// Returns the formats this IdP can issue.
    #[must_use]
    pub fn supported_formats(&self) -> Vec<NameIdFormat> {
        self.generators.iter().map(|g| g.format()).collect()
    }

    fn generator(&self, format: NameIdFormat) -> Option<&Arc<dyn NameIdGenerator>> {
        self.generators.iter().find(|g| g.format() == format)
    }

    /// Picks the format for a request.
    ///
    /// The request's policy wins. Without one (or with `unspecified`), the
    /// first supported format the peer declares is used, then the default.
    pub fn negotiate(
        &self,
        policy: Option<&NameIdPolicy>,
        peer: &PeerMetadata,
    ) -> Result<NameIdFormat, ProtocolError> {
        if let Some(uri) = policy.and_then(NameIdPolicy::requested_format) {
            return NameIdFormat::from_uri(uri)
                .filter(|f| self.generator(*f).is_some())
                .ok_or_else(|| {
                    ProtocolError::with_message(
                        ErrorStatus::InvalidNameIdPolicy,
                        format!("NameID format '{uri}' is not supported"),
                    )
                });
        }

        let format = peer
            .name_id_formats
            .iter()
            .copied()
            .find(|f| self.generator(*f).is_some())
            .unwrap_or(self.default_format);
        Ok(format)
    }

    /// Generates the name identifier for a request.
    pub fn generate(
        &self,
        policy: Option<&NameIdPolicy>,
        identity: &VerifiedIdentity,
        peer: &PeerMetadata,
    ) -> Result<NameId, IdpError> {
        let format = self.negotiate(policy, peer)?;
        let generator = self.generator(format).ok_or_else(|| {
            IdpError::protocol_with(
                ErrorStatus::InvalidNameIdPolicy,
                format!("no generator for NameID format '{}'", format.uri()),
            )
        })?;
        let sp_name_qualifier = policy
            .and_then(|p| p.sp_name_qualifier.as_deref())
            .unwrap_or(&peer.entity_id);
        debug!(format = format.uri(), peer = %peer.entity_id, "generating NameID");
        generator.generate(identity, sp_name_qualifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Attribute;

    const IDP: &str = "https://idp.example.com";

    fn identity(uid: &str) -> VerifiedIdentity {
        VerifiedIdentity::builder("uid")
            .attribute(Attribute::single("uid", uid))
            .attribute(Attribute::single("mail", format!("{uid}@example.com")))
            .authn_context("urn:ctx")
            .build()
            .unwrap()
    }

    fn factory() -> NameIdGeneratorFactory {
        NameIdGeneratorFactory::from_config(&IdpConfig::new(IDP), b"secret".to_vec()).unwrap()
    }

    fn peer(entity_id: &str) -> PeerMetadata {
        PeerMetadata::new(entity_id)
    }

    #[test]
    fn persistent_is_stable_per_pair() {
        let factory = factory();
        let policy = NameIdPolicy::with_format(NameIdFormat::Persistent);
        let sp1 = peer("https://sp1.example.com");
        let sp2 = peer("https://sp2.example.com");

        let a = factory.generate(Some(&policy), &identity("alice"), &sp1).unwrap();
        let b = factory.generate(Some(&policy), &identity("alice"), &sp1).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.parsed_format(), NameIdFormat::Persistent);
        assert_eq!(a.name_qualifier.as_deref(), Some(IDP));
        assert_eq!(a.sp_name_qualifier.as_deref(), Some("https://sp1.example.com"));

        let other_sp = factory.generate(Some(&policy), &identity("alice"), &sp2).unwrap();
        assert_ne!(a.value, other_sp.value);
        let other_user = factory.generate(Some(&policy), &identity("bob"), &sp1).unwrap();
        assert_ne!(a.value, other_user.value);
    }

    #[test]
    fn persistent_depends_on_secret() {
        let other = NameIdGeneratorFactory::from_config(&IdpConfig::new(IDP), b"other".to_vec())
            .unwrap();
        let sp = peer("https://sp.example.com");
        let a = factory().generate(None, &identity("alice"), &sp).unwrap();
        let b = other.generate(None, &identity("alice"), &sp).unwrap();
        assert_ne!(a.value, b.value);
    }

    #[test]
    fn transient_differs_every_call() {
        let factory = factory();
        let policy = NameIdPolicy::with_format(NameIdFormat::Transient);
        let sp = peer("https://sp.example.com");
        let a = factory.generate(Some(&policy), &identity("alice"), &sp).unwrap();
        let b = factory.generate(Some(&policy), &identity("alice"), &sp).unwrap();
        assert_ne!(a.value, b.value);
        assert_eq!(a.parsed_format(), NameIdFormat::Transient);
    }

    #[test]
    fn email_reads_configured_attribute() {
        let policy = NameIdPolicy::with_format(NameIdFormat::Email);
        let name_id = factory()
            .generate(Some(&policy), &identity("alice"), &peer("https://sp.example.com"))
            .unwrap();
        assert_eq!(name_id.value, "alice@example.com");

        let no_mail = VerifiedIdentity::builder("uid")
            .attribute(Attribute::single("uid", "carol"))
            .authn_context("urn:ctx")
            .build()
            .unwrap();
        let err = factory()
            .generate(Some(&policy), &no_mail, &peer("https://sp.example.com"))
            .unwrap_err();
        assert_eq!(err.error_status(), Some(ErrorStatus::InvalidNameIdPolicy));
    }

    #[test]
    fn negotiation_order() {
        let factory = factory();
        let plain = peer("https://sp.example.com");
        assert_eq!(factory.negotiate(None, &plain).unwrap(), NameIdFormat::Persistent);

        let transient_peer = peer("https://sp.example.com")
            .with_name_id_format(NameIdFormat::Unspecified)
            .with_name_id_format(NameIdFormat::Transient);
        assert_eq!(
            factory.negotiate(None, &transient_peer).unwrap(),
            NameIdFormat::Transient
        );

        let unspecified = NameIdPolicy::with_format(NameIdFormat::Unspecified);
        assert_eq!(
            factory.negotiate(Some(&unspecified), &transient_peer).unwrap(),
            NameIdFormat::Transient
        );

        let email = NameIdPolicy::with_format(NameIdFormat::Email);
        assert_eq!(
            factory.negotiate(Some(&email), &transient_peer).unwrap(),
            NameIdFormat::Email
        );
    }

    #[test]
    fn unsupported_format_is_rejected() {
        let policy = NameIdPolicy {
            format: Some("urn:oasis:names:tc:SAML:2.0:nameid-format:kerberos".to_string()),
            ..NameIdPolicy::default()
        };
        let err = factory()
            .negotiate(Some(&policy), &peer("https://sp.example.com"))
            .unwrap_err();
        assert_eq!(err.status(), ErrorStatus::InvalidNameIdPolicy);

        let transient_only = NameIdGeneratorFactory::new(NameIdFormat::Transient)
            .with_generator(TransientNameIdGenerator::new(IDP));
        assert_eq!(transient_only.supported_formats(), [NameIdFormat::Transient]);
        let persistent = NameIdPolicy::with_format(NameIdFormat::Persistent);
        assert!(transient_only
            .negotiate(Some(&persistent), &peer("https://sp.example.com"))
            .is_err());
    }

    #[test]
    fn sp_name_qualifier_from_policy() {
        let mut policy = NameIdPolicy::with_format(NameIdFormat::Persistent);
        policy.sp_name_qualifier = Some("https://affiliation.example.com".to_string());
        let name_id = factory()
            .generate(Some(&policy), &identity("alice"), &peer("https://sp.example.com"))
            .unwrap();
        assert_eq!(
            name_id.sp_name_qualifier.as_deref(),
            Some("https://affiliation.example.com")
        );
    }
}
