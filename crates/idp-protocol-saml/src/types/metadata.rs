//! Peer metadata.
//!
//! What the IdP knows about a registered service provider: where responses
//! may be delivered, which keys it signs and encrypts with, and its policy
//! flags. Metadata is read-only while a request is processed.

use idp_crypto::KeyMaterial;
use serde::{Deserialize, Serialize};

use super::{NameIdFormat, SamlBinding};

/// Metadata of a service provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerMetadata {
    /// Entity ID of the service provider.
    pub entity_id: String,

    /// Declared assertion consumer service endpoints.
    #[serde(default)]
    pub assertion_consumer_services: Vec<AcsEndpoint>,

    /// Keys the peer signs its requests with.
    #[serde(default)]
    pub signing_keys: Vec<KeyMaterial>,

    /// Keys assertions may be encrypted for.
    #[serde(default)]
    pub encryption_keys: Vec<KeyMaterial>,

    /// The peer signs all of its authentication requests.
    #[serde(default)]
    pub authn_requests_signed: bool,

    /// The peer wants assertions signed.
    #[serde(default)]
    pub want_assertions_signed: bool,

    /// Name ID formats the peer accepts, in order of preference.
    #[serde(default)]
    pub name_id_formats: Vec<NameIdFormat>,

    /// Entity categories the peer declares.
    #[serde(default)]
    pub entity_categories: Vec<String>,

    /// Declared attribute consuming services.
    #[serde(default)]
    pub attribute_consuming_services: Vec<AttributeConsumingService>,
}

impl PeerMetadata {
    /// Creates metadata with no endpoints and no keys.
    #[must_use]
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            assertion_consumer_services: Vec::new(),
            signing_keys: Vec::new(),
            encryption_keys: Vec::new(),
            authn_requests_signed: false,
            want_assertions_signed: false,
            name_id_formats: Vec::new(),
            entity_categories: Vec::new(),
            attribute_consuming_services: Vec::new(),
        }
    }

    /// Adds an assertion consumer service endpoint.
    #[must_use]
    pub fn with_acs(mut self, endpoint: AcsEndpoint) -> Self {
        self.assertion_consumer_services.push(endpoint);
        self
    }

    /// Adds a signing key.
    #[must_use]
    pub fn with_signing_key(mut self, key: KeyMaterial) -> Self {
        self.signing_keys.push(key);
        self
    }

    /// Adds an encryption key.
    #[must_use]
    pub fn with_encryption_key(mut self, key: KeyMaterial) -> Self {
        self.encryption_keys.push(key);
        self
    }

    /// Sets whether the peer signs its requests.
    #[must_use]
    pub const fn authn_requests_signed(mut self, signed: bool) -> Self {
        self.authn_requests_signed = signed;
        self
    }

    /// Sets whether the peer wants signed assertions.
    #[must_use]
    pub const fn want_assertions_signed(mut self, signed: bool) -> Self {
        self.want_assertions_signed = signed;
        self
    }

    /// Adds an accepted name ID format.
    #[must_use]
    pub fn with_name_id_format(mut self, format: NameIdFormat) -> Self {
        self.name_id_formats.push(format);
        self
    }

    /// Adds a declared entity category.
    #[must_use]
    pub fn with_entity_category(mut self, category: impl Into<String>) -> Self {
        self.entity_categories.push(category.into());
        self
    }

    /// Adds an attribute consuming service.
    #[must_use]
    pub fn with_attribute_consuming_service(mut self, service: AttributeConsumingService) -> Self {
        self.attribute_consuming_services.push(service);
        self
    }
}

/// An assertion consumer service endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcsEndpoint {
    /// Binding responses are delivered with.
    pub binding: SamlBinding,
    /// Endpoint URL.
    pub location: String,
    /// Endpoint index.
    pub index: u32,
    /// Whether this is the default endpoint.
    #[serde(default)]
    pub is_default: bool,
}

impl AcsEndpoint {
    /// Creates an endpoint.
    #[must_use]
    pub fn new(binding: SamlBinding, location: impl Into<String>, index: u32) -> Self {
        Self {
            binding,
            location: location.into(),
            index,
            is_default: false,
        }
    }

    /// Marks this endpoint as the default.
    #[must_use]
    pub const fn default_endpoint(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// Attributes an SP declares it wants, grouped under an index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeConsumingService {
    /// Service index.
    pub index: u32,
    /// Whether this is the default service.
    #[serde(default)]
    pub is_default: bool,
    /// The requested attributes.
    #[serde(default)]
    pub requested_attributes: Vec<RequestedAttribute>,
}

/// An attribute asked for by a service provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedAttribute {
    /// Attribute name.
    pub name: String,
    /// Human readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    /// Attribute name format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_format: Option<String>,
    /// Whether the SP requires the attribute.
    #[serde(default)]
    pub is_required: bool,
    /// Where the request for this attribute came from.
    #[serde(skip)]
    pub source: RequestedAttributeSource,
}

/// Where a requested attribute came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RequestedAttributeSource {
    /// Not recorded.
    #[default]
    Unspecified,
    /// The peer's `AttributeConsumingService` metadata.
    Metadata,
    /// An entity category the peer declares.
    EntityCategory,
    /// The request's `RequestedAttributes` extension.
    RequestExtension,
}

impl RequestedAttribute {
    /// Creates an optional requested attribute.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            friendly_name: None,
            name_format: None,
            is_required: false,
            source: RequestedAttributeSource::Unspecified,
        }
    }

    /// Creates a required requested attribute.
    #[must_use]
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            is_required: true,
            ..Self::new(name)
        }
    }

    /// Records where the request came from.
    #[must_use]
    pub const fn with_source(mut self, source: RequestedAttributeSource) -> Self {
        self.source = source;
        self
    }

    /// Explains why the attribute is released, for example
    /// `"required by entity category"`.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match (self.source, self.is_required) {
            (RequestedAttributeSource::Metadata, true) => "required by metadata",
            (RequestedAttributeSource::Metadata, false) => "requested by metadata",
            (RequestedAttributeSource::EntityCategory, true) => "required by entity category",
            (RequestedAttributeSource::EntityCategory, false) => "requested by entity category",
            (RequestedAttributeSource::RequestExtension, true) => "required by request",
            (RequestedAttributeSource::RequestExtension, false) => "requested by request",
            (RequestedAttributeSource::Unspecified, true) => "required",
            (RequestedAttributeSource::Unspecified, false) => "requested",
        }
    }

    /// Sets the friendly name.
    #[must_use]
    pub fn with_friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_builder() {
        let metadata = PeerMetadata::new("https://sp.example.com")
            .with_acs(AcsEndpoint::new(SamlBinding::HttpPost, "https://sp.example.com/acs", 0).default_endpoint())
            .want_assertions_signed(true)
            .with_name_id_format(NameIdFormat::Transient)
            .with_entity_category("http://id.elegnamnden.se/ec/1.0/loa3-pnr");

        assert_eq!(metadata.assertion_consumer_services.len(), 1);
        assert!(metadata.assertion_consumer_services[0].is_default);
        assert!(metadata.want_assertions_signed);
        assert!(!metadata.authn_requests_signed);
        assert_eq!(metadata.name_id_formats, vec![NameIdFormat::Transient]);
    }

    #[test]
    fn metadata_from_json() {
        let metadata: PeerMetadata = serde_json::from_str(
            r#"{
                "entity_id": "https://sp.example.com",
                "assertion_consumer_services": [{
                    "binding": "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST",
                    "location": "https://sp.example.com/acs",
                    "index": 1
                }],
                "signing_keys": [{ "type": "public_key", "der": "MAMBAf8=" }],
                "name_id_formats": ["urn:oasis:names:tc:SAML:2.0:nameid-format:persistent"],
                "attribute_consuming_services": [{
                    "index": 0,
                    "requested_attributes": [{ "name": "mail", "is_required": true }]
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(metadata.assertion_consumer_services[0].binding, SamlBinding::HttpPost);
        assert!(!metadata.assertion_consumer_services[0].is_default);
        assert_eq!(metadata.signing_keys.len(), 1);
        assert!(metadata.encryption_keys.is_empty());
        assert_eq!(metadata.name_id_formats, vec![NameIdFormat::Persistent]);
        assert!(metadata.attribute_consuming_services[0].requested_attributes[0].is_required);
    }

    #[test]
    fn requested_attribute_constructors() {
        let attr = RequestedAttribute::required("urn:oid:0.9.2342.19200300.100.1.3")
            .with_friendly_name("mail");
        assert!(attr.is_required);
        assert_eq!(attr.friendly_name.as_deref(), Some("mail"));
        assert!(!RequestedAttribute::new("sn").is_required);
    }
}
