//! Authentication requirements.
//!
//! What the upstream authenticator has to satisfy for a request: the
//! attributes the peer asks for, the acceptable authentication contexts and
//! the extension directives it sent along.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{ErrorStatus, ProtocolError};
use crate::types::{
    AuthnContextComparison, AuthnRequest, PeerMetadata, PrincipalSelectionHint,
    RequestedAttribute, RequestedAttributeSource, SignMessage,
};

/// Requirements derived from a request and IdP policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthenticationRequirements {
    /// Attributes the peer asks for, each flagged required or optional.
    pub requested_attributes: Vec<RequestedAttribute>,
    /// Acceptable authentication context class URIs, in preference order.
    pub authn_contexts: Vec<String>,
    /// Principal selection hints from the request.
    pub principal_selection: Vec<PrincipalSelectionHint>,
    /// Message to display during authentication.
    pub sign_message: Option<SignMessage>,
    /// The peer asked for a fresh authentication.
    pub force_authn: bool,
    /// The peer forbids user interaction.
    pub is_passive: bool,
}

impl AuthenticationRequirements {
    /// Returns true if the attribute was requested.
    #[must_use]
    pub fn is_requested(&self, name: &str) -> bool {
        self.requested(name).is_some()
    }

    /// Returns the request for the named attribute.
    #[must_use]
    pub fn requested(&self, name: &str) -> Option<&RequestedAttribute> {
        self.requested_attributes.iter().find(|a| a.name == name)
    }

    /// Returns the names of all required attributes.
    pub fn required_attributes(&self) -> impl Iterator<Item = &str> {
        self.requested_attributes
            .iter()
            .filter(|a| a.is_required)
            .map(|a| a.name.as_str())
    }

    /// Returns true if a sign message must be shown.
    #[must_use]
    pub fn sign_message_must_show(&self) -> bool {
        self.sign_message.as_ref().is_some_and(|m| m.must_show)
    }

    /// Returns true if the context is acceptable.
    #[must_use]
    pub fn accepts_authn_context(&self, uri: &str) -> bool {
        self.authn_contexts.iter().any(|c| c == uri)
    }
}

/// A source of requested attributes.
pub trait RequestedAttributeProcessor: Send + Sync {
    /// Returns the attributes this source asks for.
    fn requested_attributes(
        &self,
        request: &AuthnRequest,
        peer: &PeerMetadata,
    ) -> Vec<RequestedAttribute>;
}

/// Attributes from the peer's `AttributeConsumingService` metadata.
///
/// The service is picked by the request's index, else the default service,
/// else the one with the lowest index.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataRequestedAttributeProcessor;

impl RequestedAttributeProcessor for MetadataRequestedAttributeProcessor {
    fn requested_attributes(
        &self,
        request: &AuthnRequest,
        peer: &PeerMetadata,
    ) -> Vec<RequestedAttribute> {
        let services = &peer.attribute_consuming_services;
        let service = request
            .attribute_consuming_service_index
            .and_then(|index| services.iter().find(|s| s.index == index))
            .or_else(|| services.iter().find(|s| s.is_default))
            .or_else(|| services.iter().min_by_key(|s| s.index));
        service
            .map(|s| {
                s.requested_attributes
                    .iter()
                    .map(|a| a.clone().with_source(RequestedAttributeSource::Metadata))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Attributes implied by the peer's entity categories.
#[derive(Debug, Clone, Default)]
pub struct EntityCategoryRegistry {
    categories: HashMap<String, Vec<RequestedAttribute>>,
}

impl EntityCategoryRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the attributes released under a category.
    #[must_use]
    pub fn with_category(
        mut self,
        category: impl Into<String>,
        attributes: Vec<RequestedAttribute>,
    ) -> Self {
        self.categories.insert(category.into(), attributes);
        self
    }

    /// Returns the attributes of a category.
    #[must_use]
    pub fn attributes(&self, category: &str) -> Option<&[RequestedAttribute]> {
        self.categories.get(category).map(Vec::as_slice)
    }
}

impl RequestedAttributeProcessor for EntityCategoryRegistry {
    /// Collects the attributes of every registered category the peer
    /// declares. An attribute listed by several categories is required only
    /// if each of them requires it.
    fn requested_attributes(
        &self,
        _request: &AuthnRequest,
        peer: &PeerMetadata,
    ) -> Vec<RequestedAttribute> {
        let mut collected: Vec<RequestedAttribute> = Vec::new();
        for category in &peer.entity_categories {
            let Some(attributes) = self.categories.get(category) else {
                continue;
            };
            for attribute in attributes {
                match collected.iter_mut().find(|a| a.name == attribute.name) {
                    Some(existing) => existing.is_required &= attribute.is_required,
                    None => collected.push(
                        attribute
                            .clone()
                            .with_source(RequestedAttributeSource::EntityCategory),
                    ),
                }
            }
        }
        collected
    }
}

/// Attributes from the request's `RequestedAttributes` extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionRequestedAttributeProcessor;

impl RequestedAttributeProcessor for ExtensionRequestedAttributeProcessor {
    fn requested_attributes(
        &self,
        request: &AuthnRequest,
        _peer: &PeerMetadata,
    ) -> Vec<RequestedAttribute> {
        request
            .extensions
            .requested_attributes
            .iter()
            .map(|a| a.clone().with_source(RequestedAttributeSource::RequestExtension))
            .collect()
    }
}

/// Derives [`AuthenticationRequirements`] for a request.
pub struct RequirementsBuilder {
    processors: Vec<Box<dyn RequestedAttributeProcessor>>,
    supported_authn_contexts: Vec<String>,
}

impl RequirementsBuilder {
    /// Creates a builder with no attribute processors.
    ///
    /// `supported_authn_contexts` is ordered from weakest to strongest.
    #[must_use]
    pub fn new(supported_authn_contexts: Vec<String>) -> Self {
        Self {
            processors: Vec::new(),
            supported_authn_contexts,
        }
    }

    /// Creates a builder with the metadata, entity category and extension
    /// processors, in that order.
    #[must_use]
    pub fn standard(
        supported_authn_contexts: Vec<String>,
        entity_categories: EntityCategoryRegistry,
    ) -> Self {
        Self::new(supported_authn_contexts)
            .with_processor(MetadataRequestedAttributeProcessor)
            .with_processor(entity_categories)
            .with_processor(ExtensionRequestedAttributeProcessor)
    }

    /// Appends a requested attribute processor.
    #[must_use]
    pub fn with_processor(mut self, processor: impl RequestedAttributeProcessor + 'static) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// Builds the requirements.
    ///
    /// Fails with `NoAuthnContext` when the request asks only for contexts
    /// this IdP cannot satisfy.
    pub fn build(
        &self,
        request: &AuthnRequest,
        peer: &PeerMetadata,
    ) -> Result<AuthenticationRequirements, ProtocolError> {
        let mut requested_attributes: Vec<RequestedAttribute> = Vec::new();
        for processor in &self.processors {
            for attribute in processor.requested_attributes(request, peer) {
                match requested_attributes
                    .iter_mut()
                    .find(|a| a.name == attribute.name)
                {
                    // The source that makes an attribute required is the one reported.
                    Some(existing) if attribute.is_required && !existing.is_required => {
                        existing.is_required = true;
                        existing.source = attribute.source;
                    }
                    Some(_) => {}
                    None => requested_attributes.push(attribute),
                }
            }
        }

        let authn_contexts = self.negotiate_authn_contexts(request)?;
        debug!(
            request_id = %request.id,
            attributes = requested_attributes.len(),
            contexts = ?authn_contexts,
            "authentication requirements"
        );

        Ok(AuthenticationRequirements {
            requested_attributes,
            authn_contexts,
            principal_selection: request.extensions.principal_selection.clone(),
            sign_message: request.extensions.sign_message.clone(),
            force_authn: request.force_authn,
            is_passive: request.is_passive,
        })
    }

    fn negotiate_authn_contexts(&self, request: &AuthnRequest) -> Result<Vec<String>, ProtocolError> {
        let Some(requested) = &request.requested_authn_context else {
            return Ok(self.supported_authn_contexts.clone());
        };
        let supported = &self.supported_authn_contexts;
        let positions: Vec<usize> = requested
            .authn_context_class_refs
            .iter()
            .filter_map(|r| supported.iter().position(|s| s == r))
            .collect();

        let accepted: Vec<String> = match (
            requested.comparison,
            positions.iter().min(),
            positions.iter().max(),
        ) {
            (_, None, _) | (_, _, None) => Vec::new(),
            (AuthnContextComparison::Exact, _, _) => requested
                .authn_context_class_refs
                .iter()
                .filter(|r| supported.contains(r))
                .cloned()
                .collect(),
            (AuthnContextComparison::Minimum, Some(&low), _) => supported[low..].to_vec(),
            (AuthnContextComparison::Better, Some(&low), _) => supported[low + 1..].to_vec(),
            (AuthnContextComparison::Maximum, _, Some(&high)) => supported[..=high].to_vec(),
        };

        if accepted.is_empty() {
            return Err(ProtocolError::with_message(
                ErrorStatus::NoAuthnContext,
                format!(
                    "none of the requested authentication contexts can be satisfied: {:?}",
                    requested.authn_context_class_refs
                ),
            ));
        }
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributeConsumingService, Extensions, RequestedAuthnContext};

    const LOA2: &str = "http://id.elegnamnden.se/loa/1.0/loa2";
    const LOA3: &str = "http://id.elegnamnden.se/loa/1.0/loa3";
    const LOA4: &str = "http://id.elegnamnden.se/loa/1.0/loa4";
    const CAT_A: &str = "http://id.elegnamnden.se/ec/1.0/loa3-pnr";
    const CAT_B: &str = "http://id.elegnamnden.se/ec/1.0/loa3-name";

    fn builder() -> RequirementsBuilder {
        RequirementsBuilder::new(vec![LOA2.to_string(), LOA3.to_string(), LOA4.to_string()])
    }

    fn request_with(comparison: AuthnContextComparison, refs: &[&str]) -> AuthnRequest {
        let mut context = RequestedAuthnContext::new().with_comparison(comparison);
        for r in refs {
            context = context.with_class_ref(*r);
        }
        AuthnRequest::new("https://sp.example.com").with_authn_context(context)
    }

    #[test]
    fn contexts_default_to_all_supported() {
        let requirements = builder()
            .build(
                &AuthnRequest::new("https://sp.example.com"),
                &PeerMetadata::new("https://sp.example.com"),
            )
            .unwrap();
        assert_eq!(requirements.authn_contexts, [LOA2, LOA3, LOA4]);
    }

    #[test]
    fn context_comparisons() {
        let peer = PeerMetadata::new("https://sp.example.com");
        let negotiate = |comparison, refs: &[&str]| {
            builder()
                .build(&request_with(comparison, refs), &peer)
                .map(|r| r.authn_contexts)
        };

        assert_eq!(
            negotiate(AuthnContextComparison::Exact, &["urn:unknown", LOA3]).unwrap(),
            [LOA3]
        );
        assert_eq!(
            negotiate(AuthnContextComparison::Minimum, &[LOA3]).unwrap(),
            [LOA3, LOA4]
        );
        assert_eq!(negotiate(AuthnContextComparison::Better, &[LOA3]).unwrap(), [LOA4]);
        assert_eq!(
            negotiate(AuthnContextComparison::Maximum, &[LOA3]).unwrap(),
            [LOA2, LOA3]
        );

        let err = negotiate(AuthnContextComparison::Exact, &["urn:unknown"]).unwrap_err();
        assert_eq!(err.status(), ErrorStatus::NoAuthnContext);
        let err = negotiate(AuthnContextComparison::Better, &[LOA4]).unwrap_err();
        assert_eq!(err.status(), ErrorStatus::NoAuthnContext);
    }

    #[test]
    fn attribute_consuming_service_selection() {
        let peer = PeerMetadata::new("https://sp.example.com")
            .with_attribute_consuming_service(AttributeConsumingService {
                index: 3,
                is_default: false,
                requested_attributes: vec![RequestedAttribute::new("three")],
            })
            .with_attribute_consuming_service(AttributeConsumingService {
                index: 1,
                is_default: false,
                requested_attributes: vec![RequestedAttribute::new("one")],
            });
        let processor = MetadataRequestedAttributeProcessor;

        let by_index = AuthnRequest::new("sp").with_attribute_consuming_service_index(3);
        assert_eq!(processor.requested_attributes(&by_index, &peer)[0].name, "three");

        let lowest = AuthnRequest::new("sp");
        assert_eq!(processor.requested_attributes(&lowest, &peer)[0].name, "one");

        let peer = peer.with_attribute_consuming_service(AttributeConsumingService {
            index: 7,
            is_default: true,
            requested_attributes: vec![RequestedAttribute::new("seven")],
        });
        assert_eq!(processor.requested_attributes(&lowest, &peer)[0].name, "seven");
    }

    #[test]
    fn entity_category_requirement_needs_every_category() {
        let registry = EntityCategoryRegistry::new()
            .with_category(
                CAT_A,
                vec![
                    RequestedAttribute::required("personalIdentityNumber"),
                    RequestedAttribute::required("displayName"),
                ],
            )
            .with_category(
                CAT_B,
                vec![
                    RequestedAttribute::new("personalIdentityNumber"),
                    RequestedAttribute::required("displayName"),
                ],
            );
        let peer = PeerMetadata::new("https://sp.example.com")
            .with_entity_category(CAT_A)
            .with_entity_category(CAT_B)
            .with_entity_category("http://unregistered.example.com/ec");

        let attributes = registry.requested_attributes(&AuthnRequest::new("sp"), &peer);
        assert_eq!(attributes.len(), 2);
        let pnr = attributes
            .iter()
            .find(|a| a.name == "personalIdentityNumber")
            .unwrap();
        assert!(!pnr.is_required);
        assert_eq!(pnr.reason(), "requested by entity category");
        let display_name = attributes.iter().find(|a| a.name == "displayName").unwrap();
        assert!(display_name.is_required);
        assert_eq!(display_name.reason(), "required by entity category");
    }

    #[test]
    fn processors_are_merged_and_extensions_carried() {
        let peer = PeerMetadata::new("https://sp.example.com").with_attribute_consuming_service(
            AttributeConsumingService {
                index: 0,
                is_default: true,
                requested_attributes: vec![RequestedAttribute::new("mail")],
            },
        );
        let request = AuthnRequest::new("https://sp.example.com")
            .force_authn(true)
            .with_extensions(Extensions {
                requested_attributes: vec![
                    RequestedAttribute::required("mail"),
                    RequestedAttribute::new("sn"),
                ],
                principal_selection: vec![PrincipalSelectionHint::new("uid", "alice")],
                sign_message: Some(SignMessage::new("Sign this", true)),
            });

        let requirements = RequirementsBuilder::standard(
            vec![LOA3.to_string()],
            EntityCategoryRegistry::new(),
        )
        .build(&request, &peer)
        .unwrap();

        assert_eq!(requirements.requested_attributes.len(), 2);
        assert!(requirements.is_requested("sn"));
        assert_eq!(
            requirements.requested("mail").unwrap().reason(),
            "required by request"
        );
        assert_eq!(
            requirements.requested("sn").unwrap().source,
            RequestedAttributeSource::RequestExtension
        );
        assert_eq!(requirements.required_attributes().collect::<Vec<_>>(), ["mail"]);
        assert!(requirements.sign_message_must_show());
        assert!(requirements.force_authn);
        assert_eq!(requirements.principal_selection.len(), 1);
        assert!(requirements.accepts_authn_context(LOA3));
    }
}
