//! Attribute producers.

use super::{AttributeProducer, ReleaseContext};
use crate::types::{Attribute, RequestedAttribute};

/// Proposes the identity's attributes that the peer requested.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestedAttributeProducer;

impl AttributeProducer for RequestedAttributeProducer {
    fn name(&self) -> &'static str {
        "requested"
    }

    fn produce(&self, ctx: &ReleaseContext<'_>) -> Vec<Attribute> {
        ctx.identity
            .attributes()
            .iter()
            .filter(|a| ctx.requirements.is_requested(&a.name))
            .cloned()
            .collect()
    }

    fn provenance(&self, attribute: &Attribute, ctx: &ReleaseContext<'_>) -> &'static str {
        ctx.requirements
            .requested(&attribute.name)
            .map_or(self.name(), RequestedAttribute::reason)
    }
}

/// Proposes every attribute of the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReleaseAllAttributeProducer;

impl AttributeProducer for ReleaseAllAttributeProducer {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn produce(&self, ctx: &ReleaseContext<'_>) -> Vec<Attribute> {
        ctx.identity.attributes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{AttributeReleaseEngine, IncludeAllVoter};
    use crate::authn::{
        AuthenticationRequirements, EntityCategoryRegistry, RequirementsBuilder, VerifiedIdentity,
    };
    use crate::types::{AttributeConsumingService, AuthnRequest, PeerMetadata};

    #[test]
    fn requested_producer_filters_by_name() {
        let identity = VerifiedIdentity::builder("uid")
            .attribute(Attribute::single("uid", "alice"))
            .attribute(Attribute::single("mail", "alice@example.com"))
            .authn_context("urn:ctx")
            .build()
            .unwrap();
        let requirements = AuthenticationRequirements {
            requested_attributes: vec![
                RequestedAttribute::required("mail"),
                RequestedAttribute::new("displayName"),
            ],
            ..AuthenticationRequirements::default()
        };
        let peer = PeerMetadata::new("https://sp.example.com");
        let ctx = ReleaseContext {
            identity: &identity,
            requirements: &requirements,
            peer: &peer,
        };

        let requested = RequestedAttributeProducer.produce(&ctx);
        assert_eq!(requested.len(), 1);
        assert_eq!(requested[0].name, "mail");

        assert_eq!(ReleaseAllAttributeProducer.produce(&ctx).len(), 2);
    }

    #[test]
    fn provenance_names_the_requesting_source() {
        const CATEGORY: &str = "http://id.elegnamnden.se/ec/1.0/loa3-pnr";
        let identity = VerifiedIdentity::builder("uid")
            .attribute(Attribute::single("personalIdentityNumber", "197705232382"))
            .attribute(Attribute::single("mail", "alice@example.com"))
            .authn_context("urn:ctx")
            .build()
            .unwrap();
        let peer = PeerMetadata::new("https://sp.example.com")
            .with_entity_category(CATEGORY)
            .with_attribute_consuming_service(AttributeConsumingService {
                index: 0,
                is_default: true,
                requested_attributes: vec![RequestedAttribute::new("mail")],
            });
        let registry = EntityCategoryRegistry::new().with_category(
            CATEGORY,
            vec![RequestedAttribute::required("personalIdentityNumber")],
        );
        let requirements = RequirementsBuilder::standard(vec!["urn:ctx".to_string()], registry)
            .build(&AuthnRequest::new("https://sp.example.com"), &peer)
            .unwrap();
        let ctx = ReleaseContext {
            identity: &identity,
            requirements: &requirements,
            peer: &peer,
        };

        let released = AttributeReleaseEngine::default().release(&ctx);
        let provenance = |name: &str| {
            released
                .attributes()
                .iter()
                .find(|a| a.attribute.name == name)
                .map(|a| a.provenance)
        };
        assert_eq!(
            provenance("personalIdentityNumber"),
            Some("required by entity category")
        );
        assert_eq!(provenance("mail"), Some("requested by metadata"));
    }
}
