//! Attribute voters.

use std::collections::HashSet;
use std::sync::Arc;

use super::{AttributeVoter, ReleaseContext, Vote};
use crate::authn::EntityCategoryRegistry;
use crate::types::Attribute;

/// Includes every candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncludeAllVoter;

impl AttributeVoter for IncludeAllVoter {
    fn vote(&self, _attribute: &Attribute, _ctx: &ReleaseContext<'_>) -> Vote {
        Vote::Include
    }
}

/// Includes candidates the peer requested; abstains on the rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestedAttributeVoter;

impl AttributeVoter for RequestedAttributeVoter {
    fn vote(&self, attribute: &Attribute, ctx: &ReleaseContext<'_>) -> Vote {
        if ctx.requirements.is_requested(&attribute.name) {
            Vote::Include
        } else {
            Vote::Abstain
        }
    }
}

/// Includes candidates listed by an entity category the peer declares.
#[derive(Debug, Clone)]
pub struct EntityCategoryVoter {
    registry: Arc<EntityCategoryRegistry>,
}

impl EntityCategoryVoter {
    /// Creates a voter backed by the registry.
    #[must_use]
    pub fn new(registry: Arc<EntityCategoryRegistry>) -> Self {
        Self { registry }
    }
}

impl AttributeVoter for EntityCategoryVoter {
    fn vote(&self, attribute: &Attribute, ctx: &ReleaseContext<'_>) -> Vote {
        let listed = ctx
            .peer
            .entity_categories
            .iter()
            .filter_map(|c| self.registry.attributes(c))
            .flatten()
            .any(|a| a.name == attribute.name);
        if listed {
            Vote::Include
        } else {
            Vote::Abstain
        }
    }
}

/// Excludes the named attributes; abstains on the rest.
#[derive(Debug, Clone, Default)]
pub struct DenyListVoter {
    denied: HashSet<String>,
}

impl DenyListVoter {
    /// Creates a voter excluding `names`.
    #[must_use]
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            denied: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl AttributeVoter for DenyListVoter {
    fn vote(&self, attribute: &Attribute, _ctx: &ReleaseContext<'_>) -> Vote {
        if self.denied.contains(&attribute.name) {
            Vote::Exclude
        } else {
            Vote::Abstain
        }
    }
}
