//! Attribute release.
//!
//! Producers propose candidate attributes from the verified identity and
//! voters decide which of them reach the assertion. For each candidate:
//!
//! 1. any [`Vote::Include`] releases it;
//! 2. otherwise any [`Vote::Exclude`] withholds it;
//! 3. otherwise it is withheld.
//!
//! Because an include always wins, a deny list only restricts what no other
//! voter explicitly includes. Pair [`DenyListVoter`] with voters that
//! abstain on the attributes it names.

mod producers;
mod voters;

pub use producers::{ReleaseAllAttributeProducer, RequestedAttributeProducer};
pub use voters::{DenyListVoter, EntityCategoryVoter, IncludeAllVoter, RequestedAttributeVoter};

use tracing::debug;

use crate::authn::{AuthenticationRequirements, VerifiedIdentity};
use crate::types::{Attribute, AttributeStatement, PeerMetadata};

/// Inputs shared by producers and voters for one request.
#[derive(Debug, Clone, Copy)]
pub struct ReleaseContext<'a> {
    /// The authenticated subject.
    pub identity: &'a VerifiedIdentity,
    /// What the peer asked for.
    pub requirements: &'a AuthenticationRequirements,
    /// The receiving peer.
    pub peer: &'a PeerMetadata,
}

/// Proposes candidate attributes.
pub trait AttributeProducer: Send + Sync {
    /// Name of the producer.
    fn name(&self) -> &'static str;

    /// Returns the candidates for this request.
    fn produce(&self, ctx: &ReleaseContext<'_>) -> Vec<Attribute>;

    /// Explains why `attribute` was proposed. Defaults to the producer name.
    fn provenance(&self, _attribute: &Attribute, _ctx: &ReleaseContext<'_>) -> &'static str {
        self.name()
    }
}

/// A voter's opinion on one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    /// Release the attribute.
    Include,
    /// Withhold the attribute.
    Exclude,
    /// No opinion.
    Abstain,
}

/// Decides on candidate attributes.
pub trait AttributeVoter: Send + Sync {
    /// Votes on one candidate.
    fn vote(&self, attribute: &Attribute, ctx: &ReleaseContext<'_>) -> Vote;
}

/// An attribute approved for release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasedAttribute {
    /// The attribute as it appears in the assertion.
    pub attribute: Attribute,
    /// Why it was proposed, such as `"required by metadata"`.
    pub provenance: &'static str,
}

/// The attributes released for one request, in production order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleasedAttributeSet {
    attributes: Vec<ReleasedAttribute>,
}

impl ReleasedAttributeSet {
    /// Returns the released attributes.
    #[must_use]
    pub fn attributes(&self) -> &[ReleasedAttribute] {
        &self.attributes
    }

    /// Returns true if the named attribute was released.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.attribute.name == name)
    }

    /// Returns the released attribute names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.attribute.name.as_str())
    }

    /// Returns the number of released attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns true if nothing was released.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Builds the attribute statement, or `None` when nothing was released.
    #[must_use]
    pub fn to_statement(&self) -> Option<AttributeStatement> {
        if self.is_empty() {
            return None;
        }
        Some(
            self.attributes
                .iter()
                .fold(AttributeStatement::new(), |statement, released| {
                    statement.with_attribute(released.attribute.clone())
                }),
        )
    }
}

/// Ordered producers and voters.
pub struct AttributeReleaseEngine {
    producers: Vec<Box<dyn AttributeProducer>>,
    voters: Vec<Box<dyn AttributeVoter>>,
}

impl Default for AttributeReleaseEngine {
    /// Releases what the peer requested.
    fn default() -> Self {
        Self::new()
            .with_producer(RequestedAttributeProducer)
            .with_voter(IncludeAllVoter)
    }
}

impl AttributeReleaseEngine {
    /// Creates an engine without producers or voters. It releases nothing.
    #[must_use]
    pub fn new() -> Self {
        Self {
            producers: Vec::new(),
            voters: Vec::new(),
        }
    }

    /// Appends a producer.
    #[must_use]
    pub fn with_producer(mut self, producer: impl AttributeProducer + 'static) -> Self {
        self.producers.push(Box::new(producer));
        self
    }

    /// Appends a voter.
    #[must_use]
    pub fn with_voter(mut self, voter: impl AttributeVoter + 'static) -> Self {
        self.voters.push(Box::new(voter));
        self
    }

    /// Returns the candidates of all producers. A name produced more than
    /// once keeps its first occurrence.
    fn candidates(&self, ctx: &ReleaseContext<'_>) -> Vec<ReleasedAttribute> {
        let mut candidates: Vec<ReleasedAttribute> = Vec::new();
        for producer in &self.producers {
            for attribute in producer.produce(ctx) {
                if candidates.iter().any(|c| c.attribute.name == attribute.name) {
                    continue;
                }
                let provenance = producer.provenance(&attribute, ctx);
                candidates.push(ReleasedAttribute {
                    attribute,
                    provenance,
                });
            }
        }
        candidates
    }

    fn decide(&self, attribute: &Attribute, ctx: &ReleaseContext<'_>) -> Vote {
        let mut excluded = false;
        for voter in &self.voters {
            match voter.vote(attribute, ctx) {
                Vote::Include => return Vote::Include,
                Vote::Exclude => excluded = true,
                Vote::Abstain => {}
            }
        }
        if excluded {
            Vote::Exclude
        } else {
            Vote::Abstain
        }
    }

    /// Runs the producers and voters for a request.
    #[must_use]
    pub fn release(&self, ctx: &ReleaseContext<'_>) -> ReleasedAttributeSet {
        let attributes: Vec<_> = self
            .candidates(ctx)
            .into_iter()
            .filter(|candidate| {
                let vote = self.decide(&candidate.attribute, ctx);
                if vote != Vote::Include {
                    debug!(
                        attribute = %candidate.attribute.name,
                        peer = %ctx.peer.entity_id,
                        ?vote,
                        "attribute withheld"
                    );
                }
                vote == Vote::Include
            })
            .collect();
        ReleasedAttributeSet { attributes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequestedAttribute;

    fn identity() -> VerifiedIdentity {
        VerifiedIdentity::builder("uid")
            .attribute(Attribute::single("uid", "alice"))
            .attribute(Attribute::single("mail", "alice@example.com"))
            .attribute(Attribute::single("sn", "Smith"))
            .attribute(Attribute::multi(
                "eduPersonAffiliation",
                vec!["staff".to_string(), "member".to_string()],
            ))
            .authn_context("urn:ctx")
            .build()
            .unwrap()
    }

    fn requirements(names: &[&str]) -> AuthenticationRequirements {
        AuthenticationRequirements {
            requested_attributes: names.iter().map(|n| RequestedAttribute::new(*n)).collect(),
            ..AuthenticationRequirements::default()
        }
    }

    fn release(engine: &AttributeReleaseEngine, requested: &[&str]) -> Vec<String> {
        let identity = identity();
        let requirements = requirements(requested);
        let peer = PeerMetadata::new("https://sp.example.com");
        let ctx = ReleaseContext {
            identity: &identity,
            requirements: &requirements,
            peer: &peer,
        };
        engine.release(&ctx).names().map(str::to_string).collect()
    }

    struct FixedVoter(&'static str, Vote);

    impl AttributeVoter for FixedVoter {
        fn vote(&self, attribute: &Attribute, _ctx: &ReleaseContext<'_>) -> Vote {
            if attribute.name == self.0 {
                self.1
            } else {
                Vote::Abstain
            }
        }
    }

    struct Fixed(&'static str, Vec<Attribute>);

    impl AttributeProducer for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        fn produce(&self, _ctx: &ReleaseContext<'_>) -> Vec<Attribute> {
            self.1.clone()
        }
    }

    #[test]
    fn default_engine_releases_requested() {
        let released = release(&AttributeReleaseEngine::default(), &["mail", "cn"]);
        assert_eq!(released, ["mail"]);
    }

    #[test]
    fn empty_engine_releases_nothing() {
        assert!(release(&AttributeReleaseEngine::new(), &["mail"]).is_empty());
        let no_voters = AttributeReleaseEngine::new().with_producer(ReleaseAllAttributeProducer);
        assert!(release(&no_voters, &[]).is_empty());
    }

    #[test]
    fn include_wins_over_exclude() {
        let engine = AttributeReleaseEngine::new()
            .with_producer(ReleaseAllAttributeProducer)
            .with_voter(FixedVoter("mail", Vote::Exclude))
            .with_voter(FixedVoter("mail", Vote::Include))
            .with_voter(FixedVoter("sn", Vote::Exclude));
        assert_eq!(release(&engine, &[]), ["mail"]);
    }

    #[test]
    fn adding_include_voter_never_shrinks_release() {
        let base = || {
            AttributeReleaseEngine::new()
                .with_producer(ReleaseAllAttributeProducer)
                .with_voter(RequestedAttributeVoter)
                .with_voter(DenyListVoter::new(["sn"]))
        };
        let before = release(&base(), &["mail", "uid"]);
        let after = release(
            &base().with_voter(FixedVoter("eduPersonAffiliation", Vote::Include)),
            &["mail", "uid"],
        );
        for name in &before {
            assert!(after.contains(name));
        }
        assert!(after.contains(&"eduPersonAffiliation".to_string()));
        assert!(!after.contains(&"sn".to_string()));
    }

    #[test]
    fn first_producer_wins_duplicates() {
        let engine = AttributeReleaseEngine::new()
            .with_producer(Fixed("static", vec![Attribute::single("mail", "static@example.com")]))
            .with_producer(ReleaseAllAttributeProducer)
            .with_voter(IncludeAllVoter);

        let identity = identity();
        let requirements = requirements(&[]);
        let peer = PeerMetadata::new("https://sp.example.com");
        let set = engine.release(&ReleaseContext {
            identity: &identity,
            requirements: &requirements,
            peer: &peer,
        });

        let mail: Vec<_> = set
            .attributes()
            .iter()
            .filter(|a| a.attribute.name == "mail")
            .collect();
        assert_eq!(mail.len(), 1);
        assert_eq!(mail[0].provenance, "static");
        assert_eq!(mail[0].attribute.values, ["static@example.com"]);
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn statement_follows_release_order() {
        let engine = AttributeReleaseEngine::new()
            .with_producer(ReleaseAllAttributeProducer)
            .with_voter(IncludeAllVoter);
        let identity = identity();
        let requirements = requirements(&[]);
        let peer = PeerMetadata::new("https://sp.example.com");
        let set = engine.release(&ReleaseContext {
            identity: &identity,
            requirements: &requirements,
            peer: &peer,
        });

        let statement = set.to_statement().unwrap();
        let names: Vec<_> = statement.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["uid", "mail", "sn", "eduPersonAffiliation"]);
        assert!(ReleasedAttributeSet::default().to_statement().is_none());
    }
}
