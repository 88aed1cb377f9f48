//! Single sign-on reuse decisions.
//!
//! An identity from an earlier authentication may answer a new request
//! without involving the user. Each [`SsoVoter`] looks at one aspect of the
//! request; reuse is allowed only if no voter denies it and at least one
//! allows it.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::{AuthenticationRequirements, VerifiedIdentity};

/// A voter's opinion on SSO reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsoVote {
    /// Reuse is fine as far as this voter is concerned.
    Allow,
    /// Reuse must not happen.
    Deny,
    /// The voter has no opinion.
    Abstain,
}

/// Decides one aspect of SSO reuse.
pub trait SsoVoter: Send + Sync {
    /// Votes on reusing `identity` for a request with `requirements`.
    fn vote(
        &self,
        identity: &VerifiedIdentity,
        requirements: &AuthenticationRequirements,
        now: DateTime<Utc>,
    ) -> SsoVote;
}

/// Denies reuse of authentications older than a maximum age.
#[derive(Debug, Clone, Copy)]
pub struct SessionAgeVoter {
    max_age: Duration,
}

impl SessionAgeVoter {
    /// Creates a voter with the given maximum age.
    #[must_use]
    pub const fn new(max_age: Duration) -> Self {
        Self { max_age }
    }
}

impl SsoVoter for SessionAgeVoter {
    fn vote(
        &self,
        identity: &VerifiedIdentity,
        _requirements: &AuthenticationRequirements,
        now: DateTime<Utc>,
    ) -> SsoVote {
        if now - identity.authn_instant() > self.max_age {
            SsoVote::Deny
        } else {
            SsoVote::Allow
        }
    }
}

/// Allows reuse only if the earlier context is acceptable now.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthnContextVoter;

impl SsoVoter for AuthnContextVoter {
    fn vote(
        &self,
        identity: &VerifiedIdentity,
        requirements: &AuthenticationRequirements,
        _now: DateTime<Utc>,
    ) -> SsoVote {
        if requirements.accepts_authn_context(identity.authn_context()) {
            SsoVote::Allow
        } else {
            SsoVote::Deny
        }
    }
}

/// Denies reuse when the identity contradicts a principal selection hint.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrincipalSelectionVoter;

impl SsoVoter for PrincipalSelectionVoter {
    fn vote(
        &self,
        identity: &VerifiedIdentity,
        requirements: &AuthenticationRequirements,
        _now: DateTime<Utc>,
    ) -> SsoVote {
        let contradicted = requirements.principal_selection.iter().any(|hint| {
            identity
                .attribute(&hint.name)
                .is_some_and(|a| !a.values.contains(&hint.value))
        });
        if contradicted {
            SsoVote::Deny
        } else {
            SsoVote::Abstain
        }
    }
}

/// Denies reuse whenever a sign message must be shown.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignMessageVoter;

impl SsoVoter for SignMessageVoter {
    fn vote(
        &self,
        _identity: &VerifiedIdentity,
        requirements: &AuthenticationRequirements,
        _now: DateTime<Utc>,
    ) -> SsoVote {
        if requirements.sign_message_must_show() {
            SsoVote::Deny
        } else {
            SsoVote::Abstain
        }
    }
}

/// Combines [`SsoVoter`]s into a reuse decision.
pub struct SsoDecider {
    voters: Vec<Box<dyn SsoVoter>>,
}

impl SsoDecider {
    /// Creates a decider with the given voters.
    #[must_use]
    pub fn new(voters: Vec<Box<dyn SsoVoter>>) -> Self {
        Self { voters }
    }

    /// Creates a decider with the session age, context, principal selection
    /// and sign message voters.
    #[must_use]
    pub fn standard(max_session_age: Duration) -> Self {
        Self::new(vec![
            Box::new(SessionAgeVoter::new(max_session_age)),
            Box::new(AuthnContextVoter),
            Box::new(PrincipalSelectionVoter),
            Box::new(SignMessageVoter),
        ])
    }

    /// Returns true if `identity` may answer a request with `requirements`.
    #[must_use]
    pub fn may_reuse(
        &self,
        identity: &VerifiedIdentity,
        requirements: &AuthenticationRequirements,
        now: DateTime<Utc>,
    ) -> bool {
        if requirements.force_authn {
            debug!("SSO not allowed, ForceAuthn requested");
            return false;
        }
        let mut allowed = false;
        for (index, voter) in self.voters.iter().enumerate() {
            match voter.vote(identity, requirements, now) {
                SsoVote::Deny => {
                    debug!(voter = index, "SSO denied");
                    return false;
                }
                SsoVote::Allow => allowed = true,
                SsoVote::Abstain => {}
            }
        }
        allowed
    }
}
