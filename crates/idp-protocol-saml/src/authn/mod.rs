//! Authentication model.
//!
//! - [`requirements`] - what a request asks of the authentication
//! - [`identity`] - the authenticated identity and its per-request overlay
//! - [`authenticator`] - the upstream authentication contract
//! - [`sso`] - whether an earlier identity may be reused
//! - [`postauth`] - checks run after authentication
//! - [`session`] - SSO session storage contract

pub mod authenticator;
pub mod identity;
pub mod postauth;
pub mod requirements;
pub mod session;
pub mod sso;

pub use authenticator::{AuthenticationError, UserAuthenticator};
pub use identity::{RequestOverlay, VerifiedIdentity, VerifiedIdentityBuilder};
pub use postauth::{
    standard_processors, AuthnContextProcessor, PostAuthenticationProcessor,
    PrincipalSelectionProcessor, SignMessageDisplayedProcessor,
};
pub use requirements::{
    AuthenticationRequirements, EntityCategoryRegistry, ExtensionRequestedAttributeProcessor,
    MetadataRequestedAttributeProcessor, RequestedAttributeProcessor, RequirementsBuilder,
};
pub use session::{InMemorySessionStore, SessionStore};
pub use sso::{
    AuthnContextVoter, PrincipalSelectionVoter, SessionAgeVoter, SignMessageVoter, SsoDecider,
    SsoVote, SsoVoter,
};
