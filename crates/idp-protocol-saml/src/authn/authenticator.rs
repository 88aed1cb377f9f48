//! User authentication contract.
//!
//! The engine never talks to the user itself. It hands the requirements to
//! an upstream [`UserAuthenticator`] and receives an identity back.

use async_trait::async_trait;
use thiserror::Error;

use crate::error::{ErrorStatus, IdpError};
use crate::types::PeerMetadata;

use super::{AuthenticationRequirements, VerifiedIdentity};

/// Why a user authentication did not produce an identity.
#[derive(Debug, Clone, Error)]
pub enum AuthenticationError {
    /// The user cancelled the authentication.
    #[error("authentication cancelled by user")]
    Cancelled,

    /// The user could not be authenticated.
    #[error("authentication failed: {0}")]
    Failed(String),

    /// The authenticator itself failed.
    #[error("authenticator error: {0}")]
    Internal(String),
}

impl From<AuthenticationError> for IdpError {
    fn from(err: AuthenticationError) -> Self {
        match err {
            AuthenticationError::Cancelled => Self::protocol(ErrorStatus::Cancel),
            AuthenticationError::Failed(msg) => Self::protocol_with(ErrorStatus::AuthnFailed, msg),
            AuthenticationError::Internal(msg) => Self::internal(msg),
        }
    }
}

/// Upstream authentication provider.
#[async_trait]
pub trait UserAuthenticator: Send + Sync {
    /// Authenticates the user for `peer` under `requirements`.
    ///
    /// Implementations record in the identity whether a requested sign
    /// message was actually shown.
    async fn authenticate(
        &self,
        requirements: &AuthenticationRequirements,
        peer: &PeerMetadata,
    ) -> Result<VerifiedIdentity, AuthenticationError>;
}
