//! Encryption capability check.

use async_trait::async_trait;
use idp_crypto::can_encrypt_for;
use tracing::debug;

use crate::error::{ErrorStatus, IdpError};
use crate::request::ReceivedAuthnRequest;
use crate::types::PeerMetadata;

use super::{RequestContext, RequestValidator, ValidationOutcome};

/// Selects the peer key assertions are encrypted under.
///
/// When encryption is not required the validator passes without selecting
/// a key, and assertions are sent in the clear.
#[derive(Debug, Clone, Copy)]
pub struct EncryptionValidator {
    required: bool,
}

impl EncryptionValidator {
    /// Creates an encryption validator.
    #[must_use]
    pub const fn new(required: bool) -> Self {
        Self { required }
    }
}

#[async_trait]
impl RequestValidator for EncryptionValidator {
    fn name(&self) -> &'static str {
        "encryption"
    }

    async fn validate(
        &self,
        request: &ReceivedAuthnRequest,
        peer: &PeerMetadata,
        ctx: &mut RequestContext,
    ) -> ValidationOutcome {
        if !self.required {
            return Ok(());
        }
        let key = peer
            .encryption_keys
            .iter()
            .find(|k| can_encrypt_for(k))
            .ok_or_else(|| {
                IdpError::protocol_with(
                    ErrorStatus::EncryptNotPossible,
                    format!("'{}' has no usable encryption key", peer.entity_id),
                )
            })?;
        debug!(request_id = %request.id(), "assertion will be encrypted");
        ctx.encryption_key = Some(key.clone());
        Ok(())
    }
}
