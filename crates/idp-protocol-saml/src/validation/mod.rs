//! Request validation pipeline.
//!
//! An authentication request passes through an ordered list of
//! [`RequestValidator`]s before anything else happens. The first failure
//! ends validation. The standard order is:
//!
//! 1. [`SignatureValidator`] - request signature against the peer's keys
//! 2. [`AcsValidator`] - resolves where the response goes
//! 3. [`ReplayValidator`] - message freshness and replay detection
//! 4. [`EncryptionValidator`] - the peer can receive encrypted assertions
//!
//! Validators record what they learn in the [`RequestContext`] and never
//! rely on another validator's judgement.

mod acs;
mod encryption;
mod replay;
mod signature;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use idp_cache::ReplayCache;
use idp_core::IdpConfig;
use idp_crypto::{KeyMaterial, SignatureVerifier};
use tracing::debug;

pub use acs::{resolve_acs, AcsValidator};
pub use encryption::EncryptionValidator;
pub use replay::ReplayValidator;
pub use signature::SignatureValidator;

use crate::error::IdpError;
use crate::request::ReceivedAuthnRequest;
use crate::types::{AcsEndpoint, PeerMetadata};

/// Result of a validation step: pass, or the error that ends processing.
pub type ValidationOutcome = Result<(), IdpError>;

/// Request-scoped facts established during processing.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The instant processing started.
    pub now: DateTime<Utc>,
    /// Address of the user agent.
    pub client_address: Option<String>,
    /// The endpoint the response will be delivered to.
    pub resolved_acs: Option<AcsEndpoint>,
    /// The key assertions will be encrypted under.
    pub encryption_key: Option<KeyMaterial>,
}

impl RequestContext {
    /// Creates an empty context.
    #[must_use]
    pub const fn new(now: DateTime<Utc>, client_address: Option<String>) -> Self {
        Self {
            now,
            client_address,
            resolved_acs: None,
            encryption_key: None,
        }
    }
}

/// One step of request validation.
#[async_trait]
pub trait RequestValidator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Validates the request, recording findings in `ctx`.
    async fn validate(
        &self,
        request: &ReceivedAuthnRequest,
        peer: &PeerMetadata,
        ctx: &mut RequestContext,
    ) -> ValidationOutcome;
}

/// Ordered chain of validators.
pub struct ValidationPipeline {
    validators: Vec<Box<dyn RequestValidator>>,
}

impl ValidationPipeline {
    /// Creates a pipeline running `validators` in order.
    #[must_use]
    pub fn new(validators: Vec<Box<dyn RequestValidator>>) -> Self {
        Self { validators }
    }

    /// Creates the standard signature, ACS, replay and encryption pipeline.
    #[must_use]
    pub fn standard(
        config: &IdpConfig,
        replay_cache: Arc<dyn ReplayCache>,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Self {
        Self::new(vec![
            Box::new(SignatureValidator::new(
                verifier,
                config.signature.require_signed_requests,
                config.signature.allow_sha1,
            )),
            Box::new(AcsValidator),
            Box::new(ReplayValidator::from_config(&config.replay, replay_cache)),
            Box::new(EncryptionValidator::new(config.assertion.encrypt_assertions)),
        ])
    }

    /// Returns the number of validators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Returns true if the pipeline has no validators.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Runs every validator in order, stopping at the first failure.
    pub async fn validate(
        &self,
        request: &ReceivedAuthnRequest,
        peer: &PeerMetadata,
        ctx: &mut RequestContext,
    ) -> ValidationOutcome {
        for validator in &self.validators {
            if let Err(e) = validator.validate(request, peer, ctx).await {
                debug!(
                    validator = validator.name(),
                    request_id = %request.id(),
                    error = %e,
                    "request validation failed"
                );
                return Err(e);
            }
        }
        Ok(())
    }
}
