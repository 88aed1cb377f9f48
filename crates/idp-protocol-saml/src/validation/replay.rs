//! Message freshness and replay detection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use idp_cache::ReplayCache;
use idp_core::config::ReplayConfig;
use tracing::{error, warn};

use crate::error::{ErrorStatus, IdpError};
use crate::request::ReceivedAuthnRequest;
use crate::types::PeerMetadata;

use super::{RequestContext, RequestValidator, ValidationOutcome};

/// Rejects stale, future-dated and already seen requests.
///
/// A request is too old when it was issued more than the replay TTL plus
/// clock skew ago. Its cache entry is kept for the TTL plus twice the skew,
/// which covers the whole freshness window even for a request issued at
/// the far edge of the allowed skew. Fresh requests are admitted through the
/// cache's atomic insert, so two concurrent copies of a request cannot both
/// pass.
pub struct ReplayValidator {
    cache: Arc<dyn ReplayCache>,
    context: String,
    ttl: Duration,
    clock_skew: Duration,
}

impl ReplayValidator {
    /// Creates a replay validator.
    #[must_use]
    pub fn new(
        cache: Arc<dyn ReplayCache>,
        context: impl Into<String>,
        ttl: Duration,
        clock_skew: Duration,
    ) -> Self {
        Self {
            cache,
            context: context.into(),
            ttl,
            clock_skew,
        }
    }

    /// Creates a replay validator from configuration.
    #[must_use]
    pub fn from_config(config: &ReplayConfig, cache: Arc<dyn ReplayCache>) -> Self {
        Self::new(cache, config.context.clone(), config.ttl(), config.clock_skew())
    }

    /// How long a seen request ID is remembered.
    fn retention(&self) -> Duration {
        self.ttl.saturating_add(self.clock_skew.saturating_mul(2))
    }

    fn check_freshness(&self, request: &ReceivedAuthnRequest, ctx: &RequestContext) -> ValidationOutcome {
        let out_of_range = || IdpError::internal("replay window out of range");
        let to_chrono = |d: Duration| chrono::Duration::from_std(d).map_err(|_| out_of_range());
        let skew = to_chrono(self.clock_skew)?;
        let max_age = to_chrono(self.ttl)?
            .checked_add(&skew)
            .ok_or_else(out_of_range)?;
        let oldest = ctx.now.checked_sub_signed(max_age).ok_or_else(out_of_range)?;
        let latest = ctx.now.checked_add_signed(skew).ok_or_else(out_of_range)?;
        let issued = request.request.issue_instant;

        if issued < oldest {
            return Err(IdpError::protocol_with(
                ErrorStatus::MessageTooOld,
                format!("request issued at {issued} is too old"),
            ));
        }
        if issued > latest {
            return Err(IdpError::protocol_with(
                ErrorStatus::MessageTooOld,
                format!("request issued at {issued} is in the future"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl RequestValidator for ReplayValidator {
    fn name(&self) -> &'static str {
        "replay"
    }

    async fn validate(
        &self,
        request: &ReceivedAuthnRequest,
        peer: &PeerMetadata,
        ctx: &mut RequestContext,
    ) -> ValidationOutcome {
        self.check_freshness(request, ctx)?;

        let admitted = self
            .cache
            .record(&self.context, request.id(), self.retention())
            .await
            .map_err(|e| {
                error!(request_id = %request.id(), error = %e, "replay cache unavailable");
                IdpError::internal(format!("replay cache: {e}"))
            })?;

        if admitted {
            Ok(())
        } else {
            warn!(request_id = %request.id(), peer = %peer.entity_id, "replayed request");
            Err(IdpError::protocol_with(
                ErrorStatus::ReplayDetected,
                format!("request '{}' has already been processed", request.id()),
            ))
        }
    }
}
