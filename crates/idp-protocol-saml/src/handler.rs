//! Authentication request processing.
//!
//! [`AuthnRequestHandler::handle`] takes a request from decoding to the
//! finished response:
//!
//! 1. decode the binding message and resolve the peer's metadata
//! 2. run the validation pipeline
//! 3. derive the authentication requirements
//! 4. reuse an SSO identity or authenticate the user
//! 5. run the post-authentication processors
//! 6. generate the NameID and release attributes
//! 7. build the assertion and wrap it into a response
//!
//! Every component reports failures as [`IdpError`]. This handler is the
//! one place that turns them into an [`Outcome`]: protocol errors become a
//! status response to the validated endpoint, everything else a local fault.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use idp_cache::{InMemoryReplayCache, ReplayCache};
use idp_core::{Event, EventBuilder, EventSink, EventType, IdpConfig, TracingEventSink};
use idp_crypto::{AwsLcVerifier, SignatureVerifier, SigningKey};
use tracing::{debug, info, warn};

use crate::attributes::{AttributeReleaseEngine, ReleaseContext};
use crate::authn::{
    standard_processors, AuthenticationRequirements, EntityCategoryRegistry,
    PostAuthenticationProcessor, RequestOverlay, RequirementsBuilder, SsoDecider,
    UserAuthenticator, VerifiedIdentity,
};
use crate::builder::{
    AssertionBuilder, AssertionCustomizer, AssertionInput, FinishedResponse, ResponseCustomizer,
    ResponseFactory, ResponseTarget,
};
use crate::error::{ErrorStatus, IdpError, ProtocolError, UnrecoverableError, UnrecoverableKind};
use crate::nameid::NameIdGeneratorFactory;
use crate::request::{RawAuthnRequest, ReceivedAuthnRequest};
use crate::resolver::MetadataResolver;
use crate::signature::XmlSigner;
use crate::types::PeerMetadata;
use crate::validation::{RequestContext, ValidationPipeline};

/// How a request ended.
#[derive(Debug)]
pub enum Outcome {
    /// An assertion was issued.
    Success {
        /// The response to deliver.
        response: FinishedResponse,
        /// The identity to keep for SSO, when the user authenticated for
        /// this request. Per-request fields are already cleared.
        session: Option<VerifiedIdentity>,
    },
    /// The peer is told why no assertion was issued.
    ErrorResponse {
        /// The status response to deliver.
        response: FinishedResponse,
        /// The reported error.
        error: ProtocolError,
    },
    /// Nothing may be sent to the peer.
    LocalFault(UnrecoverableError),
}

impl Outcome {
    /// Returns the response to deliver, if any.
    #[must_use]
    pub const fn response(&self) -> Option<&FinishedResponse> {
        match self {
            Self::Success { response, .. } | Self::ErrorResponse { response, .. } => Some(response),
            Self::LocalFault(_) => None,
        }
    }
}

/// Identity and overlay for the current request.
struct Authenticated {
    identity: Arc<VerifiedIdentity>,
    overlay: RequestOverlay,
}

/// Processes authentication requests.
pub struct AuthnRequestHandler {
    resolver: Arc<dyn MetadataResolver>,
    pipeline: ValidationPipeline,
    requirements: RequirementsBuilder,
    authenticator: Arc<dyn UserAuthenticator>,
    sso: SsoDecider,
    post_processors: Vec<Box<dyn PostAuthenticationProcessor>>,
    name_ids: NameIdGeneratorFactory,
    attributes: AttributeReleaseEngine,
    assertions: AssertionBuilder,
    responses: ResponseFactory,
    events: Arc<dyn EventSink>,
}

impl AuthnRequestHandler {
    /// Starts building a handler.
    #[must_use]
    pub fn builder(
        config: IdpConfig,
        resolver: Arc<dyn MetadataResolver>,
        authenticator: Arc<dyn UserAuthenticator>,
        signing_key: Arc<SigningKey>,
    ) -> AuthnRequestHandlerBuilder {
        AuthnRequestHandlerBuilder::new(config, resolver, authenticator, signing_key)
    }

    /// Returns the NameID generators, for metadata publication.
    #[must_use]
    pub const fn name_ids(&self) -> &NameIdGeneratorFactory {
        &self.name_ids
    }

    /// Handles one authentication request.
    pub async fn handle(&self, raw: RawAuthnRequest) -> Outcome {
        let request = match ReceivedAuthnRequest::decode(&raw.message) {
            Ok(request) => request,
            Err(err) => return self.local_fault(err, None, raw.client_address.as_deref()),
        };
        self.emit(
            self.event(EventType::AuthnRequestReceived, &request, raw.client_address.as_deref())
                .detail("binding", request.binding.uri()),
        );

        let Some(peer) = self.resolver.resolve(request.issuer()).await else {
            let err = IdpError::unrecoverable(
                UnrecoverableKind::UnknownPeer,
                format!("no metadata for '{}'", request.issuer()),
            );
            return self.local_fault(err, Some(&request), raw.client_address.as_deref());
        };

        let mut ctx = RequestContext::new(Utc::now(), raw.client_address.clone());
        match self.process(&raw, &request, &peer, &mut ctx).await {
            Ok((response, session)) => {
                self.emit(
                    self.event(EventType::SuccessResponse, &request, ctx.client_address.as_deref())
                        .detail("response_id", &response.response.id),
                );
                Outcome::Success { response, session }
            }
            Err(err) => self.conclude_failure(err, &request, &ctx),
        }
    }

    async fn process(
        &self,
        raw: &RawAuthnRequest,
        request: &ReceivedAuthnRequest,
        peer: &PeerMetadata,
        ctx: &mut RequestContext,
    ) -> Result<(FinishedResponse, Option<VerifiedIdentity>), IdpError> {
        self.pipeline.validate(request, peer, ctx).await?;

        let requirements = self.requirements.build(&request.request, peer)?;
        let authenticated = self
            .authenticate(raw, request, peer, &requirements, ctx)
            .await?;
        let identity = authenticated.identity.as_ref();
        let overlay = &authenticated.overlay;

        for processor in &self.post_processors {
            processor.process(identity, overlay, &requirements)?;
        }

        let name_id = self
            .name_ids
            .generate(request.request.name_id_policy.as_ref(), identity, peer)?;
        let attributes = self.attributes.release(&ReleaseContext {
            identity,
            requirements: &requirements,
            peer,
        });

        let issued_at = Utc::now();
        let assertion = self.assertions.build_at(
            issued_at,
            &AssertionInput {
                request: &request.request,
                peer,
                context: ctx,
                identity,
                overlay,
                name_id: &name_id,
                attributes: &attributes,
            },
        )?;
        let response = self.responses.success(
            issued_at,
            &ResponseTarget::for_request(request, ctx),
            assertion,
            ctx.encryption_key.as_ref(),
        )?;

        let session = (!overlay.sso).then(|| identity.without_transient_fields());
        Ok((response, session))
    }

    async fn authenticate(
        &self,
        raw: &RawAuthnRequest,
        request: &ReceivedAuthnRequest,
        peer: &PeerMetadata,
        requirements: &AuthenticationRequirements,
        ctx: &RequestContext,
    ) -> Result<Authenticated, IdpError> {
        if let Some(previous) = &raw.sso_session {
            if self.sso.may_reuse(previous, requirements, Utc::now()) {
                info!(
                    request_id = %request.id(),
                    peer = %peer.entity_id,
                    user = %previous.primary_value(),
                    "reusing SSO session"
                );
                return Ok(Authenticated {
                    identity: Arc::clone(previous),
                    overlay: RequestOverlay::reused(ctx.client_address.clone()),
                });
            }
        }

        if requirements.is_passive {
            return Err(IdpError::protocol(ErrorStatus::NoPassive));
        }

        self.emit(self.event(EventType::PreUserAuthentication, request, ctx.client_address.as_deref()));
        let identity = match self.authenticator.authenticate(requirements, peer).await {
            Ok(identity) => identity,
            Err(err) => {
                self.emit(
                    self.event(EventType::PostUserAuthentication, request, ctx.client_address.as_deref())
                        .failure(err.to_string()),
                );
                return Err(err.into());
            }
        };
        self.emit(
            self.event(EventType::PostUserAuthentication, request, ctx.client_address.as_deref())
                .user(identity.primary_value())
                .detail("authn_context", identity.authn_context()),
        );

        let mut overlay = RequestOverlay::fresh(&identity);
        if overlay.client_address.is_none() {
            overlay.client_address.clone_from(&ctx.client_address);
        }
        Ok(Authenticated {
            identity: Arc::new(identity),
            overlay,
        })
    }

    /// Maps a failure after the peer was resolved to an outcome.
    fn conclude_failure(
        &self,
        err: IdpError,
        request: &ReceivedAuthnRequest,
        ctx: &RequestContext,
    ) -> Outcome {
        let protocol = match err {
            IdpError::Protocol(protocol) => protocol,
            IdpError::Unrecoverable(_) => {
                return self.local_fault(err, Some(request), ctx.client_address.as_deref())
            }
        };

        if ctx.resolved_acs.is_none() {
            let err = IdpError::internal(format!(
                "no validated endpoint to report '{}' to",
                protocol.status().message_code()
            ));
            return self.local_fault(err, Some(request), ctx.client_address.as_deref());
        }

        let now: DateTime<Utc> = Utc::now();
        match self
            .responses
            .error(now, &ResponseTarget::for_request(request, ctx), &protocol)
        {
            Ok(response) => {
                warn!(
                    request_id = %request.id(),
                    peer = %request.issuer(),
                    status = protocol.status().message_code(),
                    message = %protocol.message(),
                    "sending error response"
                );
                self.emit(
                    self.event(EventType::ErrorResponse, request, ctx.client_address.as_deref())
                        .failure(protocol.message())
                        .detail("status", protocol.status().message_code()),
                );
                Outcome::ErrorResponse {
                    response,
                    error: protocol,
                }
            }
            Err(err) => self.local_fault(err, Some(request), ctx.client_address.as_deref()),
        }
    }

    fn local_fault(
        &self,
        err: IdpError,
        request: Option<&ReceivedAuthnRequest>,
        client_address: Option<&str>,
    ) -> Outcome {
        let fault = match err {
            IdpError::Unrecoverable(fault) => fault,
            IdpError::Protocol(protocol) => {
                UnrecoverableError::new(UnrecoverableKind::Internal, protocol.to_string())
            }
        };
        warn!(
            request_id = request.map(ReceivedAuthnRequest::id),
            peer = request.map(ReceivedAuthnRequest::issuer),
            code = fault.kind().message_code(),
            message = %fault.message(),
            "request ended in a local fault"
        );

        let mut event = Event::builder(EventType::UnrecoverableError)
            .failure(fault.message())
            .detail("code", fault.kind().message_code());
        if let Some(request) = request {
            event = event.request(request.id()).peer(request.issuer());
        }
        if let Some(address) = client_address {
            event = event.ip_address(address);
        }
        self.emit(event);
        Outcome::LocalFault(fault)
    }

    fn event(
        &self,
        event_type: EventType,
        request: &ReceivedAuthnRequest,
        client_address: Option<&str>,
    ) -> EventBuilder {
        let event = Event::builder(event_type)
            .request(request.id())
            .peer(request.issuer());
        match client_address {
            Some(address) => event.ip_address(address),
            None => event,
        }
    }

    fn emit(&self, event: EventBuilder) {
        let event = event.build();
        debug!(event_type = ?event.event_type, "emitting audit event");
        self.events.emit(&event);
    }
}

/// Builder for [`AuthnRequestHandler`].
///
/// Everything not set explicitly follows the configuration: the standard
/// validation pipeline over an in-memory replay cache, the standard SSO
/// voters and post-authentication processors, and the default attribute
/// release engine.
pub struct AuthnRequestHandlerBuilder {
    config: IdpConfig,
    resolver: Arc<dyn MetadataResolver>,
    authenticator: Arc<dyn UserAuthenticator>,
    signing_key: Arc<SigningKey>,
    name_id_secret: Option<Vec<u8>>,
    replay_cache: Option<Arc<dyn ReplayCache>>,
    verifier: Option<Arc<dyn SignatureVerifier>>,
    pipeline: Option<ValidationPipeline>,
    entity_categories: EntityCategoryRegistry,
    post_processors: Option<Vec<Box<dyn PostAuthenticationProcessor>>>,
    sso: Option<SsoDecider>,
    attributes: Option<AttributeReleaseEngine>,
    assertion_customizer: Option<AssertionCustomizer>,
    response_customizer: Option<ResponseCustomizer>,
    events: Option<Arc<dyn EventSink>>,
}

impl AuthnRequestHandlerBuilder {
    fn new(
        config: IdpConfig,
        resolver: Arc<dyn MetadataResolver>,
        authenticator: Arc<dyn UserAuthenticator>,
        signing_key: Arc<SigningKey>,
    ) -> Self {
        Self {
            config,
            resolver,
            authenticator,
            signing_key,
            name_id_secret: None,
            replay_cache: None,
            verifier: None,
            pipeline: None,
            entity_categories: EntityCategoryRegistry::new(),
            post_processors: None,
            sso: None,
            attributes: None,
            assertion_customizer: None,
            response_customizer: None,
            events: None,
        }
    }

    /// Sets the secret persistent NameIDs are derived with.
    ///
    /// Without one, a random secret is generated and persistent identifiers
    /// do not survive a restart.
    #[must_use]
    pub fn name_id_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.name_id_secret = Some(secret.into());
        self
    }

    /// Sets the replay cache used by the standard pipeline.
    #[must_use]
    pub fn replay_cache(mut self, cache: Arc<dyn ReplayCache>) -> Self {
        self.replay_cache = Some(cache);
        self
    }

    /// Sets the verifier used by the standard pipeline.
    #[must_use]
    pub fn verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Replaces the validation pipeline.
    #[must_use]
    pub fn pipeline(mut self, pipeline: ValidationPipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Sets the entity category registry.
    #[must_use]
    pub fn entity_categories(mut self, registry: EntityCategoryRegistry) -> Self {
        self.entity_categories = registry;
        self
    }

    /// Replaces the post-authentication processors.
    #[must_use]
    pub fn post_processors(mut self, processors: Vec<Box<dyn PostAuthenticationProcessor>>) -> Self {
        self.post_processors = Some(processors);
        self
    }

    /// Replaces the SSO decider.
    #[must_use]
    pub fn sso(mut self, decider: SsoDecider) -> Self {
        self.sso = Some(decider);
        self
    }

    /// Replaces the attribute release engine.
    #[must_use]
    pub fn attributes(mut self, engine: AttributeReleaseEngine) -> Self {
        self.attributes = Some(engine);
        self
    }

    /// Sets the assertion customization hook.
    #[must_use]
    pub fn assertion_customizer(mut self, customizer: AssertionCustomizer) -> Self {
        self.assertion_customizer = Some(customizer);
        self
    }

    /// Sets the response customization hook.
    #[must_use]
    pub fn response_customizer(mut self, customizer: ResponseCustomizer) -> Self {
        self.response_customizer = Some(customizer);
        self
    }

    /// Sets the audit event sink.
    #[must_use]
    pub fn events(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Builds the handler.
    ///
    /// # Errors
    ///
    /// An internal error if the configuration is invalid.
    pub fn build(self) -> Result<AuthnRequestHandler, IdpError> {
        let config = self.config;
        config
            .validate()
            .map_err(|e| IdpError::internal(format!("invalid configuration: {e}")))?;

        let max_session_age = chrono::Duration::from_std(config.sso.max_session_age())
            .map_err(|e| IdpError::internal(format!("sso.max_session_age out of range: {e}")))?;

        let pipeline = match self.pipeline {
            Some(pipeline) => pipeline,
            None => ValidationPipeline::standard(
                &config,
                self.replay_cache
                    .unwrap_or_else(|| Arc::new(InMemoryReplayCache::new())),
                self.verifier.unwrap_or_else(|| {
                    Arc::new(AwsLcVerifier::new().allow_sha1(config.signature.allow_sha1))
                }),
            ),
        };

        let secret = self
            .name_id_secret
            .unwrap_or_else(|| idp_crypto::random_bytes(32));
        let signer = Arc::new(XmlSigner::new(self.signing_key));

        let mut assertions = AssertionBuilder::new(&config).with_signer(Arc::clone(&signer));
        if let Some(customizer) = self.assertion_customizer {
            assertions = assertions.with_customizer(customizer);
        }
        let mut responses = ResponseFactory::new(&config).with_signer(signer);
        if let Some(customizer) = self.response_customizer {
            responses = responses.with_customizer(customizer);
        }

        Ok(AuthnRequestHandler {
            name_ids: NameIdGeneratorFactory::from_config(&config, secret)?,
            requirements: RequirementsBuilder::standard(
                config.supported_authn_contexts.clone(),
                self.entity_categories,
            ),
            resolver: self.resolver,
            pipeline,
            authenticator: self.authenticator,
            sso: self
                .sso
                .unwrap_or_else(|| SsoDecider::standard(max_session_age)),
            post_processors: self.post_processors.unwrap_or_else(standard_processors),
            attributes: self.attributes.unwrap_or_default(),
            assertions,
            responses,
            events: self.events.unwrap_or_else(|| Arc::new(TracingEventSink)),
        })
    }
}
