//! Configuration for the identity provider.
//!
//! All settings have defaults so a configuration document only needs to name
//! the values it overrides. Durations are expressed in whole seconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Persistent name identifier format URI.
const PERSISTENT_FORMAT: &str = "urn:oasis:names:tc:SAML:2.0:nameid-format:persistent";

/// Upper bound for every configured duration (ten years).
pub const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Main configuration structure for the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdpConfig {
    /// The entity ID of this identity provider.
    pub entity_id: String,
    /// Base URL under which the protocol endpoints are served.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Assertion issuance settings.
    #[serde(default)]
    pub assertion: AssertionConfig,
    /// Inbound request signature policy.
    #[serde(default)]
    pub signature: SignaturePolicyConfig,
    /// Replay protection settings.
    #[serde(default)]
    pub replay: ReplayConfig,
    /// Single sign-on settings.
    #[serde(default)]
    pub sso: SsoConfig,
    /// Name identifier settings.
    #[serde(default)]
    pub name_id: NameIdConfig,
    /// Authentication context class URIs this IdP can satisfy.
    #[serde(default = "default_authn_contexts")]
    pub supported_authn_contexts: Vec<String>,
    /// Entity categories this IdP declares in its metadata.
    #[serde(default)]
    pub entity_categories: Vec<String>,
    /// Replay cache backend.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Assertion issuance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionConfig {
    /// Seconds subtracted from the issuance instant for `NotBefore`.
    #[serde(default = "default_not_before_secs")]
    pub not_before_secs: u64,
    /// Seconds added to the issuance instant for `NotOnOrAfter`.
    #[serde(default = "default_not_on_or_after_secs")]
    pub not_on_or_after_secs: u64,
    /// Whether assertions must be encrypted for the peer.
    #[serde(default = "default_true")]
    pub encrypt_assertions: bool,
    /// Whether protocol responses are signed.
    #[serde(default = "default_true")]
    pub sign_responses: bool,
}

/// Inbound request signature policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignaturePolicyConfig {
    /// Require every authentication request to be signed.
    #[serde(default = "default_true")]
    pub require_signed_requests: bool,
    /// Accept SHA-1 based signatures from legacy peers.
    #[serde(default)]
    pub allow_sha1: bool,
}

/// Replay protection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Namespace under which request identifiers are recorded.
    #[serde(default = "default_replay_context")]
    pub context: String,
    /// How long a request identifier is remembered.
    #[serde(default = "default_replay_ttl_secs")]
    pub ttl_secs: u64,
    /// Allowed clock skew between this IdP and its peers.
    #[serde(default = "default_clock_skew_secs")]
    pub clock_skew_secs: u64,
}

/// Single sign-on settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsoConfig {
    /// Maximum age of an authentication that may be reused for SSO.
    #[serde(default = "default_max_session_age_secs")]
    pub max_session_age_secs: u64,
}

/// Name identifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameIdConfig {
    /// Format used when neither the request nor the peer expresses one.
    #[serde(default = "default_name_id_format")]
    pub default_format: String,
    /// Attribute holding the subject's e-mail address.
    #[serde(default = "default_email_attribute")]
    pub email_attribute: String,
}

/// Replay cache backend selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum CacheConfig {
    /// Process-local cache.
    #[default]
    Memory,
    /// Shared Redis cache.
    Redis {
        /// Redis connection URL.
        url: String,
        /// Key prefix for all replay keys.
        #[serde(default = "default_key_prefix")]
        key_prefix: String,
    },
}

impl IdpConfig {
    /// Creates a configuration with default policy for the given entity ID.
    #[must_use]
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            base_url: default_base_url(),
            assertion: AssertionConfig::default(),
            signature: SignaturePolicyConfig::default(),
            replay: ReplayConfig::default(),
            sso: SsoConfig::default(),
            name_id: NameIdConfig::default(),
            supported_authn_contexts: default_authn_contexts(),
            entity_categories: Vec::new(),
            cache: CacheConfig::default(),
        }
    }

    /// Parses a configuration from a JSON document and validates it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values the engine cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.entity_id.trim().is_empty() {
            return Err(Error::Config("entity_id must not be empty".to_string()));
        }
        if self.assertion.not_on_or_after_secs == 0 {
            return Err(Error::Config(
                "assertion.not_on_or_after_secs must be positive".to_string(),
            ));
        }
        if self.replay.ttl_secs == 0 {
            return Err(Error::Config("replay.ttl_secs must be positive".to_string()));
        }
        for (name, secs) in [
            ("assertion.not_before_secs", self.assertion.not_before_secs),
            ("assertion.not_on_or_after_secs", self.assertion.not_on_or_after_secs),
            ("replay.ttl_secs", self.replay.ttl_secs),
            ("replay.clock_skew_secs", self.replay.clock_skew_secs),
            ("sso.max_session_age_secs", self.sso.max_session_age_secs),
        ] {
            if secs > MAX_DURATION_SECS {
                return Err(Error::Config(format!(
                    "{name} must not exceed {MAX_DURATION_SECS}"
                )));
            }
        }
        if self.replay.context.is_empty() {
            return Err(Error::Config("replay.context must not be empty".to_string()));
        }
        if self.supported_authn_contexts.is_empty() {
            return Err(Error::Config(
                "at least one authentication context must be supported".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the assertion encryption policy.
    #[must_use]
    pub const fn encrypt_assertions(mut self, encrypt: bool) -> Self {
        self.assertion.encrypt_assertions = encrypt;
        self
    }

    /// Sets whether responses are signed.
    #[must_use]
    pub const fn sign_responses(mut self, sign: bool) -> Self {
        self.assertion.sign_responses = sign;
        self
    }

    /// Sets whether unsigned authentication requests are rejected.
    #[must_use]
    pub const fn require_signed_requests(mut self, required: bool) -> Self {
        self.signature.require_signed_requests = required;
        self
    }

    /// Sets the entity categories declared by this IdP.
    #[must_use]
    pub fn with_entity_categories(mut self, categories: Vec<String>) -> Self {
        self.entity_categories = categories;
        self
    }
}

impl AssertionConfig {
    /// Returns the `NotBefore` offset.
    #[must_use]
    pub const fn not_before(&self) -> Duration {
        Duration::from_secs(self.not_before_secs)
    }

    /// Returns the `NotOnOrAfter` offset.
    #[must_use]
    pub const fn not_on_or_after(&self) -> Duration {
        Duration::from_secs(self.not_on_or_after_secs)
    }
}

impl ReplayConfig {
    /// Returns the replay entry lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Returns the allowed clock skew.
    #[must_use]
    pub const fn clock_skew(&self) -> Duration {
        Duration::from_secs(self.clock_skew_secs)
    }
}

impl SsoConfig {
    /// Returns the maximum reusable authentication age.
    #[must_use]
    pub const fn max_session_age(&self) -> Duration {
        Duration::from_secs(self.max_session_age_secs)
    }
}

impl Default for AssertionConfig {
    fn default() -> Self {
        Self {
            not_before_secs: default_not_before_secs(),
            not_on_or_after_secs: default_not_on_or_after_secs(),
            encrypt_assertions: true,
            sign_responses: true,
        }
    }
}

impl Default for SignaturePolicyConfig {
    fn default() -> Self {
        Self {
            require_signed_requests: true,
            allow_sha1: false,
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            context: default_replay_context(),
            ttl_secs: default_replay_ttl_secs(),
            clock_skew_secs: default_clock_skew_secs(),
        }
    }
}

impl Default for SsoConfig {
    fn default() -> Self {
        Self {
            max_session_age_secs: default_max_session_age_secs(),
        }
    }
}

impl Default for NameIdConfig {
    fn default() -> Self {
        Self {
            default_format: default_name_id_format(),
            email_attribute: default_email_attribute(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_not_before_secs() -> u64 {
    10
}

const fn default_not_on_or_after_secs() -> u64 {
    300
}

fn default_replay_context() -> String {
    "authn-requests".to_string()
}

const fn default_replay_ttl_secs() -> u64 {
    300
}

const fn default_clock_skew_secs() -> u64 {
    30
}

const fn default_max_session_age_secs() -> u64 {
    3600
}

fn default_name_id_format() -> String {
    PERSISTENT_FORMAT.to_string()
}

fn default_email_attribute() -> String {
    "mail".to_string()
}

fn default_authn_contexts() -> Vec<String> {
    vec!["urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport".to_string()]
}

fn default_key_prefix() -> String {
    "idp".to_string()
}
