//! Common test fixtures.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use idp_core::IdpConfig;
use idp_crypto::{AssertionDecrypter, SignatureAlgorithm, SigningKey};
use idp_protocol_saml::authn::{
    AuthenticationError, AuthenticationRequirements, UserAuthenticator, VerifiedIdentity,
};
use idp_protocol_saml::handler::AuthnRequestHandler;
use idp_protocol_saml::metadata::IdpMetadataInfo;
use idp_protocol_saml::request::RawAuthnRequest;
use idp_protocol_saml::resolver::InMemoryMetadataResolver;
use idp_protocol_saml::signature::XmlSigner;
use idp_protocol_saml::types::{
    AcsEndpoint, Attribute, AuthnRequest, PeerMetadata, RequestedAttribute, SamlBinding,
};
use idp_protocol_saml::xml::authn_request_xml;

pub const IDP: &str = "https://idp.example.com";
pub const SP: &str = "https://sp.example.com";
pub const ACS: &str = "https://sp.example.com/saml/acs";
pub const PPT: &str = "urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport";

/// Authenticates everybody as the same user.
pub struct StaticAuthenticator;

#[async_trait]
impl UserAuthenticator for StaticAuthenticator {
    async fn authenticate(
        &self,
        _requirements: &AuthenticationRequirements,
        _peer: &PeerMetadata,
    ) -> Result<VerifiedIdentity, AuthenticationError> {
        VerifiedIdentity::builder("uid")
            .attribute(Attribute::single("uid", "alice"))
            .attribute(Attribute::single("mail", "alice@example.com"))
            .attribute(Attribute::single("displayName", "Alice Example"))
            .authn_context(PPT)
            .client_address("203.0.113.9")
            .build()
            .map_err(|e| AuthenticationError::Internal(e.to_string()))
    }
}

/// How the service provider is registered.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeerOptions {
    pub want_assertions_signed: bool,
    pub encrypt_assertions: bool,
}

/// An IdP with a single registered service provider.
pub struct TestIdp {
    pub handler: Arc<AuthnRequestHandler>,
    pub metadata: IdpMetadataInfo,
    pub decrypter: AssertionDecrypter,
    sp_key: Arc<SigningKey>,
}

impl TestIdp {
    pub fn start(options: PeerOptions) -> anyhow::Result<Self> {
        init_tracing();

        let idp_key = Arc::new(SigningKey::generate(SignatureAlgorithm::EcdsaSha256)?);
        let sp_key = Arc::new(SigningKey::generate(SignatureAlgorithm::EcdsaSha256)?);
        let decrypter = AssertionDecrypter::generate()?;

        let mut peer = PeerMetadata::new(SP)
            .with_acs(AcsEndpoint::new(SamlBinding::HttpPost, ACS, 0))
            .with_signing_key(sp_key.key_material())
            .want_assertions_signed(options.want_assertions_signed)
            .with_attribute_consuming_service(
                idp_protocol_saml::types::AttributeConsumingService {
                    index: 0,
                    is_default: true,
                    requested_attributes: vec![
                        RequestedAttribute::required("mail"),
                        RequestedAttribute::new("displayName"),
                    ],
                },
            );
        if options.encrypt_assertions {
            peer = peer.with_encryption_key(decrypter.key_material());
        }

        let config = IdpConfig::new(IDP).encrypt_assertions(options.encrypt_assertions);
        let handler = AuthnRequestHandler::builder(
            config.clone(),
            Arc::new(InMemoryMetadataResolver::with_peers([peer])),
            Arc::new(StaticAuthenticator),
            Arc::clone(&idp_key),
        )
        .name_id_secret(b"integration-secret".to_vec())
        .build()?;
        let metadata = IdpMetadataInfo::new(&config, handler.name_ids(), &idp_key);

        Ok(Self {
            handler: Arc::new(handler),
            metadata,
            decrypter,
            sp_key,
        })
    }

    /// Signs `request` with the SP key and wraps it for the POST binding.
    pub fn signed_post(&self, request: &AuthnRequest) -> anyhow::Result<RawAuthnRequest> {
        let xml = XmlSigner::new(Arc::clone(&self.sp_key)).sign(&authn_request_xml(request), &request.id)?;
        Ok(RawAuthnRequest::post(STANDARD.encode(xml), Some("relay-1".to_string()))
            .with_client_address("198.51.100.20"))
    }
}

/// A fresh request from the test SP.
pub fn request(id: &str) -> AuthnRequest {
    AuthnRequest::with_id(id, SP).issued_at(Utc::now())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("idp_protocol_saml=debug")
        .with_test_writer()
        .try_init();
}
