//! SAML router configuration.

use axum::{routing::get, Router};

use super::metadata::idp_metadata;
use super::sso::{sso_post, sso_redirect};
use super::state::SamlState;
use crate::metadata::SSO_PATH;

/// Path of the metadata endpoint.
pub const METADATA_PATH: &str = "/saml/metadata";

/// Creates the SAML protocol router.
///
/// | Method   | Path              | Handler        |
/// |----------|-------------------|----------------|
/// | GET      | `/saml/metadata`  | `idp_metadata` |
/// | GET/POST | `/saml/sso`       | `sso_*`        |
pub fn saml_router() -> Router<SamlState> {
    Router::new()
        .route(METADATA_PATH, get(idp_metadata))
        .route(SSO_PATH, get(sso_redirect).post(sso_post))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use chrono::{Duration, Utc};
    use http_body_util::BodyExt;
    use idp_core::IdpConfig;
    use idp_crypto::{SignatureAlgorithm, SigningKey};
    use tower::ServiceExt;

    use super::*;
    use crate::authn::{
        AuthenticationError, AuthenticationRequirements, InMemorySessionStore, UserAuthenticator,
        VerifiedIdentity,
    };
    use crate::bindings::HttpRedirectBinding;
    use crate::handler::AuthnRequestHandler;
    use crate::metadata::IdpMetadataInfo;
    use crate::resolver::InMemoryMetadataResolver;
    use crate::types::{AcsEndpoint, Attribute, AuthnRequest, PeerMetadata, SamlBinding};
    use crate::xml::authn_request_xml;

    const SP: &str = "https://sp.example.com";
    const ACS: &str = "https://sp.example.com/acs";

    struct Alice;

    #[async_trait]
    impl UserAuthenticator for Alice {
        async fn authenticate(
            &self,
            _requirements: &AuthenticationRequirements,
            _peer: &PeerMetadata,
        ) -> Result<VerifiedIdentity, AuthenticationError> {
            VerifiedIdentity::builder("uid")
                .attribute(Attribute::single("uid", "alice"))
                .authn_context("urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport")
                .build()
                .map_err(|e| AuthenticationError::Internal(e.to_string()))
        }
    }

    fn app() -> Router {
        let config = IdpConfig::new("https://idp.example.com")
            .require_signed_requests(false)
            .encrypt_assertions(false);
        let key = Arc::new(SigningKey::generate(SignatureAlgorithm::EcdsaSha256).unwrap());
        let peer = PeerMetadata::new(SP)
            .with_acs(AcsEndpoint::new(SamlBinding::HttpPost, ACS, 0))
            .with_acs(AcsEndpoint::new(SamlBinding::HttpRedirect, "https://sp.example.com/acs-redirect", 1));
        let handler = AuthnRequestHandler::builder(
            config.clone(),
            Arc::new(InMemoryMetadataResolver::with_peers([peer])),
            Arc::new(Alice),
            Arc::clone(&key),
        )
        .name_id_secret(b"secret".to_vec())
        .build()
        .unwrap();
        let metadata = IdpMetadataInfo::new(&config, handler.name_ids(), &key);
        saml_router().with_state(SamlState::new(
            Arc::new(handler),
            &metadata,
            Arc::new(InMemorySessionStore::new(Duration::hours(1))),
        ))
    }

    fn request(id: &str) -> AuthnRequest {
        AuthnRequest::with_id(id, SP).issued_at(Utc::now())
    }

    fn post_request(request: &AuthnRequest, cookie: Option<&str>) -> Request<Body> {
        let body = format!(
            "SAMLRequest={}&RelayState=rs",
            urlencoding::encode(&STANDARD.encode(authn_request_xml(request)))
        );
        let mut builder = Request::builder()
            .method("POST")
            .uri(SSO_PATH)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn metadata_is_served() {
        let response = app()
            .oneshot(Request::get(METADATA_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/samlmetadata+xml"
        );
        assert!(body_text(response).await.contains(r#"entityID="https://idp.example.com""#));
    }

    #[tokio::test]
    async fn post_binding_answers_with_form_and_session() {
        let app = app();
        let response = app
            .clone()
            .oneshot(post_request(&request("_first"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("idp_session="));
        let html = body_text(response).await;
        assert!(html.contains(&format!(r#"action="{ACS}""#)));
        assert!(html.contains(r#"name="RelayState" value="rs""#));

        // the session answers a passive request
        let response = app
            .oneshot(post_request(&request("_second").is_passive(true), Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert!(body_text(response).await.contains(r#"name="SAMLResponse""#));
    }

    #[tokio::test]
    async fn redirect_binding_to_redirect_acs() {
        let request = request("_redir")
            .with_acs_url("https://sp.example.com/acs-redirect")
            .with_binding(SamlBinding::HttpRedirect);
        let location = HttpRedirectBinding::encode_request(&authn_request_xml(&request), SSO_PATH, None)
            .unwrap();

        let response = app()
            .oneshot(Request::get(location).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let target = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(target.starts_with("https://sp.example.com/acs-redirect?SAMLResponse="));
    }

    #[tokio::test]
    async fn local_faults_are_generic_errors() {
        let response = app()
            .oneshot(post_request(
                &AuthnRequest::with_id("_x", "https://unknown.example.com").issued_at(Utc::now()),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let html = body_text(response).await;
        assert!(!html.contains("unknown.example.com"));

        let response = app()
            .oneshot(
                Request::post(SSO_PATH)
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("RelayState=x"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
