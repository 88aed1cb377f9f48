//! Single Sign-On endpoint.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts, RawQuery, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tracing::{debug, error};

use crate::error::{UnrecoverableError, UnrecoverableKind};
use crate::handler::Outcome;
use crate::request::RawAuthnRequest;
use crate::sender::Delivery;

use super::state::{SamlState, SESSION_COOKIE};

/// Form data for the HTTP-POST binding.
#[derive(Debug, Deserialize)]
pub struct SsoPostForm {
    /// The SAML request (base64-encoded).
    #[serde(rename = "SAMLRequest")]
    pub saml_request: Option<String>,

    /// Relay state.
    #[serde(rename = "RelayState")]
    pub relay_state: Option<String>,
}

/// IP address of the connected client, when the server provides it.
#[derive(Debug, Clone, Default)]
pub struct ClientAddress(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for ClientAddress {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip().to_string()),
        ))
    }
}

/// GET handler for the SSO endpoint (HTTP-Redirect binding).
///
/// The query is passed on undecoded, a detached signature covers its raw
/// octets.
pub async fn sso_redirect(
    State(state): State<SamlState>,
    ClientAddress(address): ClientAddress,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let Some(query) = query else {
        return error_page(&UnrecoverableError::new(
            UnrecoverableKind::InvalidAuthnRequestFormat,
            "SAMLRequest parameter required",
        ));
    };
    process(&state, RawAuthnRequest::redirect(query), address, &headers).await
}

/// POST handler for the SSO endpoint (HTTP-POST binding).
pub async fn sso_post(
    State(state): State<SamlState>,
    ClientAddress(address): ClientAddress,
    headers: HeaderMap,
    Form(form): Form<SsoPostForm>,
) -> Response {
    let Some(saml_request) = form.saml_request else {
        return error_page(&UnrecoverableError::new(
            UnrecoverableKind::InvalidAuthnRequestFormat,
            "SAMLRequest parameter required",
        ));
    };
    process(
        &state,
        RawAuthnRequest::post(saml_request, form.relay_state),
        address,
        &headers,
    )
    .await
}

async fn process(
    state: &SamlState,
    mut raw: RawAuthnRequest,
    address: Option<String>,
    headers: &HeaderMap,
) -> Response {
    if let Some(address) = address {
        raw = raw.with_client_address(address);
    }
    if let Some(key) = session_key(headers) {
        if let Some(identity) = state.sessions.load(key).await {
            debug!("found SSO session");
            raw = raw.with_sso_session(identity);
        }
    }

    let (response, session) = match state.handler.handle(raw).await {
        Outcome::Success { response, session } => (response, session),
        Outcome::ErrorResponse { response, .. } => (response, None),
        Outcome::LocalFault(fault) => return error_page(&fault),
    };

    let delivery = match state.sender.encode(&response) {
        Ok(delivery) => delivery,
        Err(err) => {
            error!(error = %err, "response could not be encoded");
            return error_page(&UnrecoverableError::internal(err.to_string()));
        }
    };
    let mut http = match delivery {
        Delivery::Post { html } => Html(html).into_response(),
        Delivery::Redirect { location } => Redirect::to(&location).into_response(),
    };

    if let Some(identity) = session {
        let key = idp_crypto::random_base64url(32);
        state.sessions.store(&key, identity).await;
        let cookie = format!("{SESSION_COOKIE}={key}; Path=/saml; HttpOnly; Secure; SameSite=None");
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                http.headers_mut().insert(header::SET_COOKIE, value);
            }
            Err(e) => error!(error = %e, "session cookie rejected"),
        }
    }
    http
}

/// Extracts the session key from the `Cookie` headers.
fn session_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// Renders a local fault. Only the generic description is shown.
fn error_page(fault: &UnrecoverableError) -> Response {
    let status =
        StatusCode::from_u16(fault.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Login error</title></head>
<body>
<h1>Login error</h1>
<p>{}</p>
</body>
</html>"#,
        fault.kind().description()
    );
    (status, Html(html)).into_response()
}
