//! IdP metadata endpoint.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};

use super::state::SamlState;

/// GET handler for the IdP metadata.
pub async fn idp_metadata(State(state): State<SamlState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/samlmetadata+xml")],
        state.metadata.to_string(),
    )
}
