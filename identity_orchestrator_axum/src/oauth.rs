use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;

use identity_orchestrator::{IdentityOrchestrator, OAuthClientConfig};

use super::error::IntoResponseError;
use super::types::AuthResponse;

pub(super) fn router() -> Router<IdentityOrchestrator> {
    Router::new()
        .route("/signin", post(google_signin))
        .route("/config", get(google_config))
}

#[derive(Debug, Deserialize)]
struct GoogleSignInRequest {
    id_token: String,
}

async fn google_signin(
    State(orchestrator): State<IdentityOrchestrator>,
    Json(request): Json<GoogleSignInRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    orchestrator
        .oauth_login(&request.id_token)
        .await
        .into_response_error()
        .map(|result| Json(result.into()))
}

async fn google_config(
    State(orchestrator): State<IdentityOrchestrator>,
) -> Result<Json<OAuthClientConfig>, (StatusCode, String)> {
    orchestrator
        .oauth_client_config()
        .into_response_error()
        .map(Json)
}
