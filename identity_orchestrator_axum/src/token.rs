use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::{Deserialize, Serialize};

use identity_orchestrator::{IdentityOrchestrator, SessionStatus};

use super::error::IntoResponseError;
use super::types::TokenResponse;

pub(super) fn router() -> Router<IdentityOrchestrator> {
    Router::new()
        .route("/exchange-assertion", post(exchange_assertion))
        .route("/exchange-custom-token", post(exchange_assertion))
        .route("/refresh-token", post(refresh_token))
        .route("/verify-token", post(verify_token))
}

#[derive(Debug, Deserialize)]
struct AssertionRequest {
    #[serde(alias = "custom_token")]
    assertion_token: String,
}

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct VerifyTokenRequest {
    token: String,
}

#[derive(Debug, Serialize)]
struct VerifyTokenResponse {
    valid: bool,
    uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn exchange_assertion(
    State(orchestrator): State<IdentityOrchestrator>,
    Json(request): Json<AssertionRequest>,
) -> Result<Json<TokenResponse>, (StatusCode, String)> {
    orchestrator
        .exchange_assertion(&request.assertion_token)
        .await
        .into_response_error()
        .map(|pair| Json(pair.into()))
}

async fn refresh_token(
    State(orchestrator): State<IdentityOrchestrator>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, (StatusCode, String)> {
    orchestrator
        .refresh(&request.refresh_token)
        .await
        .into_response_error()
        .map(|pair| Json(pair.into()))
}

/// A valid token whose account was deleted is reported, not rejected
async fn verify_token(
    State(orchestrator): State<IdentityOrchestrator>,
    Json(request): Json<VerifyTokenRequest>,
) -> Result<Json<VerifyTokenResponse>, (StatusCode, String)> {
    let status = orchestrator
        .verify_session(&request.token)
        .await
        .into_response_error()?;

    let response = match status {
        SessionStatus::Active { account } => VerifyTokenResponse {
            valid: true,
            uid: account.id,
            email: Some(account.email),
            email_verified: Some(account.email_verified),
            error: None,
        },
        SessionStatus::AccountDeleted { account_id } => VerifyTokenResponse {
            valid: false,
            uid: account_id,
            email: None,
            email_verified: None,
            error: Some("User has been deleted".to_string()),
        },
    };
    Ok(Json(response))
}
