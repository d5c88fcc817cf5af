use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;

use identity_orchestrator::IdentityOrchestrator;

use super::error::IntoResponseError;
use super::types::{AuthResponse, MessageResponse, UserResponse};

pub(super) fn router() -> Router<IdentityOrchestrator> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/signout/{uid}", post(signout))
        .route("/user/{uid}", get(get_user).delete(delete_user))
}

#[derive(Debug, Deserialize)]
struct SignUpRequest {
    email: String,
    password: String,
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignInRequest {
    email: String,
    password: String,
}

async fn signup(
    State(orchestrator): State<IdentityOrchestrator>,
    Json(request): Json<SignUpRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    orchestrator
        .signup(&request.email, &request.password, request.display_name)
        .await
        .into_response_error()
        .map(|result| Json(result.into()))
}

async fn signin(
    State(orchestrator): State<IdentityOrchestrator>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    orchestrator
        .login(&request.email, &request.password)
        .await
        .into_response_error()
        .map(|result| Json(result.into()))
}

async fn signout(
    State(orchestrator): State<IdentityOrchestrator>,
    Path(uid): Path<String>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    orchestrator
        .revoke_sessions(&uid)
        .await
        .into_response_error()?;
    Ok(Json(MessageResponse::new(
        "User signed out (tokens revoked) successfully",
    )))
}

async fn get_user(
    State(orchestrator): State<IdentityOrchestrator>,
    Path(uid): Path<String>,
) -> Result<Json<UserResponse>, (StatusCode, String)> {
    orchestrator
        .get_account(&uid)
        .await
        .into_response_error()
        .map(|account| Json(account.into()))
}

async fn delete_user(
    State(orchestrator): State<IdentityOrchestrator>,
    Path(uid): Path<String>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    orchestrator.delete_account(&uid).await.into_response_error()?;
    Ok(Json(MessageResponse::new("User deleted successfully")))
}
