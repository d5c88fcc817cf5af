use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;

use identity_orchestrator::{
    IdentityOrchestrator, VerificationDispatch, VerificationOutcome, VerificationState,
};

use super::error::IntoResponseError;
use super::types::VerificationResponse;

pub(super) fn router() -> Router<IdentityOrchestrator> {
    Router::new()
        .route("/send-verification-email/{uid}", post(send_verification_email))
        .route("/resend-verification-email", post(resend_verification_email))
        .route("/verify-email", post(verify_email))
        .route("/check-verification/{uid}", get(check_verification))
        .route("/require-verification/{uid}", post(require_verification))
}

#[derive(Debug, Deserialize)]
struct ResendRequest {
    email: String,
}

#[derive(Debug, Deserialize)]
struct VerifyEmailRequest {
    code: String,
}

fn dispatch_response(dispatch: VerificationDispatch) -> VerificationResponse {
    match dispatch {
        VerificationDispatch::Sent => VerificationResponse {
            message: "Verification email sent".to_string(),
            email_verified: false,
        },
        VerificationDispatch::AlreadyVerified => VerificationResponse {
            message: "Email is already verified".to_string(),
            email_verified: true,
        },
    }
}

async fn send_verification_email(
    State(orchestrator): State<IdentityOrchestrator>,
    Path(uid): Path<String>,
) -> Result<Json<VerificationResponse>, (StatusCode, String)> {
    orchestrator
        .send_verification(&uid)
        .await
        .into_response_error()
        .map(|dispatch| Json(dispatch_response(dispatch)))
}

async fn resend_verification_email(
    State(orchestrator): State<IdentityOrchestrator>,
    Json(request): Json<ResendRequest>,
) -> Result<Json<VerificationResponse>, (StatusCode, String)> {
    orchestrator
        .resend_verification(&request.email)
        .await
        .into_response_error()
        .map(|dispatch| Json(dispatch_response(dispatch)))
}

async fn verify_email(
    State(orchestrator): State<IdentityOrchestrator>,
    Json(request): Json<VerifyEmailRequest>,
) -> Result<Json<VerificationResponse>, (StatusCode, String)> {
    let outcome = orchestrator
        .complete_verification(&request.code)
        .await
        .into_response_error()?;

    let message = match outcome {
        VerificationOutcome::Verified(_) => "Email verified successfully",
        VerificationOutcome::AlreadyVerified(_) => "Email is already verified",
    };
    Ok(Json(VerificationResponse {
        message: message.to_string(),
        email_verified: true,
    }))
}

async fn check_verification(
    State(orchestrator): State<IdentityOrchestrator>,
    Path(uid): Path<String>,
) -> Result<Json<VerificationResponse>, (StatusCode, String)> {
    let state = orchestrator
        .check_verification(&uid)
        .await
        .into_response_error()?;

    let response = match state {
        VerificationState::Verified => VerificationResponse {
            message: "Email is verified".to_string(),
            email_verified: true,
        },
        VerificationState::Unverified => VerificationResponse {
            message: "Email is not verified".to_string(),
            email_verified: false,
        },
    };
    Ok(Json(response))
}

async fn require_verification(
    State(orchestrator): State<IdentityOrchestrator>,
    Path(uid): Path<String>,
) -> Result<Json<VerificationResponse>, (StatusCode, String)> {
    orchestrator
        .require_verification(&uid)
        .await
        .into_response_error()?;
    Ok(Json(VerificationResponse {
        message: "Email is verified".to_string(),
        email_verified: true,
    }))
}
