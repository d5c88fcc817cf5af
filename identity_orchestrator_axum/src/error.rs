use http::StatusCode;
use identity_orchestrator::IdentityError;

/// Helper trait for converting errors to a standard response error format
pub trait IntoResponseError<T> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)>;
}

/// Maps each failure kind onto the status code a client sees
impl<T> IntoResponseError<T> for Result<T, IdentityError> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)> {
        self.map_err(|e| {
            let status = match e {
                IdentityError::InvalidToken(_)
                | IdentityError::ExpiredRefreshToken
                | IdentityError::InvalidRefreshToken => StatusCode::UNAUTHORIZED,
                IdentityError::AuthenticationFailed { .. }
                | IdentityError::DuplicateAccount
                | IdentityError::WeakCredential(_) => StatusCode::BAD_REQUEST,
                IdentityError::NotFound(_) => StatusCode::NOT_FOUND,
                IdentityError::VerificationRequired => StatusCode::FORBIDDEN,
                IdentityError::AccountLinkRejected(_) => StatusCode::CONFLICT,
                IdentityError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                IdentityError::Configuration(_) | IdentityError::Backend(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            let message = match &e {
                IdentityError::AuthenticationFailed { reason } => reason.message().to_string(),
                other => other.to_string(),
            };
            (status, message)
        })
    }
}
