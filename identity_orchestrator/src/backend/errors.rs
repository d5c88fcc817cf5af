use thiserror::Error;

/// Failures reported by an identity backend, before classification into `IdentityError`
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Account not found")]
    NotFound,

    #[error("Email not found")]
    EmailNotFound,

    #[error("Invalid password")]
    InvalidPassword,

    /// The backend rejected the login without saying which part was wrong
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Email already exists")]
    EmailExists,

    #[error("Password is too weak: {0}")]
    WeakPassword(String),

    /// The provider subject is already linked, to `owner` when the backend reports it
    #[error("Provider identity already linked: {provider_id}")]
    ProviderAlreadyLinked {
        provider_id: String,
        owner: Option<String>,
    },

    /// The account already holds a different subject for this provider
    #[error("Account already has a {provider_id} link")]
    ProviderSlotTaken { provider_id: String },

    #[error("Invalid assertion token")]
    InvalidAssertion,

    #[error("Invalid access token")]
    InvalidAccessToken,

    #[error("Refresh token has expired")]
    RefreshTokenExpired,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Invalid verification code")]
    InvalidVerificationCode,

    #[error("Backend not configured: {0}")]
    Configuration(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Unexpected backend response: {0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Unexpected(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        Self::Unexpected(format!("Failed to parse backend response: {err}"))
    }
}
