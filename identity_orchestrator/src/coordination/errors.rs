//! Error taxonomy exposed by the orchestrator

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::BackendError;
use crate::verifier::TokenVerificationError;

/// Which part of a password login was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialFailure {
    EmailNotFound,
    InvalidPassword,
    /// The backend did not say which part was wrong
    Unspecified,
}

impl CredentialFailure {
    pub fn message(&self) -> &'static str {
        match self {
            Self::EmailNotFound => "Email not found",
            Self::InvalidPassword => "Invalid password",
            Self::Unspecified => "Invalid email or password",
        }
    }
}

/// Stable discriminant of an `IdentityError`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    InvalidToken,
    AuthenticationFailed,
    DuplicateAccount,
    WeakCredential,
    NotFound,
    VerificationRequired,
    ExpiredRefreshToken,
    InvalidRefreshToken,
    AccountLinkRejected,
    BackendUnavailable,
    Backend,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Required configuration is absent or invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Authentication failed: invalid email or password")]
    AuthenticationFailed { reason: CredentialFailure },

    #[error("Email already exists")]
    DuplicateAccount,

    #[error("Password is too weak: {0}")]
    WeakCredential(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Email verification required")]
    VerificationRequired,

    #[error("Refresh token has expired")]
    ExpiredRefreshToken,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    /// A provider link was refused by policy or by a uniqueness conflict
    #[error("Account link rejected: {0}")]
    AccountLinkRejected(String),

    /// The identity backend could not be reached; safe to retry
    #[error("Identity backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Unclassified backend failure
    #[error("Identity backend error: {0}")]
    Backend(String),
}

impl IdentityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::InvalidToken(_) => ErrorKind::InvalidToken,
            Self::AuthenticationFailed { .. } => ErrorKind::AuthenticationFailed,
            Self::DuplicateAccount => ErrorKind::DuplicateAccount,
            Self::WeakCredential(_) => ErrorKind::WeakCredential,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::VerificationRequired => ErrorKind::VerificationRequired,
            Self::ExpiredRefreshToken => ErrorKind::ExpiredRefreshToken,
            Self::InvalidRefreshToken => ErrorKind::InvalidRefreshToken,
            Self::AccountLinkRejected(_) => ErrorKind::AccountLinkRejected,
            Self::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Self::Backend(_) => ErrorKind::Backend,
        }
    }

    /// Only transport-level outages are worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_))
    }

    /// Log the error and return self
    pub fn log(self) -> Self {
        match &self {
            Self::Configuration(msg) => tracing::error!("Configuration error: {}", msg),
            Self::InvalidToken(msg) => tracing::error!("Invalid token: {}", msg),
            Self::AuthenticationFailed { reason } => {
                tracing::error!("Authentication failed: {}", reason.message())
            }
            Self::DuplicateAccount => tracing::error!("Email already exists"),
            Self::WeakCredential(msg) => tracing::error!("Weak credential: {}", msg),
            Self::NotFound(what) => tracing::error!("Not found: {}", what),
            Self::VerificationRequired => tracing::error!("Email verification required"),
            Self::ExpiredRefreshToken => tracing::error!("Refresh token has expired"),
            Self::InvalidRefreshToken => tracing::error!("Invalid refresh token"),
            Self::AccountLinkRejected(msg) => tracing::error!("Account link rejected: {}", msg),
            Self::BackendUnavailable(msg) => {
                tracing::error!("Identity backend unavailable: {}", msg)
            }
            Self::Backend(msg) => tracing::error!("Identity backend error: {}", msg),
        }
        self
    }
}

impl From<BackendError> for IdentityError {
    fn from(err: BackendError) -> Self {
        let error = match err {
            BackendError::NotFound => Self::NotFound("account".to_string()),
            BackendError::EmailNotFound => Self::AuthenticationFailed {
                reason: CredentialFailure::EmailNotFound,
            },
            BackendError::InvalidPassword => Self::AuthenticationFailed {
                reason: CredentialFailure::InvalidPassword,
            },
            BackendError::InvalidCredentials => Self::AuthenticationFailed {
                reason: CredentialFailure::Unspecified,
            },
            BackendError::EmailExists => Self::DuplicateAccount,
            BackendError::WeakPassword(msg) => Self::WeakCredential(msg),
            BackendError::ProviderAlreadyLinked { provider_id, .. } => Self::AccountLinkRejected(
                format!("{provider_id} identity is linked to another account"),
            ),
            BackendError::ProviderSlotTaken { provider_id } => Self::AccountLinkRejected(
                format!("account already has a different {provider_id} identity"),
            ),
            BackendError::InvalidAssertion => {
                Self::InvalidToken("invalid assertion token".to_string())
            }
            BackendError::InvalidAccessToken => {
                Self::InvalidToken("invalid access token".to_string())
            }
            BackendError::RefreshTokenExpired => Self::ExpiredRefreshToken,
            BackendError::InvalidRefreshToken => Self::InvalidRefreshToken,
            BackendError::InvalidVerificationCode => {
                Self::InvalidToken("invalid verification code".to_string())
            }
            BackendError::Configuration(msg) => Self::Configuration(msg),
            BackendError::Unavailable(msg) => Self::BackendUnavailable(msg),
            BackendError::Unexpected(msg) => Self::Backend(msg),
        };
        tracing::debug!("{}", error);
        error
    }
}

impl From<TokenVerificationError> for IdentityError {
    fn from(err: TokenVerificationError) -> Self {
        let error = match err {
            TokenVerificationError::MissingAudience => {
                Self::Configuration("OAuth client id is not configured".to_string())
            }
            TokenVerificationError::JwksFetch(msg) => Self::BackendUnavailable(msg),
            TokenVerificationError::IssuerMismatch(_) => {
                Self::InvalidToken("issuer mismatch".to_string())
            }
            TokenVerificationError::AudienceMismatch(_, _) => {
                Self::InvalidToken("audience mismatch".to_string())
            }
            TokenVerificationError::TokenExpired => Self::InvalidToken("token expired".to_string()),
            TokenVerificationError::NotYetValid(_, _) => {
                Self::InvalidToken("token not yet valid".to_string())
            }
            other => Self::InvalidToken(other.to_string()),
        };
        tracing::debug!("{}", error);
        error
    }
}
