use serde::{Deserialize, Serialize};

use super::errors::BackendError;

/// Provider id recorded for email/password identities
pub const PASSWORD_PROVIDER_ID: &str = "password";

/// Provider id recorded for Google OAuth identities
pub const GOOGLE_PROVIDER_ID: &str = "google.com";

/// Association between an account and one external identity provider's subject
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderLink {
    /// Provider identifier, e.g. "password" or "google.com"
    pub provider_id: String,
    /// Subject identifier assigned by the provider
    pub provider_subject: String,
}

impl ProviderLink {
    pub fn new(provider_id: impl Into<String>, provider_subject: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            provider_subject: provider_subject.into(),
        }
    }
}

/// Canonical user identity, one per unique email
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Backend-assigned, immutable identifier
    pub id: String,
    /// Email address, compared exactly (no case folding)
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub email_verified: bool,
    pub linked_providers: Vec<ProviderLink>,
}

impl Account {
    pub fn verification_state(&self) -> VerificationState {
        if self.email_verified {
            VerificationState::Verified
        } else {
            VerificationState::Unverified
        }
    }

    /// Whether this exact `(provider_id, provider_subject)` pair is linked
    pub fn has_link(&self, provider_id: &str, provider_subject: &str) -> bool {
        self.linked_providers
            .iter()
            .any(|l| l.provider_id == provider_id && l.provider_subject == provider_subject)
    }

    /// The link held for `provider_id`, if any
    pub fn link_for(&self, provider_id: &str) -> Option<&ProviderLink> {
        self.linked_providers
            .iter()
            .find(|l| l.provider_id == provider_id)
    }
}

/// Email verification state, derived from `Account::email_verified`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationState {
    Unverified,
    Verified,
}

/// Properties of an account to be created by the backend
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub email: String,
    pub password: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub email_verified: bool,
}

/// Access/refresh credentials handed to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in_seconds: u64,
}

/// Result of applying an emailed verification code
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedVerification {
    pub account: Account,
    /// The account was already verified before the code was applied
    pub already_verified: bool,
}

/// How the backend treats reuse of a refresh token that has already been exchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshRotation {
    /// Reusing a rotated-out refresh token fails with `InvalidRefreshToken`
    #[default]
    Rotate,
    /// Reusing a rotated-out refresh token re-issues the latest live pair
    ReissueLatest,
}

impl RefreshRotation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rotate => "rotate",
            Self::ReissueLatest => "reissue_latest",
        }
    }
}

impl std::str::FromStr for RefreshRotation {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rotate" => Ok(Self::Rotate),
            "reissue_latest" => Ok(Self::ReissueLatest),
            _ => Err(BackendError::Configuration(format!(
                "Invalid refresh rotation '{s}'. Must be 'rotate' or 'reissue_latest'."
            ))),
        }
    }
}
