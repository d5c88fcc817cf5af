use serde::{Deserialize, Serialize};

use crate::backend::Account;
use crate::verifier::VerifiedClaims;

/// Credentials presented by a caller, tagged by provider kind
#[derive(Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credentials {
    Password { email: String, password: String },
    #[serde(rename = "oauth")]
    OAuth { id_token: String },
}

impl Credentials {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Password { .. } => "password",
            Self::OAuth { .. } => "oauth",
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password { email, .. } => f
                .debug_struct("Password")
                .field("email", email)
                .field("password", &"[redacted]")
                .finish(),
            Self::OAuth { .. } => f
                .debug_struct("OAuth")
                .field("id_token", &"[redacted]")
                .finish(),
        }
    }
}

/// Outcome of a successful authentication
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthResult {
    pub account: Account,
    /// Token the client exchanges at the backend for a session
    pub assertion_token: String,
    pub provider_id: String,
}

/// Provider-independent view of an asserted identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalIdentity {
    pub email: String,
    pub provider_id: String,
    pub provider_subject: String,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

impl CanonicalIdentity {
    pub fn from_claims(provider_id: &str, claims: VerifiedClaims) -> Self {
        Self {
            email: claims.email,
            provider_id: provider_id.to_string(),
            provider_subject: claims.subject,
            email_verified: claims.email_verified,
            display_name: claims.name,
            photo_url: claims.picture,
        }
    }
}
