use serde::Serialize;

use identity_orchestrator::{Account, AuthResult, TokenPair};

/// Public view of an account
#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) uid: String,
    pub(crate) email: String,
    pub(crate) display_name: Option<String>,
    pub(crate) photo_url: Option<String>,
    pub(crate) email_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) provider_uid: Option<String>,
}

impl From<Account> for UserResponse {
    fn from(account: Account) -> Self {
        Self {
            uid: account.id,
            email: account.email,
            display_name: account.display_name,
            photo_url: account.photo_url,
            email_verified: account.email_verified,
            provider: None,
            provider_uid: None,
        }
    }
}

/// A signed-in user and the assertion token to exchange for a session
#[derive(Debug, Serialize)]
pub(crate) struct AuthResponse {
    pub(crate) user: UserResponse,
    pub(crate) token: String,
}

impl From<AuthResult> for AuthResponse {
    fn from(result: AuthResult) -> Self {
        let provider_uid = result
            .account
            .link_for(&result.provider_id)
            .map(|link| link.provider_subject.clone());
        let mut user = UserResponse::from(result.account);
        user.provider = Some(result.provider_id);
        user.provider_uid = provider_uid;

        Self {
            user,
            token: result.assertion_token,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TokenResponse {
    pub(crate) id_token: String,
    pub(crate) refresh_token: String,
    pub(crate) expires_in: u64,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            id_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in_seconds,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct MessageResponse {
    pub(crate) message: String,
}

impl MessageResponse {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct VerificationResponse {
    pub(crate) message: String,
    pub(crate) email_verified: bool,
}
