mod oauth;
mod password;
mod types;

pub use oauth::OAuthAdapter;
pub use password::PasswordAdapter;
pub use types::{AuthResult, CanonicalIdentity, Credentials};

use crate::backend::{GOOGLE_PROVIDER_ID, PASSWORD_PROVIDER_ID};
use crate::coordination::IdentityError;

/// The closed set of credential verifiers
#[derive(Clone)]
pub enum ProviderAdapter {
    Password(PasswordAdapter),
    OAuth(OAuthAdapter),
}

impl ProviderAdapter {
    pub fn provider_id(&self) -> &'static str {
        match self {
            Self::Password(_) => PASSWORD_PROVIDER_ID,
            Self::OAuth(_) => GOOGLE_PROVIDER_ID,
        }
    }

    pub async fn authenticate(&self, credentials: &Credentials) -> Result<AuthResult, IdentityError> {
        match (self, credentials) {
            (Self::Password(adapter), Credentials::Password { email, password }) => {
                adapter.authenticate(email, password).await
            }
            (Self::OAuth(adapter), Credentials::OAuth { id_token }) => {
                adapter.authenticate(id_token).await
            }
            (adapter, credentials) => Err(IdentityError::Configuration(format!(
                "{} adapter cannot handle {} credentials",
                adapter.provider_id(),
                credentials.kind()
            ))
            .log()),
        }
    }
}
