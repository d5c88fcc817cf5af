use std::sync::Arc;
use std::time::Duration;

use crate::backend::{BackendError, IdentityBackend, NewAccount, PASSWORD_PROVIDER_ID};
use crate::coordination::{IdentityError, dispatch_verification_email};

use super::types::AuthResult;

/// Email/password sign-in and sign-up
#[derive(Clone)]
pub struct PasswordAdapter {
    backend: Arc<dyn IdentityBackend>,
    verification_grace_period: Duration,
}

impl PasswordAdapter {
    pub fn new(backend: Arc<dyn IdentityBackend>, verification_grace_period: Duration) -> Self {
        Self {
            backend,
            verification_grace_period,
        }
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthResult, IdentityError> {
        let tokens = self
            .backend
            .exchange_password_for_access_token(email, password)
            .await?;

        let account = self.backend.find_by_email(email).await.map_err(|e| match e {
            BackendError::NotFound => {
                IdentityError::NotFound(format!("account for {email} vanished after sign-in"))
            }
            other => other.into(),
        })?;

        tracing::debug!("Password sign-in for account {}", account.id);
        Ok(AuthResult {
            account,
            assertion_token: tokens.access_token,
            provider_id: PASSWORD_PROVIDER_ID.to_string(),
        })
    }

    /// Create a password account. The verification email goes out in the
    /// background; the result is returned without waiting for it.
    #[tracing::instrument(skip(self, password))]
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        display_name: Option<String>,
    ) -> Result<AuthResult, IdentityError> {
        let account = self
            .backend
            .create_account(NewAccount {
                email: email.to_string(),
                password: Some(password.to_string()),
                display_name,
                photo_url: None,
                email_verified: false,
            })
            .await?;
        tracing::info!("Created password account {}", account.id);

        let assertion_token = self.backend.mint_assertion_token(&account.id).await?;

        dispatch_verification_email(
            self.backend.clone(),
            account.id.clone(),
            self.verification_grace_period,
        );

        Ok(AuthResult {
            account,
            assertion_token,
            provider_id: PASSWORD_PROVIDER_ID.to_string(),
        })
    }
}
