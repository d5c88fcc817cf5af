use async_trait::async_trait;

use super::errors::BackendError;
use super::types::{Account, AppliedVerification, NewAccount, TokenPair};

/// Remote identity store consumed by the orchestrator.
///
/// Every method is an independent remote call with its own failure domain; no
/// two calls are atomic with respect to each other. Implementations must be
/// safe to share between concurrently running tasks.
#[async_trait]
pub trait IdentityBackend: Send + Sync + 'static {
    /// Look an account up by exact email.
    async fn find_by_email(&self, email: &str) -> Result<Account, BackendError>;

    /// Look an account up by its backend id.
    async fn find_by_id(&self, account_id: &str) -> Result<Account, BackendError>;

    /// Create an account. Fails with `EmailExists` when the email is taken and
    /// `WeakPassword` when the password is rejected on strength grounds.
    async fn create_account(&self, new_account: NewAccount) -> Result<Account, BackendError>;

    /// Attach `(provider_id, provider_subject)` to an account.
    async fn link_provider(
        &self,
        account_id: &str,
        provider_id: &str,
        provider_subject: &str,
    ) -> Result<(), BackendError>;

    /// Mint a short-lived, backend-signed token proving control of the account.
    async fn mint_assertion_token(&self, account_id: &str) -> Result<String, BackendError>;

    async fn exchange_password_for_access_token(
        &self,
        email: &str,
        password: &str,
    ) -> Result<TokenPair, BackendError>;

    async fn exchange_assertion_for_access_token(
        &self,
        assertion_token: &str,
    ) -> Result<TokenPair, BackendError>;

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenPair, BackendError>;

    /// Validate an access token and return the id of the account it was issued to.
    async fn verify_access_token(&self, access_token: &str) -> Result<String, BackendError>;

    /// Invalidate every refresh and access token issued to the account so far.
    async fn revoke_all_sessions(&self, account_id: &str) -> Result<(), BackendError>;

    async fn delete_account(&self, account_id: &str) -> Result<(), BackendError>;

    async fn send_verification_email(&self, account_id: &str) -> Result<(), BackendError>;

    /// Apply the code delivered by a verification email.
    async fn apply_verification_code(
        &self,
        code: &str,
    ) -> Result<AppliedVerification, BackendError>;
}
