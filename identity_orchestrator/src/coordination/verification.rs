use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::backend::{Account, BackendError, IdentityBackend, VerificationState};

use super::errors::IdentityError;

/// What `send_verification` did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationDispatch {
    /// An email was handed to the background sender
    Sent,
    /// Nothing sent; the account is verified
    AlreadyVerified,
}

/// What applying a verification code did
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    Verified(Account),
    AlreadyVerified(Account),
}

impl VerificationOutcome {
    pub fn account(&self) -> &Account {
        match self {
            Self::Verified(account) | Self::AlreadyVerified(account) => account,
        }
    }
}

/// Send a verification email on a background task.
///
/// The caller never observes the result: failures and timeouts are logged
/// and dropped.
pub(crate) fn dispatch_verification_email(
    backend: Arc<dyn IdentityBackend>,
    account_id: String,
    grace_period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::time::timeout(grace_period, backend.send_verification_email(&account_id))
            .await
        {
            Ok(Ok(())) => tracing::info!("Verification email sent for account {}", account_id),
            Ok(Err(e)) => tracing::warn!(
                "Verification email for account {} not sent: {}",
                account_id,
                e
            ),
            Err(_) => tracing::warn!(
                "Verification email for account {} timed out after {:?}",
                account_id,
                grace_period
            ),
        }
    })
}

fn account_not_found(err: BackendError) -> IdentityError {
    match err {
        BackendError::NotFound => IdentityError::NotFound("account".to_string()),
        other => other.into(),
    }
}

/// The `Unverified -> Verified` email state machine
#[derive(Clone)]
pub struct VerificationWorkflow {
    backend: Arc<dyn IdentityBackend>,
    grace_period: Duration,
}

impl VerificationWorkflow {
    pub fn new(backend: Arc<dyn IdentityBackend>, grace_period: Duration) -> Self {
        Self {
            backend,
            grace_period,
        }
    }

    fn dispatch_for(&self, account: &Account) -> VerificationDispatch {
        if account.email_verified {
            tracing::debug!("Account {} already verified, not sending", account.id);
            return VerificationDispatch::AlreadyVerified;
        }
        dispatch_verification_email(self.backend.clone(), account.id.clone(), self.grace_period);
        VerificationDispatch::Sent
    }

    pub async fn send_verification(
        &self,
        account_id: &str,
    ) -> Result<VerificationDispatch, IdentityError> {
        let account = self
            .backend
            .find_by_id(account_id)
            .await
            .map_err(account_not_found)?;
        Ok(self.dispatch_for(&account))
    }

    pub async fn resend_verification(
        &self,
        email: &str,
    ) -> Result<VerificationDispatch, IdentityError> {
        let account = self
            .backend
            .find_by_email(email)
            .await
            .map_err(account_not_found)?;
        Ok(self.dispatch_for(&account))
    }

    pub async fn complete_verification(
        &self,
        code: &str,
    ) -> Result<VerificationOutcome, IdentityError> {
        let applied = self.backend.apply_verification_code(code).await?;
        if applied.already_verified {
            return Ok(VerificationOutcome::AlreadyVerified(applied.account));
        }
        tracing::info!("Email verified for account {}", applied.account.id);
        Ok(VerificationOutcome::Verified(applied.account))
    }

    pub async fn check_verification(
        &self,
        account_id: &str,
    ) -> Result<VerificationState, IdentityError> {
        let account = self
            .backend
            .find_by_id(account_id)
            .await
            .map_err(account_not_found)?;
        Ok(account.verification_state())
    }

    /// Fails with `VerificationRequired` exactly when the account is unverified
    pub async fn require_verified(&self, account_id: &str) -> Result<(), IdentityError> {
        match self.check_verification(account_id).await? {
            VerificationState::Verified => Ok(()),
            VerificationState::Unverified => Err(IdentityError::VerificationRequired),
        }
    }
}
