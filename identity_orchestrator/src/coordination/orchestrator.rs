use serde::Serialize;
use std::sync::Arc;

use crate::backend::{Account, BackendError, IdentityBackend, TokenPair, VerificationState};
use crate::config::OrchestratorConfig;
use crate::provider::{AuthResult, Credentials, OAuthAdapter, PasswordAdapter, ProviderAdapter};
use crate::verifier::{JwksKeySource, KeySource, TokenVerifier};

use super::errors::IdentityError;
use super::reconcile::Reconciler;
use super::verification::{VerificationDispatch, VerificationOutcome, VerificationWorkflow};

const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URI: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

/// State of the session behind an access token
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionStatus {
    Active { account: Account },
    /// The token is genuine but its account has since been deleted
    AccountDeleted { account_id: String },
}

/// Public OAuth client settings a frontend needs to start Google sign-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub userinfo_uri: String,
}

struct OrchestratorInner {
    backend: Arc<dyn IdentityBackend>,
    config: OrchestratorConfig,
    password: PasswordAdapter,
    oauth: OAuthAdapter,
    verification: VerificationWorkflow,
}

/// Entry point for every identity operation.
///
/// Cheap to clone; clones share the backend and configuration.
#[derive(Clone)]
pub struct IdentityOrchestrator {
    inner: Arc<OrchestratorInner>,
}

fn not_found(what: &str) -> impl FnOnce(BackendError) -> IdentityError + '_ {
    move |err| match err {
        BackendError::NotFound => IdentityError::NotFound(what.to_string()),
        other => other.into(),
    }
}

impl IdentityOrchestrator {
    /// Build an orchestrator that fetches ID token keys from `config.jwks_url`
    pub fn new(backend: Arc<dyn IdentityBackend>, config: OrchestratorConfig) -> Self {
        let key_source = Arc::new(JwksKeySource::new(config.jwks_url.clone()));
        Self::with_key_source(backend, config, key_source)
    }

    pub fn with_key_source(
        backend: Arc<dyn IdentityBackend>,
        config: OrchestratorConfig,
        key_source: Arc<dyn KeySource>,
    ) -> Self {
        let verifier =
            TokenVerifier::new(key_source).with_accepted_issuers(config.accepted_issuers.clone());
        let reconciler = Reconciler::new(backend.clone(), &config);

        let password = PasswordAdapter::new(backend.clone(), config.verification_grace_period);
        let oauth = OAuthAdapter::new(
            backend.clone(),
            verifier,
            config.oauth_client_id.clone(),
            reconciler,
        );
        let verification =
            VerificationWorkflow::new(backend.clone(), config.verification_grace_period);

        tracing::info!(
            "Identity orchestrator ready (linking policy: {})",
            config.linking_policy.as_str()
        );

        Self {
            inner: Arc::new(OrchestratorInner {
                backend,
                config,
                password,
                oauth,
                verification,
            }),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Dispatch credentials to the adapter of their kind
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<AuthResult, IdentityError> {
        let adapter = match credentials {
            Credentials::Password { .. } => ProviderAdapter::Password(self.inner.password.clone()),
            Credentials::OAuth { .. } => ProviderAdapter::OAuth(self.inner.oauth.clone()),
        };
        adapter.authenticate(credentials).await
    }

    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        display_name: Option<String>,
    ) -> Result<AuthResult, IdentityError> {
        self.inner
            .password
            .signup(email, password, display_name)
            .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResult, IdentityError> {
        self.inner.password.authenticate(email, password).await
    }

    pub async fn oauth_login(&self, id_token: &str) -> Result<AuthResult, IdentityError> {
        self.inner.oauth.authenticate(id_token).await
    }

    pub async fn exchange_assertion(&self, assertion_token: &str) -> Result<TokenPair, IdentityError> {
        Ok(self
            .inner
            .backend
            .exchange_assertion_for_access_token(assertion_token)
            .await?)
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, IdentityError> {
        Ok(self.inner.backend.refresh_access_token(refresh_token).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn revoke_sessions(&self, account_id: &str) -> Result<(), IdentityError> {
        self.inner
            .backend
            .revoke_all_sessions(account_id)
            .await
            .map_err(not_found("account"))?;
        tracing::info!("Revoked all sessions of account {}", account_id);
        Ok(())
    }

    pub async fn get_account(&self, account_id: &str) -> Result<Account, IdentityError> {
        self.inner
            .backend
            .find_by_id(account_id)
            .await
            .map_err(not_found("account"))
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_account(&self, account_id: &str) -> Result<(), IdentityError> {
        self.inner
            .backend
            .delete_account(account_id)
            .await
            .map_err(not_found("account"))?;
        tracing::info!("Deleted account {}", account_id);
        Ok(())
    }

    pub async fn send_verification(
        &self,
        account_id: &str,
    ) -> Result<VerificationDispatch, IdentityError> {
        self.inner.verification.send_verification(account_id).await
    }

    pub async fn resend_verification(
        &self,
        email: &str,
    ) -> Result<VerificationDispatch, IdentityError> {
        self.inner.verification.resend_verification(email).await
    }

    pub async fn complete_verification(
        &self,
        code: &str,
    ) -> Result<VerificationOutcome, IdentityError> {
        self.inner.verification.complete_verification(code).await
    }

    pub async fn check_verification(
        &self,
        account_id: &str,
    ) -> Result<VerificationState, IdentityError> {
        self.inner.verification.check_verification(account_id).await
    }

    pub async fn require_verification(&self, account_id: &str) -> Result<(), IdentityError> {
        self.inner.verification.require_verified(account_id).await
    }

    /// Validate a backend access token and confirm its account still exists
    pub async fn verify_session(&self, access_token: &str) -> Result<SessionStatus, IdentityError> {
        let account_id = self.inner.backend.verify_access_token(access_token).await?;

        match self.inner.backend.find_by_id(&account_id).await {
            Ok(account) => Ok(SessionStatus::Active { account }),
            Err(BackendError::NotFound) => {
                tracing::debug!("Access token names deleted account {}", account_id);
                Ok(SessionStatus::AccountDeleted { account_id })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn oauth_client_config(&self) -> Result<OAuthClientConfig, IdentityError> {
        let client_id = self.inner.config.oauth_client_id.clone().ok_or_else(|| {
            IdentityError::Configuration("OAuth client id is not configured".to_string())
        })?;

        Ok(OAuthClientConfig {
            client_id,
            auth_uri: GOOGLE_AUTH_URI.to_string(),
            token_uri: GOOGLE_TOKEN_URI.to_string(),
            userinfo_uri: GOOGLE_USERINFO_URI.to_string(),
        })
    }
}
