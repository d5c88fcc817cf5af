use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::utils::gen_random_string;

use super::client::IdentityBackend;
use super::config::BackendConfig;
use super::errors::BackendError;
use super::types::{
    Account, AppliedVerification, NewAccount, PASSWORD_PROVIDER_ID, ProviderLink, RefreshRotation,
    TokenPair,
};

const ACCESS_TOKEN_TTL_SECS: i64 = 3600;
const ASSERTION_TOKEN_TTL_SECS: i64 = 300;
const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 30;
const DEFAULT_MIN_PASSWORD_LENGTH: usize = 6;
/// Expired refresh tokens still answer `RefreshTokenExpired` for this long
const EXPIRED_REFRESH_RETENTION_HOURS: i64 = 24;

/// A verification email as it would have been delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationMail {
    pub account_id: String,
    pub email: String,
    pub code: String,
}

struct PasswordDigest {
    salt: String,
    digest: Vec<u8>,
}

impl PasswordDigest {
    fn new(password: &str) -> Result<Self, BackendError> {
        let salt = gen_random_string(16).map_err(|e| BackendError::Unexpected(e.to_string()))?;
        let digest = Self::hash(&salt, password);
        Ok(Self { salt, digest })
    }

    fn hash(salt: &str, password: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(password.as_bytes());
        hasher.finalize().to_vec()
    }

    fn matches(&self, password: &str) -> bool {
        Self::hash(&self.salt, password)
            .ct_eq(&self.digest)
            .into()
    }
}

struct StoredAccount {
    account: Account,
    password: Option<PasswordDigest>,
    /// Bumped by `revoke_all_sessions`; tokens from older generations are dead
    session_generation: u64,
}

#[derive(Clone)]
struct IssuedToken {
    account_id: String,
    generation: u64,
    expires_at: DateTime<Utc>,
}

#[derive(Clone)]
struct RefreshEntry {
    account_id: String,
    generation: u64,
    expires_at: DateTime<Utc>,
    /// Refresh token issued when this one was exchanged
    successor: Option<String>,
}

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<String, StoredAccount>,
    email_index: HashMap<String, String>,
    link_index: HashMap<(String, String), String>,
    access_tokens: HashMap<String, IssuedToken>,
    refresh_tokens: HashMap<String, RefreshEntry>,
    assertions: HashMap<String, IssuedToken>,
    verification_codes: HashMap<String, String>,
    outbox: Vec<VerificationMail>,
}

impl MemoryState {
    fn account(&self, account_id: &str) -> Result<&StoredAccount, BackendError> {
        self.accounts.get(account_id).ok_or(BackendError::NotFound)
    }

    /// Drop tokens that can no longer be redeemed: expired ones and ones from
    /// a revoked session generation. Access tokens of deleted accounts stay
    /// until expiry so verification can report the deletion.
    fn prune_tokens(&mut self, now: DateTime<Utc>) {
        let accounts = &self.accounts;
        let live = |account_id: &str, generation: u64| {
            accounts
                .get(account_id)
                .is_some_and(|stored| stored.session_generation == generation)
        };

        self.access_tokens.retain(|_, token| {
            token.expires_at > now
                && accounts
                    .get(&token.account_id)
                    .is_none_or(|stored| stored.session_generation == token.generation)
        });
        self.refresh_tokens.retain(|_, entry| {
            entry.expires_at + Duration::hours(EXPIRED_REFRESH_RETENTION_HOURS) > now
                && live(&entry.account_id, entry.generation)
        });
        self.assertions.retain(|_, assertion| {
            assertion.expires_at > now && live(&assertion.account_id, assertion.generation)
        });
    }

    fn issue_access_token(
        &mut self,
        account_id: &str,
        generation: u64,
    ) -> Result<String, BackendError> {
        let token = random_token(32)?;
        self.access_tokens.insert(
            token.clone(),
            IssuedToken {
                account_id: account_id.to_string(),
                generation,
                expires_at: Utc::now() + Duration::seconds(ACCESS_TOKEN_TTL_SECS),
            },
        );
        Ok(token)
    }

    fn issue_pair(
        &mut self,
        account_id: &str,
        generation: u64,
        refresh_ttl: Duration,
    ) -> Result<TokenPair, BackendError> {
        self.prune_tokens(Utc::now());
        let access_token = self.issue_access_token(account_id, generation)?;
        let refresh_token = random_token(48)?;
        self.refresh_tokens.insert(
            refresh_token.clone(),
            RefreshEntry {
                account_id: account_id.to_string(),
                generation,
                expires_at: Utc::now() + refresh_ttl,
                successor: None,
            },
        );
        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in_seconds: ACCESS_TOKEN_TTL_SECS as u64,
        })
    }

    /// Follow the rotation chain from `token` to the newest refresh token
    fn latest_refresh_token(&self, token: &str) -> String {
        let mut current = token.to_string();
        while let Some(next) = self
            .refresh_tokens
            .get(&current)
            .and_then(|entry| entry.successor.clone())
        {
            current = next;
        }
        current
    }
}

fn random_token(len: usize) -> Result<String, BackendError> {
    gen_random_string(len).map_err(|e| BackendError::Unexpected(e.to_string()))
}

/// In-process identity backend.
///
/// Holds accounts, provider links and issued tokens in memory behind a single
/// async mutex. Used by tests and by the demo server; it enforces the same
/// uniqueness rules a remote identity service does.
pub struct InMemoryBackend {
    state: Mutex<MemoryState>,
    rotation: RefreshRotation,
    refresh_ttl: Duration,
    min_password_length: usize,
    mail_outage: AtomicBool,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        tracing::info!("Creating new in-memory identity backend");
        Self {
            state: Mutex::new(MemoryState::default()),
            rotation: RefreshRotation::default(),
            refresh_ttl: Duration::days(DEFAULT_REFRESH_TOKEN_TTL_DAYS),
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            mail_outage: AtomicBool::new(false),
        }
    }

    /// Take refresh behaviour from a backend config; keys and URLs are unused
    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new()
            .with_refresh_rotation(config.refresh_rotation)
            .with_refresh_ttl(config.refresh_ttl)
    }

    pub fn with_refresh_rotation(mut self, rotation: RefreshRotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    pub fn with_min_password_length(mut self, len: usize) -> Self {
        self.min_password_length = len;
        self
    }

    /// Make verification email delivery fail until switched back off
    pub fn set_mail_outage(&self, outage: bool) {
        self.mail_outage.store(outage, Ordering::SeqCst);
    }

    /// Verification emails delivered to an account, oldest first
    pub async fn sent_verification_mail(&self, account_id: &str) -> Vec<VerificationMail> {
        self.state
            .lock()
            .await
            .outbox
            .iter()
            .filter(|mail| mail.account_id == account_id)
            .cloned()
            .collect()
    }

    pub async fn account_count(&self) -> usize {
        self.state.lock().await.accounts.len()
    }
}

#[async_trait]
impl IdentityBackend for InMemoryBackend {
    async fn find_by_email(&self, email: &str) -> Result<Account, BackendError> {
        let state = self.state.lock().await;
        let account_id = state.email_index.get(email).ok_or(BackendError::NotFound)?;
        Ok(state.account(account_id)?.account.clone())
    }

    async fn find_by_id(&self, account_id: &str) -> Result<Account, BackendError> {
        let state = self.state.lock().await;
        Ok(state.account(account_id)?.account.clone())
    }

    #[tracing::instrument(skip(self, new_account), fields(email = %new_account.email))]
    async fn create_account(&self, new_account: NewAccount) -> Result<Account, BackendError> {
        let mut state = self.state.lock().await;

        if state.email_index.contains_key(&new_account.email) {
            return Err(BackendError::EmailExists);
        }

        let password = match &new_account.password {
            Some(password) if password.chars().count() < self.min_password_length => {
                return Err(BackendError::WeakPassword(format!(
                    "Password should be at least {} characters",
                    self.min_password_length
                )));
            }
            Some(password) => Some(PasswordDigest::new(password)?),
            None => None,
        };

        let id = Uuid::new_v4().simple().to_string();
        let mut linked_providers = Vec::new();
        if password.is_some() {
            let link = ProviderLink::new(PASSWORD_PROVIDER_ID, new_account.email.clone());
            state.link_index.insert(
                (link.provider_id.clone(), link.provider_subject.clone()),
                id.clone(),
            );
            linked_providers.push(link);
        }

        let account = Account {
            id: id.clone(),
            email: new_account.email.clone(),
            display_name: new_account.display_name,
            photo_url: new_account.photo_url,
            email_verified: new_account.email_verified,
            linked_providers,
        };

        state.email_index.insert(new_account.email, id.clone());
        state.accounts.insert(
            id,
            StoredAccount {
                account: account.clone(),
                password,
                session_generation: 0,
            },
        );

        tracing::debug!(account_id = %account.id, "Account created");
        Ok(account)
    }

    #[tracing::instrument(skip(self))]
    async fn link_provider(
        &self,
        account_id: &str,
        provider_id: &str,
        provider_subject: &str,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        let key = (provider_id.to_string(), provider_subject.to_string());

        if let Some(owner) = state.link_index.get(&key) {
            if owner == account_id {
                return Ok(());
            }
            return Err(BackendError::ProviderAlreadyLinked {
                provider_id: provider_id.to_string(),
                owner: Some(owner.clone()),
            });
        }

        let stored = state
            .accounts
            .get_mut(account_id)
            .ok_or(BackendError::NotFound)?;

        if stored.account.link_for(provider_id).is_some() {
            return Err(BackendError::ProviderSlotTaken {
                provider_id: provider_id.to_string(),
            });
        }

        stored
            .account
            .linked_providers
            .push(ProviderLink::new(provider_id, provider_subject));
        state.link_index.insert(key, account_id.to_string());
        Ok(())
    }

    async fn mint_assertion_token(&self, account_id: &str) -> Result<String, BackendError> {
        let mut state = self.state.lock().await;
        let generation = state.account(account_id)?.session_generation;
        state.prune_tokens(Utc::now());

        let token = random_token(32)?;
        state.assertions.insert(
            token.clone(),
            IssuedToken {
                account_id: account_id.to_string(),
                generation,
                expires_at: Utc::now() + Duration::seconds(ASSERTION_TOKEN_TTL_SECS),
            },
        );
        Ok(token)
    }

    #[tracing::instrument(skip(self, password))]
    async fn exchange_password_for_access_token(
        &self,
        email: &str,
        password: &str,
    ) -> Result<TokenPair, BackendError> {
        let mut state = self.state.lock().await;

        let account_id = state
            .email_index
            .get(email)
            .cloned()
            .ok_or(BackendError::EmailNotFound)?;
        let stored = state.account(&account_id)?;

        let password_ok = stored
            .password
            .as_ref()
            .map(|digest| digest.matches(password))
            .unwrap_or(false);
        if !password_ok {
            return Err(BackendError::InvalidPassword);
        }

        let generation = stored.session_generation;
        state.issue_pair(&account_id, generation, self.refresh_ttl)
    }

    async fn exchange_assertion_for_access_token(
        &self,
        assertion_token: &str,
    ) -> Result<TokenPair, BackendError> {
        let mut state = self.state.lock().await;

        // Assertions are single use
        let assertion = state
            .assertions
            .remove(assertion_token)
            .ok_or(BackendError::InvalidAssertion)?;
        if assertion.expires_at <= Utc::now() {
            return Err(BackendError::InvalidAssertion);
        }

        let generation = state
            .account(&assertion.account_id)
            .map_err(|_| BackendError::InvalidAssertion)?
            .session_generation;
        if generation != assertion.generation {
            return Err(BackendError::InvalidAssertion);
        }

        state.issue_pair(&assertion.account_id, generation, self.refresh_ttl)
    }

    #[tracing::instrument(skip(self, refresh_token))]
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenPair, BackendError> {
        let mut state = self.state.lock().await;

        let entry = state
            .refresh_tokens
            .get(refresh_token)
            .cloned()
            .ok_or(BackendError::InvalidRefreshToken)?;

        if entry.expires_at <= Utc::now() {
            return Err(BackendError::RefreshTokenExpired);
        }

        let generation = state
            .account(&entry.account_id)
            .map_err(|_| BackendError::InvalidRefreshToken)?
            .session_generation;
        if generation != entry.generation {
            return Err(BackendError::InvalidRefreshToken);
        }

        match (entry.successor, self.rotation) {
            (None, _) => {
                let pair = state.issue_pair(&entry.account_id, generation, self.refresh_ttl)?;
                if let Some(used) = state.refresh_tokens.get_mut(refresh_token) {
                    used.successor = Some(pair.refresh_token.clone());
                }
                Ok(pair)
            }
            (Some(_), RefreshRotation::Rotate) => {
                tracing::warn!("Rotated-out refresh token presented again");
                Err(BackendError::InvalidRefreshToken)
            }
            (Some(_), RefreshRotation::ReissueLatest) => {
                let latest = state.latest_refresh_token(refresh_token);
                let latest_expired = state
                    .refresh_tokens
                    .get(&latest)
                    .map(|e| e.expires_at <= Utc::now())
                    .unwrap_or(true);
                if latest_expired {
                    return Err(BackendError::RefreshTokenExpired);
                }
                let access_token = state.issue_access_token(&entry.account_id, generation)?;
                Ok(TokenPair {
                    access_token,
                    refresh_token: latest,
                    expires_in_seconds: ACCESS_TOKEN_TTL_SECS as u64,
                })
            }
        }
    }

    async fn verify_access_token(&self, access_token: &str) -> Result<String, BackendError> {
        let state = self.state.lock().await;

        let token = state
            .access_tokens
            .get(access_token)
            .ok_or(BackendError::InvalidAccessToken)?;
        if token.expires_at <= Utc::now() {
            return Err(BackendError::InvalidAccessToken);
        }

        // A deleted account's token still names it; the caller reports the deletion
        if let Some(stored) = state.accounts.get(&token.account_id) {
            if stored.session_generation != token.generation {
                return Err(BackendError::InvalidAccessToken);
            }
        }
        Ok(token.account_id.clone())
    }

    #[tracing::instrument(skip(self))]
    async fn revoke_all_sessions(&self, account_id: &str) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        let stored = state
            .accounts
            .get_mut(account_id)
            .ok_or(BackendError::NotFound)?;
        stored.session_generation += 1;
        state.prune_tokens(Utc::now());
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_account(&self, account_id: &str) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        let stored = state
            .accounts
            .remove(account_id)
            .ok_or(BackendError::NotFound)?;

        state.email_index.remove(&stored.account.email);
        for link in &stored.account.linked_providers {
            state
                .link_index
                .remove(&(link.provider_id.clone(), link.provider_subject.clone()));
        }
        state
            .verification_codes
            .retain(|_, owner| owner.as_str() != account_id);
        state.prune_tokens(Utc::now());
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn send_verification_email(&self, account_id: &str) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        let email = state.account(account_id)?.account.email.clone();

        if self.mail_outage.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable(
                "Mail delivery unavailable".to_string(),
            ));
        }

        let code = random_token(24)?;
        state
            .verification_codes
            .insert(code.clone(), account_id.to_string());
        state.outbox.push(VerificationMail {
            account_id: account_id.to_string(),
            email,
            code,
        });
        tracing::info!("Verification email delivered");
        Ok(())
    }

    async fn apply_verification_code(
        &self,
        code: &str,
    ) -> Result<AppliedVerification, BackendError> {
        let mut state = self.state.lock().await;
        let account_id = state
            .verification_codes
            .get(code)
            .cloned()
            .ok_or(BackendError::InvalidVerificationCode)?;

        let stored = state
            .accounts
            .get_mut(&account_id)
            .ok_or(BackendError::NotFound)?;
        let already_verified = stored.account.email_verified;
        stored.account.email_verified = true;

        Ok(AppliedVerification {
            account: stored.account.clone(),
            already_verified,
        })
    }
}
