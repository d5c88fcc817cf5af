use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;

use super::assertion::sign_assertion;
use super::client::IdentityBackend;
use super::config::BackendConfig;
use super::errors::BackendError;
use super::types::{
    Account, AppliedVerification, NewAccount, PASSWORD_PROVIDER_ID, ProviderLink, TokenPair,
};

const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderUserInfo {
    provider_id: String,
    #[serde(default)]
    raw_id: Option<String>,
    #[serde(default)]
    federated_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRecord {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    provider_user_info: Vec<ProviderUserInfo>,
}

impl From<UserRecord> for Account {
    fn from(record: UserRecord) -> Self {
        let linked_providers = record
            .provider_user_info
            .into_iter()
            .filter_map(|info| {
                let subject = info.raw_id.or(info.federated_id)?;
                Some(ProviderLink::new(info.provider_id, subject))
            })
            .collect();

        Account {
            id: record.local_id,
            email: record.email.unwrap_or_default(),
            display_name: record.display_name,
            photo_url: record.photo_url,
            email_verified: record.email_verified,
            linked_providers,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<UserRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    local_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

impl From<SignInResponse> for TokenPair {
    fn from(response: SignInResponse) -> Self {
        TokenPair {
            access_token: response.id_token,
            refresh_token: response.refresh_token,
            expires_in_seconds: parse_expires_in(response.expires_in.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SecureTokenResponse {
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OobApplyResponse {
    #[serde(default)]
    local_id: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

fn parse_expires_in(value: Option<&str>) -> u64 {
    value
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_EXPIRES_IN_SECS)
}

/// Map an error response of the identity REST API onto `BackendError`.
///
/// Messages look like `CODE` or `CODE : human readable detail`.
pub(crate) fn classify_error(status: StatusCode, message: &str) -> BackendError {
    let (code, detail) = match message.split_once(" : ") {
        Some((code, detail)) => (code.trim(), Some(detail.trim())),
        None => (message.trim(), None),
    };

    match code {
        "EMAIL_NOT_FOUND" => BackendError::EmailNotFound,
        "INVALID_PASSWORD" => BackendError::InvalidPassword,
        "INVALID_LOGIN_CREDENTIALS" => BackendError::InvalidCredentials,
        "EMAIL_EXISTS" | "DUPLICATE_EMAIL" => BackendError::EmailExists,
        "WEAK_PASSWORD" => {
            BackendError::WeakPassword(detail.unwrap_or("Password is too weak").to_string())
        }
        "USER_NOT_FOUND" => BackendError::NotFound,
        "FEDERATED_USER_ID_ALREADY_LINKED" => BackendError::ProviderAlreadyLinked {
            provider_id: String::new(),
            owner: None,
        },
        "INVALID_CUSTOM_TOKEN" | "CREDENTIAL_MISMATCH" => BackendError::InvalidAssertion,
        "TOKEN_EXPIRED" => BackendError::RefreshTokenExpired,
        "INVALID_REFRESH_TOKEN" => BackendError::InvalidRefreshToken,
        "INVALID_ID_TOKEN" | "USER_DISABLED" => BackendError::InvalidAccessToken,
        "INVALID_OOB_CODE" | "EXPIRED_OOB_CODE" => BackendError::InvalidVerificationCode,
        _ if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS => {
            BackendError::Unavailable(format!("{status}: {message}"))
        }
        _ => BackendError::Unexpected(format!("{status}: {message}")),
    }
}

async fn read_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, BackendError> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        return Ok(serde_json::from_str(&body)?);
    }

    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_default();
    tracing::debug!("Identity backend error: status={}, message={}", status, message);
    Err(classify_error(status, &message))
}

/// Identity backend speaking the Identity Toolkit REST protocol.
///
/// Public calls (sign-in, token refresh, code application) authenticate with
/// the API key; account management calls use the admin bearer token.
/// Assertion tokens are signed locally with the service account key.
pub struct HttpIdentityBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpIdentityBackend {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(32)
            .build()
            .map_err(|e| BackendError::Configuration(format!("Failed to build client: {e}")))?;
        Ok(Self { client, config })
    }

    fn api_key(&self) -> Result<&str, BackendError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| BackendError::Configuration("API key is not configured".to_string()))
    }

    fn admin_token(&self) -> Result<&str, BackendError> {
        self.config.admin_token.as_deref().ok_or_else(|| {
            BackendError::Configuration("Admin token is not configured".to_string())
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/accounts:{}",
            self.config.identity_toolkit_url.trim_end_matches('/'),
            method
        )
    }

    async fn call_public<T: DeserializeOwned>(
        &self,
        method: &str,
        body: Value,
    ) -> Result<T, BackendError> {
        let api_key = self.api_key()?;
        let response = self
            .client
            .post(self.endpoint(method))
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;
        read_response(response).await
    }

    async fn call_admin<T: DeserializeOwned>(
        &self,
        method: &str,
        body: Value,
    ) -> Result<T, BackendError> {
        let token = self.admin_token()?;
        let response = self
            .client
            .post(self.endpoint(method))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        read_response(response).await
    }

    async fn lookup(&self, body: Value) -> Result<Account, BackendError> {
        let response: LookupResponse = self.call_admin("lookup", body).await?;
        response
            .users
            .into_iter()
            .next()
            .map(Account::from)
            .ok_or(BackendError::NotFound)
    }
}

#[async_trait]
impl IdentityBackend for HttpIdentityBackend {
    async fn find_by_email(&self, email: &str) -> Result<Account, BackendError> {
        self.lookup(json!({ "email": [email] })).await
    }

    async fn find_by_id(&self, account_id: &str) -> Result<Account, BackendError> {
        self.lookup(json!({ "localId": [account_id] })).await
    }

    #[tracing::instrument(skip(self, new_account), fields(email = %new_account.email))]
    async fn create_account(&self, new_account: NewAccount) -> Result<Account, BackendError> {
        let mut body = json!({
            "email": new_account.email,
            "emailVerified": new_account.email_verified,
        });
        if let Some(password) = &new_account.password {
            body["password"] = json!(password);
        }
        if let Some(display_name) = &new_account.display_name {
            body["displayName"] = json!(display_name);
        }
        if let Some(photo_url) = &new_account.photo_url {
            body["photoUrl"] = json!(photo_url);
        }

        let response: SignUpResponse = self.call_admin("signUp", body).await?;

        let linked_providers = match new_account.password {
            Some(_) => vec![ProviderLink::new(
                PASSWORD_PROVIDER_ID,
                new_account.email.clone(),
            )],
            None => Vec::new(),
        };

        Ok(Account {
            id: response.local_id,
            email: new_account.email,
            display_name: new_account.display_name,
            photo_url: new_account.photo_url,
            email_verified: new_account.email_verified,
            linked_providers,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn link_provider(
        &self,
        account_id: &str,
        provider_id: &str,
        provider_subject: &str,
    ) -> Result<(), BackendError> {
        let account = self.find_by_id(account_id).await?;
        if account.has_link(provider_id, provider_subject) {
            return Ok(());
        }
        if account.link_for(provider_id).is_some() {
            return Err(BackendError::ProviderSlotTaken {
                provider_id: provider_id.to_string(),
            });
        }

        let body = json!({
            "localId": account_id,
            "linkProviderUserInfo": {
                "providerId": provider_id,
                "rawId": provider_subject,
            },
        });
        self.call_admin::<Value>("update", body)
            .await
            .map_err(|e| match e {
                BackendError::ProviderAlreadyLinked { owner, .. } => {
                    BackendError::ProviderAlreadyLinked {
                        provider_id: provider_id.to_string(),
                        owner,
                    }
                }
                other => other,
            })?;
        Ok(())
    }

    async fn mint_assertion_token(&self, account_id: &str) -> Result<String, BackendError> {
        let key = self.config.service_account.as_ref().ok_or_else(|| {
            BackendError::Configuration("Service account key is not configured".to_string())
        })?;
        sign_assertion(key, account_id)
    }

    #[tracing::instrument(skip(self, password))]
    async fn exchange_password_for_access_token(
        &self,
        email: &str,
        password: &str,
    ) -> Result<TokenPair, BackendError> {
        let body = json!({
            "email": email,
            "password": password,
            "returnSecureToken": true,
        });
        let response: SignInResponse = self.call_public("signInWithPassword", body).await?;
        Ok(response.into())
    }

    async fn exchange_assertion_for_access_token(
        &self,
        assertion_token: &str,
    ) -> Result<TokenPair, BackendError> {
        let body = json!({
            "token": assertion_token,
            "returnSecureToken": true,
        });
        let response: SignInResponse = self.call_public("signInWithCustomToken", body).await?;
        Ok(response.into())
    }

    #[tracing::instrument(skip(self, refresh_token))]
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenPair, BackendError> {
        let api_key = self.api_key()?;
        let response = self
            .client
            .post(self.config.secure_token_url.as_str())
            .query(&[("key", api_key)])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        let response: SecureTokenResponse = read_response(response).await?;
        Ok(TokenPair {
            access_token: response.id_token,
            refresh_token: response.refresh_token,
            expires_in_seconds: parse_expires_in(response.expires_in.as_deref()),
        })
    }

    async fn verify_access_token(&self, access_token: &str) -> Result<String, BackendError> {
        let response: LookupResponse = self
            .call_public("lookup", json!({ "idToken": access_token }))
            .await
            .map_err(|e| match e {
                BackendError::RefreshTokenExpired | BackendError::NotFound => {
                    BackendError::InvalidAccessToken
                }
                other => other,
            })?;

        response
            .users
            .into_iter()
            .next()
            .map(|user| user.local_id)
            .ok_or(BackendError::InvalidAccessToken)
    }

    #[tracing::instrument(skip(self))]
    async fn revoke_all_sessions(&self, account_id: &str) -> Result<(), BackendError> {
        let body = json!({
            "localId": account_id,
            "validSince": Utc::now().timestamp().to_string(),
        });
        self.call_admin::<Value>("update", body).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_account(&self, account_id: &str) -> Result<(), BackendError> {
        self.call_admin::<Value>("delete", json!({ "localId": account_id }))
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn send_verification_email(&self, account_id: &str) -> Result<(), BackendError> {
        let account = self.find_by_id(account_id).await?;
        let body = json!({
            "requestType": "VERIFY_EMAIL",
            "email": account.email,
        });
        self.call_admin::<Value>("sendOobCode", body).await?;
        Ok(())
    }

    async fn apply_verification_code(
        &self,
        code: &str,
    ) -> Result<AppliedVerification, BackendError> {
        let response: OobApplyResponse = self
            .call_public("update", json!({ "oobCode": code }))
            .await?;

        let account = match (response.local_id, response.email) {
            (Some(id), _) => self.find_by_id(&id).await?,
            (None, Some(email)) => self.find_by_email(&email).await?,
            (None, None) => {
                return Err(BackendError::Unexpected(
                    "Verification response names no account".to_string(),
                ));
            }
        };

        // The REST API does not report whether the code was applied before
        Ok(AppliedVerification {
            account,
            already_verified: false,
        })
    }
}
