use chrono::Duration;
use std::env;
use url::Url;

use super::assertion::ServiceAccountKey;
use super::errors::BackendError;
use super::types::RefreshRotation;

pub(super) const DEFAULT_IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub(super) const DEFAULT_SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";
const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 30;

/// Connection and behaviour settings for an identity backend.
///
/// Keys are optional here; a backend call that needs a missing key fails
/// with `BackendError::Configuration`.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub api_key: Option<String>,
    /// Bearer token for privileged account management calls
    pub admin_token: Option<String>,
    pub service_account: Option<ServiceAccountKey>,
    pub identity_toolkit_url: String,
    pub secure_token_url: String,
    pub refresh_rotation: RefreshRotation,
    pub refresh_ttl: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            admin_token: None,
            service_account: None,
            identity_toolkit_url: DEFAULT_IDENTITY_TOOLKIT_URL.to_string(),
            secure_token_url: DEFAULT_SECURE_TOKEN_URL.to_string(),
            refresh_rotation: RefreshRotation::default(),
            refresh_ttl: Duration::days(DEFAULT_REFRESH_TOKEN_TTL_DAYS),
        }
    }
}

fn url_from_env(key: &str, default: &str) -> Result<String, BackendError> {
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    Url::parse(&value)
        .map_err(|e| BackendError::Configuration(format!("Invalid {key} '{value}': {e}")))?;
    Ok(value)
}

impl BackendConfig {
    /// Read settings from the environment.
    ///
    /// `FIREBASE_SERVICE_ACCOUNT_KEY` names a JSON key file. A missing file
    /// leaves the key unset; a file that does not parse is an error.
    pub fn from_env() -> Result<Self, BackendError> {
        let service_account = match env::var("FIREBASE_SERVICE_ACCOUNT_KEY").ok() {
            Some(path) => match std::fs::read_to_string(&path) {
                Ok(json) => Some(ServiceAccountKey::from_json(&json)?),
                Err(e) => {
                    tracing::warn!("Service account key not readable at {}: {}", path, e);
                    None
                }
            },
            None => None,
        };

        let refresh_rotation = match env::var("REFRESH_TOKEN_ROTATION").ok() {
            Some(value) => value.parse()?,
            None => RefreshRotation::default(),
        };

        let refresh_ttl = match env::var("REFRESH_TOKEN_TTL_DAYS").ok() {
            Some(value) => Duration::days(value.parse::<i64>().map_err(|e| {
                BackendError::Configuration(format!("Invalid REFRESH_TOKEN_TTL_DAYS: {e}"))
            })?),
            None => Duration::days(DEFAULT_REFRESH_TOKEN_TTL_DAYS),
        };

        Ok(Self {
            api_key: env::var("FIREBASE_API_KEY").ok(),
            admin_token: env::var("IDENTITY_ADMIN_TOKEN").ok(),
            service_account,
            identity_toolkit_url: url_from_env(
                "IDENTITY_TOOLKIT_URL",
                DEFAULT_IDENTITY_TOOLKIT_URL,
            )?,
            secure_token_url: url_from_env("SECURE_TOKEN_URL", DEFAULT_SECURE_TOKEN_URL)?,
            refresh_rotation,
            refresh_ttl,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(token.into());
        self
    }

    pub fn with_service_account(mut self, key: ServiceAccountKey) -> Self {
        self.service_account = Some(key);
        self
    }

    pub fn with_identity_toolkit_url(mut self, url: impl Into<String>) -> Self {
        self.identity_toolkit_url = url.into();
        self
    }

    pub fn with_secure_token_url(mut self, url: impl Into<String>) -> Self {
        self.secure_token_url = url.into();
        self
    }

    pub fn with_refresh_rotation(mut self, rotation: RefreshRotation) -> Self {
        self.refresh_rotation = rotation;
        self
    }

    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }
}
