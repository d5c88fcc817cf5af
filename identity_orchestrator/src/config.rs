use std::env;
use std::time::Duration;

use crate::coordination::IdentityError;
use crate::verifier::{GOOGLE_ISSUERS, GOOGLE_JWKS_URL};

const DEFAULT_VERIFICATION_GRACE_SECS: u64 = 10;
const DEFAULT_RECONCILE_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_GOOGLE_OAUTH_CREDS_PATH: &str = "../oauthClientCreds.json";

/// Whether a new provider may be attached to an account found by email
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkingPolicy {
    /// Link only when the asserting provider marks the email verified
    #[default]
    RequireVerifiedEmail,
    /// Link whenever the emails match
    TrustEmailMatch,
}

impl LinkingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequireVerifiedEmail => "require_verified_email",
            Self::TrustEmailMatch => "trust_email_match",
        }
    }
}

impl std::str::FromStr for LinkingPolicy {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "require_verified_email" => Ok(Self::RequireVerifiedEmail),
            "trust_email_match" => Ok(Self::TrustEmailMatch),
            _ => Err(IdentityError::Configuration(format!(
                "Invalid account linking policy '{s}'. Must be 'require_verified_email' or 'trust_email_match'."
            ))),
        }
    }
}

/// Orchestrator settings, fixed at construction
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Expected `aud` of OAuth ID tokens; OAuth login fails without it
    pub oauth_client_id: Option<String>,
    pub accepted_issuers: Vec<String>,
    pub jwks_url: String,
    pub linking_policy: LinkingPolicy,
    /// Copy the provider's `email_verified` onto accounts it creates
    pub trust_provider_email_verification: bool,
    /// Upper bound on a best-effort verification email dispatch
    pub verification_grace_period: Duration,
    pub reconcile_max_attempts: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            oauth_client_id: None,
            accepted_issuers: GOOGLE_ISSUERS.iter().map(|s| s.to_string()).collect(),
            jwks_url: GOOGLE_JWKS_URL.to_string(),
            linking_policy: LinkingPolicy::default(),
            trust_provider_email_verification: true,
            verification_grace_period: Duration::from_secs(DEFAULT_VERIFICATION_GRACE_SECS),
            reconcile_max_attempts: DEFAULT_RECONCILE_MAX_ATTEMPTS,
        }
    }
}

/// Client id from `GOOGLE_OAUTH_CLIENT_ID`, else `web.client_id` of the
/// credentials file named by `GOOGLE_OAUTH_CREDS_PATH`
fn oauth_client_id_from_env() -> Option<String> {
    if let Ok(client_id) = env::var("GOOGLE_OAUTH_CLIENT_ID") {
        return Some(client_id);
    }

    let path = env::var("GOOGLE_OAUTH_CREDS_PATH")
        .unwrap_or_else(|_| DEFAULT_GOOGLE_OAUTH_CREDS_PATH.to_string());
    let contents = std::fs::read_to_string(&path).ok()?;
    let creds: serde_json::Value = match serde_json::from_str(&contents) {
        Ok(creds) => creds,
        Err(e) => {
            tracing::warn!("Failed to parse OAuth client credentials at {}: {}", path, e);
            return None;
        }
    };
    creds["web"]["client_id"].as_str().map(str::to_string)
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, IdentityError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| IdentityError::Configuration(format!("Invalid {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

impl OrchestratorConfig {
    pub fn from_env() -> Result<Self, IdentityError> {
        let defaults = Self::default();

        let accepted_issuers = match env::var("OAUTH2_ACCEPTED_ISSUERS") {
            Ok(value) => value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => defaults.accepted_issuers,
        };

        let linking_policy = match env::var("ACCOUNT_LINKING_POLICY") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.linking_policy,
        };

        Ok(Self {
            oauth_client_id: oauth_client_id_from_env(),
            accepted_issuers,
            jwks_url: env::var("OAUTH2_JWKS_URL").unwrap_or(defaults.jwks_url),
            linking_policy,
            trust_provider_email_verification: parse_env("TRUST_PROVIDER_EMAIL_VERIFICATION")?
                .unwrap_or(defaults.trust_provider_email_verification),
            verification_grace_period: parse_env::<u64>("VERIFICATION_EMAIL_GRACE_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.verification_grace_period),
            reconcile_max_attempts: parse_env("RECONCILE_MAX_ATTEMPTS")?
                .unwrap_or(defaults.reconcile_max_attempts),
        })
    }

    pub fn with_oauth_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.oauth_client_id = Some(client_id.into());
        self
    }

    pub fn with_accepted_issuers(mut self, issuers: Vec<String>) -> Self {
        self.accepted_issuers = issuers;
        self
    }

    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks_url = url.into();
        self
    }

    pub fn with_linking_policy(mut self, policy: LinkingPolicy) -> Self {
        self.linking_policy = policy;
        self
    }

    pub fn with_trust_provider_email_verification(mut self, trust: bool) -> Self {
        self.trust_provider_email_verification = trust;
        self
    }

    pub fn with_verification_grace_period(mut self, grace: Duration) -> Self {
        self.verification_grace_period = grace;
        self
    }

    pub fn with_reconcile_max_attempts(mut self, attempts: u32) -> Self {
        self.reconcile_max_attempts = attempts.max(1);
        self
    }
}
