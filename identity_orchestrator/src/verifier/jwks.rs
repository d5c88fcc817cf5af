use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::utils::base64url_decode;

use super::errors::TokenVerificationError;

const CACHE_EXPIRATION_SECS: i64 = 600;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

pub const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Jwk {
    pub kty: String,
    pub kid: String,
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,
}

impl Jwks {
    pub(super) fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|key| key.kid == kid)
    }
}

fn component<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, TokenVerificationError> {
    value
        .as_deref()
        .ok_or_else(|| TokenVerificationError::MissingKeyComponent(name.to_string()))
}

impl Jwk {
    pub(super) fn decoding_key(&self) -> Result<DecodingKey, TokenVerificationError> {
        match self.alg.as_str() {
            "RS256" | "RS384" | "RS512" => Ok(DecodingKey::from_rsa_components(
                component(&self.n, "n")?,
                component(&self.e, "e")?,
            )?),
            "ES256" | "ES384" | "ES512" => Ok(DecodingKey::from_ec_components(
                component(&self.x, "x")?,
                component(&self.y, "y")?,
            )?),
            "HS256" | "HS384" | "HS512" => {
                let k = base64url_decode(component(&self.k, "k")?)
                    .map_err(|_| TokenVerificationError::MissingKeyComponent("k".to_string()))?;
                Ok(DecodingKey::from_secret(&k))
            }
            alg => Err(TokenVerificationError::UnsupportedAlgorithm(alg.to_string())),
        }
    }
}

/// Where a verifier gets the issuer's signing keys from
#[async_trait]
pub trait KeySource: Send + Sync + 'static {
    async fn keys(&self) -> Result<Jwks, TokenVerificationError>;
}

/// A fixed key set
pub struct StaticKeySource {
    jwks: Jwks,
}

impl StaticKeySource {
    pub fn new(jwks: Jwks) -> Self {
        Self { jwks }
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn keys(&self) -> Result<Jwks, TokenVerificationError> {
        Ok(self.jwks.clone())
    }
}

#[derive(Debug, Clone)]
struct JwksCache {
    jwks: Jwks,
    expires_at: DateTime<Utc>,
}

/// Key set fetched over HTTP and cached for ten minutes.
///
/// The cache lock is only held to read or store the key set, never across
/// the network fetch; a stalled endpoint fails after `fetch_timeout`.
pub struct JwksKeySource {
    url: String,
    client: reqwest::Client,
    fetch_timeout: std::time::Duration,
    cache: Mutex<Option<JwksCache>>,
}

impl JwksKeySource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
            fetch_timeout: std::time::Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            cache: Mutex::new(None),
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    async fn fetch(&self) -> Result<Jwks, TokenVerificationError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| TokenVerificationError::JwksFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TokenVerificationError::JwksFetch(format!(
                "JWKS endpoint returned {}",
                response.status()
            )));
        }

        response
            .json::<Jwks>()
            .await
            .map_err(|e| TokenVerificationError::JwksFetch(e.to_string()))
    }

    async fn cached(&self) -> Option<Jwks> {
        let cache = self.cache.lock().await;
        match cache.as_ref() {
            Some(cached) if cached.expires_at > Utc::now() => {
                tracing::debug!("Returning valid cached JWKs");
                Some(cached.jwks.clone())
            }
            Some(_) => {
                tracing::debug!("Cached JWKs expired");
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl KeySource for JwksKeySource {
    async fn keys(&self) -> Result<Jwks, TokenVerificationError> {
        if let Some(jwks) = self.cached().await {
            return Ok(jwks);
        }

        let jwks = tokio::time::timeout(self.fetch_timeout, self.fetch())
            .await
            .map_err(|_| {
                TokenVerificationError::JwksFetch(format!(
                    "JWKS endpoint did not answer within {:?}",
                    self.fetch_timeout
                ))
            })??;
        tracing::debug!("JWKs fetched from URL");

        *self.cache.lock().await = Some(JwksCache {
            jwks: jwks.clone(),
            expires_at: Utc::now() + Duration::seconds(CACHE_EXPIRATION_SECS),
        });
        Ok(jwks)
    }
}
