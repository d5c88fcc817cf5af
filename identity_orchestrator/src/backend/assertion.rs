use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};

use super::errors::BackendError;

const ASSERTION_AUDIENCE: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Service account credentials used to sign assertion tokens
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"[redacted]")
            .finish()
    }
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, BackendError> {
        serde_json::from_str(json).map_err(|e| {
            BackendError::Configuration(format!("Invalid service account key: {e}"))
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    sub: String,
    aud: String,
    uid: String,
    iat: i64,
    exp: i64,
}

/// Sign a custom token asserting control of `account_id`.
pub(crate) fn sign_assertion(
    key: &ServiceAccountKey,
    account_id: &str,
) -> Result<String, BackendError> {
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
        BackendError::Configuration(format!("Invalid service account private key: {e}"))
    })?;

    let iat = Utc::now().timestamp();
    let claims = AssertionClaims {
        iss: key.client_email.clone(),
        sub: key.client_email.clone(),
        aud: ASSERTION_AUDIENCE.to_string(),
        uid: account_id.to_string(),
        iat,
        exp: iat + ASSERTION_LIFETIME_SECS,
    };

    encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| BackendError::Unexpected(format!("Failed to sign assertion token: {e}")))
}
