//! Shared fixtures for unit tests: an HS256 key set and an ID token signer.

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::utils::base64url_encode;
use crate::verifier::{Jwk, Jwks, KeySource, StaticKeySource};

pub(crate) const TEST_AUDIENCE: &str = "test-client-id.apps.googleusercontent.com";
pub(crate) const TEST_KEY_ID: &str = "test-key";
const TEST_SECRET: &[u8] = b"test_secret";

pub(crate) fn test_jwks() -> Jwks {
    Jwks {
        keys: vec![Jwk {
            kty: "oct".to_string(),
            kid: TEST_KEY_ID.to_string(),
            alg: "HS256".to_string(),
            n: None,
            e: None,
            x: None,
            y: None,
            crv: None,
            k: Some(base64url_encode(TEST_SECRET)),
        }],
    }
}

pub(crate) fn test_key_source() -> Arc<dyn KeySource> {
    Arc::new(StaticKeySource::new(test_jwks()))
}

/// Claims of a fresh Google ID token for `subject`/`email`, valid for an hour
pub(crate) fn id_token_claims(subject: &str, email: &str) -> Value {
    let now = Utc::now().timestamp();
    json!({
        "iss": "https://accounts.google.com",
        "sub": subject,
        "aud": TEST_AUDIENCE,
        "email": email,
        "email_verified": true,
        "name": "Test User",
        "picture": "https://example.com/pic.jpg",
        "iat": now,
        "exp": now + 3600,
    })
}

pub(crate) fn sign_id_token(claims: &Value) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(TEST_KEY_ID.to_string());
    encode(&header, claims, &EncodingKey::from_secret(TEST_SECRET))
        .expect("Failed to sign test ID token")
}
