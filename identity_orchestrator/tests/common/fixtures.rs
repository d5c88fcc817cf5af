use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use std::sync::{Arc, Once};
use std::time::Duration;

use identity_orchestrator::{
    IdentityBackend, IdentityOrchestrator, InMemoryBackend, Jwk, Jwks, OrchestratorConfig,
    StaticKeySource, VerificationMail,
};

pub const TEST_CLIENT_ID: &str = "integration-client.apps.googleusercontent.com";
const TEST_KEY_ID: &str = "test-key";
const TEST_SECRET: &[u8] = b"test_secret";

/// Load `.env_test` (falling back to `.env`) once per test binary
pub fn init_test_environment() {
    static ENV_INIT: Once = Once::new();
    ENV_INIT.call_once(|| {
        if dotenvy::from_filename(".env_test").is_err() {
            dotenvy::dotenv().ok();
        }
    });
}

/// A Google account as the ID token issuer describes it
#[derive(Debug, Clone)]
pub struct GoogleUser {
    pub subject: String,
    pub email: String,
    pub email_verified: bool,
    pub name: String,
}

impl GoogleUser {
    pub fn new(subject: &str, email: &str) -> Self {
        Self {
            subject: subject.to_string(),
            email: email.to_string(),
            email_verified: true,
            name: "Google Test User".to_string(),
        }
    }

    pub fn unverified(mut self) -> Self {
        self.email_verified = false;
        self
    }

    pub fn claims(&self) -> Value {
        let now = Utc::now().timestamp();
        json!({
            "iss": "https://accounts.google.com",
            "sub": self.subject,
            "aud": TEST_CLIENT_ID,
            "email": self.email,
            "email_verified": self.email_verified,
            "name": self.name,
            "picture": "https://example.com/avatar.png",
            "iat": now,
            "exp": now + 3600,
        })
    }

    pub fn id_token(&self) -> String {
        sign_claims(&self.claims())
    }
}

pub fn sign_claims(claims: &Value) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(TEST_KEY_ID.to_string());
    encode(&header, claims, &EncodingKey::from_secret(TEST_SECRET))
        .expect("Failed to sign test ID token")
}

pub fn test_jwks() -> Jwks {
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
            k: Some(URL_SAFE_NO_PAD.encode(TEST_SECRET)),
        }],
    }
}

pub fn test_config() -> OrchestratorConfig {
    OrchestratorConfig::default()
        .with_oauth_client_id(TEST_CLIENT_ID)
        .with_verification_grace_period(Duration::from_secs(2))
}

pub fn orchestrator_with(
    backend: Arc<dyn IdentityBackend>,
    config: OrchestratorConfig,
) -> IdentityOrchestrator {
    init_test_environment();
    IdentityOrchestrator::with_key_source(
        backend,
        config,
        Arc::new(StaticKeySource::new(test_jwks())),
    )
}

/// A fresh in-memory backend and an orchestrator over it
pub fn test_orchestrator() -> (Arc<InMemoryBackend>, IdentityOrchestrator) {
    let backend = Arc::new(InMemoryBackend::new());
    let orchestrator = orchestrator_with(backend.clone(), test_config());
    (backend, orchestrator)
}

/// Wait for the background sender to deliver `count` verification emails
pub async fn wait_for_mail(
    backend: &InMemoryBackend,
    account_id: &str,
    count: usize,
) -> Vec<VerificationMail> {
    for _ in 0..100 {
        let mail = backend.sent_verification_mail(account_id).await;
        if mail.len() >= count {
            return mail;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    backend.sent_verification_mail(account_id).await
}
