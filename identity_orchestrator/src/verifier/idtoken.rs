use chrono::Utc;
use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use std::sync::Arc;

use super::errors::TokenVerificationError;
use super::jwks::KeySource;
use super::types::{IdTokenClaims, VerifiedClaims};

/// Issuer strings Google puts in its ID tokens
pub const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

// tolerate the system clock to be this many seconds behind the issuer
const CLOCK_SKEW_SECS: i64 = 2;

/// Verifies OIDC ID tokens against an issuer's published keys.
#[derive(Clone)]
pub struct TokenVerifier {
    key_source: Arc<dyn KeySource>,
    accepted_issuers: Vec<String>,
}

impl TokenVerifier {
    /// A verifier accepting Google's issuers
    pub fn new(key_source: Arc<dyn KeySource>) -> Self {
        Self {
            key_source,
            accepted_issuers: GOOGLE_ISSUERS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_accepted_issuers(mut self, issuers: Vec<String>) -> Self {
        self.accepted_issuers = issuers;
        self
    }

    pub async fn verify(
        &self,
        token: &str,
        expected_audience: Option<&str>,
    ) -> Result<VerifiedClaims, TokenVerificationError> {
        self.verify_at(token, expected_audience, Utc::now().timestamp())
            .await
    }

    /// Verify `token` as if the current time were `now` (unix seconds).
    pub async fn verify_at(
        &self,
        token: &str,
        expected_audience: Option<&str>,
        now: i64,
    ) -> Result<VerifiedClaims, TokenVerificationError> {
        let audience = expected_audience
            .filter(|aud| !aud.is_empty())
            .ok_or(TokenVerificationError::MissingAudience)?;

        let header =
            decode_header(token).map_err(|_| TokenVerificationError::InvalidTokenFormat)?;
        let kid = header
            .kid
            .ok_or_else(|| TokenVerificationError::MissingKeyComponent("kid".to_string()))?;
        tracing::debug!("Algorithm from JWT header: {:?}", header.alg);

        let jwks = self.key_source.keys().await?;
        let jwk = jwks.find(&kid).ok_or(TokenVerificationError::NoMatchingKey)?;

        // The header must not pick a different algorithm than the key was published for
        let key_alg: Algorithm = jwk
            .alg
            .parse()
            .map_err(|_| TokenVerificationError::UnsupportedAlgorithm(jwk.alg.clone()))?;
        if key_alg != header.alg {
            return Err(TokenVerificationError::UnsupportedAlgorithm(format!(
                "{:?}",
                header.alg
            )));
        }
        let decoding_key = jwk.decoding_key()?;

        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let claims = decode::<IdTokenClaims>(token, &decoding_key, &validation)?.claims;

        if !self.accepted_issuers.iter().any(|iss| *iss == claims.iss) {
            return Err(TokenVerificationError::IssuerMismatch(claims.iss));
        }

        if !claims.aud.contains(audience) {
            return Err(TokenVerificationError::AudienceMismatch(
                audience.to_string(),
                claims.aud.joined(),
            ));
        }

        if now > claims.exp {
            return Err(TokenVerificationError::TokenExpired);
        }
        for issued in [claims.nbf, claims.iat].into_iter().flatten() {
            if now + CLOCK_SKEW_SECS < issued {
                return Err(TokenVerificationError::NotYetValid(now, issued));
            }
        }

        let email = claims
            .email
            .ok_or_else(|| TokenVerificationError::MissingClaim("email".to_string()))?;

        Ok(VerifiedClaims {
            subject: claims.sub,
            email,
            email_verified: claims.email_verified.unwrap_or(false),
            name: claims.name,
            picture: claims.picture,
            issuer: claims.iss,
        })
    }
}
