use thiserror::Error;

#[derive(Error, Debug)]
pub enum TokenVerificationError {
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("Invalid token format")]
    InvalidTokenFormat,
    #[error("audience mismatch, expected: {0}, actual: {1}")]
    AudienceMismatch(String, String),
    #[error("issuer mismatch: {0}")]
    IssuerMismatch(String),
    #[error("token expired")]
    TokenExpired,
    #[error("token not yet valid, now: {0}, claim: {1}")]
    NotYetValid(i64, i64),
    #[error("No matching key found in JWKS")]
    NoMatchingKey,
    #[error("Missing key component: {0}")]
    MissingKeyComponent(String),
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("missing {0} claim")]
    MissingClaim(String),
    /// No expected audience was configured; not a fault of the token
    #[error("Expected audience is not configured")]
    MissingAudience,
    /// The key set could not be retrieved; not a fault of the token
    #[error("JWKS fetch error: {0}")]
    JwksFetch(String),
}
