mod errors;
mod idtoken;
mod jwks;
mod types;

pub use errors::TokenVerificationError;
pub use idtoken::{GOOGLE_ISSUERS, TokenVerifier};
pub use jwks::{GOOGLE_JWKS_URL, Jwk, Jwks, JwksKeySource, KeySource, StaticKeySource};
pub use types::VerifiedClaims;
