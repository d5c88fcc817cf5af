//! identity-orchestrator - unified password and OAuth sign-in over a remote identity backend
//!
//! Credentials of either kind are verified, mapped onto a single canonical
//! account per email, and turned into backend tokens. Email verification and
//! the token lifecycle (mint, exchange, refresh, revoke) are driven from the
//! same entry point, [`IdentityOrchestrator`].

mod backend;
mod config;
mod coordination;
mod provider;
mod utils;
mod verifier;

#[cfg(test)]
mod test_utils;

pub use backend::{
    Account, AppliedVerification, BackendConfig, BackendError, GOOGLE_PROVIDER_ID,
    HttpIdentityBackend, IdentityBackend, InMemoryBackend, NewAccount, PASSWORD_PROVIDER_ID,
    ProviderLink, RefreshRotation, ServiceAccountKey, TokenPair, VerificationMail,
    VerificationState,
};

pub use config::{LinkingPolicy, OrchestratorConfig};

pub use coordination::{
    CredentialFailure, ErrorKind, IdentityError, IdentityOrchestrator, OAuthClientConfig,
    SessionStatus, VerificationDispatch, VerificationOutcome, VerificationWorkflow,
};

pub use provider::{
    AuthResult, CanonicalIdentity, Credentials, OAuthAdapter, PasswordAdapter, ProviderAdapter,
};

pub use utils::{UtilError, gen_random_string};

pub use verifier::{
    GOOGLE_ISSUERS, GOOGLE_JWKS_URL, Jwk, Jwks, JwksKeySource, KeySource, StaticKeySource,
    TokenVerificationError, TokenVerifier, VerifiedClaims,
};
