mod assertion;
mod client;
mod config;
mod errors;
mod http;
mod memory;
mod types;

pub use assertion::ServiceAccountKey;
pub use client::IdentityBackend;
pub use config::BackendConfig;
pub use errors::BackendError;
pub use http::HttpIdentityBackend;
pub use memory::{InMemoryBackend, VerificationMail};
pub use types::{
    Account, AppliedVerification, GOOGLE_PROVIDER_ID, NewAccount, PASSWORD_PROVIDER_ID,
    ProviderLink, RefreshRotation, TokenPair, VerificationState,
};
