//! Axum integration for `identity-orchestrator`
//!
//! Mount [`identity_router`] to expose password sign-up/sign-in, Google
//! sign-in, token exchange and refresh, and email verification over JSON.

mod account;
mod error;
mod oauth;
mod router;
mod token;
mod types;
mod verification;

pub use error::IntoResponseError;
pub use router::{identity_router, identity_router_no_trace};

pub use identity_orchestrator::IdentityOrchestrator;
