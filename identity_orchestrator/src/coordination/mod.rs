mod errors;
mod orchestrator;
mod reconcile;
mod verification;

pub use errors::{CredentialFailure, ErrorKind, IdentityError};
pub use orchestrator::{IdentityOrchestrator, OAuthClientConfig, SessionStatus};
pub use verification::{VerificationDispatch, VerificationOutcome, VerificationWorkflow};

pub(crate) use reconcile::Reconciler;
pub(crate) use verification::dispatch_verification_email;
