use std::sync::Arc;

use crate::backend::{GOOGLE_PROVIDER_ID, IdentityBackend};
use crate::coordination::{IdentityError, Reconciler};
use crate::verifier::TokenVerifier;

use super::types::{AuthResult, CanonicalIdentity};

/// Sign-in with a Google ID token
#[derive(Clone)]
pub struct OAuthAdapter {
    backend: Arc<dyn IdentityBackend>,
    verifier: TokenVerifier,
    audience: Option<String>,
    reconciler: Reconciler,
}

impl OAuthAdapter {
    pub(crate) fn new(
        backend: Arc<dyn IdentityBackend>,
        verifier: TokenVerifier,
        audience: Option<String>,
        reconciler: Reconciler,
    ) -> Self {
        Self {
            backend,
            verifier,
            audience,
            reconciler,
        }
    }

    #[tracing::instrument(skip(self, id_token))]
    pub async fn authenticate(&self, id_token: &str) -> Result<AuthResult, IdentityError> {
        let claims = self
            .verifier
            .verify(id_token, self.audience.as_deref())
            .await?;
        tracing::debug!("Verified ID token for subject {}", claims.subject);

        let identity = CanonicalIdentity::from_claims(GOOGLE_PROVIDER_ID, claims);
        let account = self.reconciler.reconcile(&identity).await?;

        let assertion_token = self.backend.mint_assertion_token(&account.id).await?;

        Ok(AuthResult {
            account,
            assertion_token,
            provider_id: GOOGLE_PROVIDER_ID.to_string(),
        })
    }
}
