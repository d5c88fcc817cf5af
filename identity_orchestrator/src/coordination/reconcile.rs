use std::sync::Arc;

use crate::backend::{Account, BackendError, IdentityBackend, NewAccount, ProviderLink};
use crate::config::{LinkingPolicy, OrchestratorConfig};
use crate::provider::CanonicalIdentity;

use super::errors::IdentityError;

/// Maps an asserted identity onto exactly one canonical account.
///
/// Looks the email up, creates the account when absent and links the
/// provider subject. Creation racing with another request for the same email
/// surfaces as `EmailExists` and restarts the lookup, up to `max_attempts`.
#[derive(Clone)]
pub(crate) struct Reconciler {
    backend: Arc<dyn IdentityBackend>,
    policy: LinkingPolicy,
    trust_provider_email_verification: bool,
    max_attempts: u32,
}

impl Reconciler {
    pub(crate) fn new(backend: Arc<dyn IdentityBackend>, config: &OrchestratorConfig) -> Self {
        Self {
            backend,
            policy: config.linking_policy,
            trust_provider_email_verification: config.trust_provider_email_verification,
            max_attempts: config.reconcile_max_attempts.max(1),
        }
    }

    #[tracing::instrument(skip(self, identity), fields(email = %identity.email, provider = %identity.provider_id))]
    pub(crate) async fn reconcile(
        &self,
        identity: &CanonicalIdentity,
    ) -> Result<Account, IdentityError> {
        for attempt in 1..=self.max_attempts {
            match self.backend.find_by_email(&identity.email).await {
                Ok(account) => return self.link_existing(account, identity).await,
                Err(BackendError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }

            match self.create_and_link(identity).await {
                Ok(account) => return Ok(account),
                Err(BackendError::EmailExists) => {
                    tracing::debug!(
                        "Account for email created concurrently (attempt {}/{}), looking it up again",
                        attempt,
                        self.max_attempts
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!("Reconciliation gave up after {} attempts", self.max_attempts);
        Err(IdentityError::DuplicateAccount)
    }

    async fn link_existing(
        &self,
        mut account: Account,
        identity: &CanonicalIdentity,
    ) -> Result<Account, IdentityError> {
        if account.has_link(&identity.provider_id, &identity.provider_subject) {
            tracing::debug!("Provider already linked to account {}", account.id);
            return Ok(account);
        }

        // An account with no links is a creation still waiting for its first
        // link (a concurrent request, or one cut short), not another identity
        let unclaimed = account.linked_providers.is_empty();
        if self.policy == LinkingPolicy::RequireVerifiedEmail
            && !identity.email_verified
            && !unclaimed
        {
            tracing::warn!(
                "Refusing to link {} to account {}: provider did not verify the email",
                identity.provider_id,
                account.id
            );
            return Err(IdentityError::AccountLinkRejected(
                "provider did not verify the email address".to_string(),
            ));
        }

        match self
            .backend
            .link_provider(
                &account.id,
                &identity.provider_id,
                &identity.provider_subject,
            )
            .await
        {
            Ok(()) => {
                tracing::info!("Linked {} to account {}", identity.provider_id, account.id);
                account.linked_providers.push(ProviderLink::new(
                    identity.provider_id.clone(),
                    identity.provider_subject.clone(),
                ));
                Ok(account)
            }
            Err(BackendError::ProviderAlreadyLinked { owner, provider_id }) => {
                // A concurrent request may have linked the same subject to this account
                let same_owner = match owner {
                    Some(owner) => owner == account.id,
                    None => self
                        .backend
                        .find_by_id(&account.id)
                        .await?
                        .has_link(&identity.provider_id, &identity.provider_subject),
                };
                if same_owner {
                    Ok(self.backend.find_by_id(&account.id).await?)
                } else {
                    Err(BackendError::ProviderAlreadyLinked {
                        provider_id,
                        owner: None,
                    }
                    .into())
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn create_and_link(&self, identity: &CanonicalIdentity) -> Result<Account, BackendError> {
        let new_account = NewAccount {
            email: identity.email.clone(),
            password: None,
            display_name: identity.display_name.clone(),
            photo_url: identity.photo_url.clone(),
            email_verified: self.trust_provider_email_verification && identity.email_verified,
        };
        let mut account = self.backend.create_account(new_account).await?;
        tracing::info!(
            "Created account {} for {} identity",
            account.id,
            identity.provider_id
        );

        if let Err(e) = self
            .backend
            .link_provider(
                &account.id,
                &identity.provider_id,
                &identity.provider_subject,
            )
            .await
        {
            // Do not leave an account behind that the identity cannot reach
            tracing::warn!(
                "Linking new account {} failed ({}), deleting it",
                account.id,
                e
            );
            if let Err(delete_err) = self.backend.delete_account(&account.id).await {
                tracing::warn!(
                    "Failed to delete unlinked account {}: {}",
                    account.id,
                    delete_err
                );
            }
            return Err(e);
        }

        account.linked_providers.push(ProviderLink::new(
            identity.provider_id.clone(),
            identity.provider_subject.clone(),
        ));
        Ok(account)
    }
}
