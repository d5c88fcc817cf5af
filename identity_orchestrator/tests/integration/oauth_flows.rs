use std::sync::Arc;

use crate::common::{
    GoogleUser, TEST_CLIENT_ID, orchestrator_with, sign_claims, test_config, test_orchestrator,
};
use identity_orchestrator::{
    Credentials, GOOGLE_PROVIDER_ID, IdentityError, InMemoryBackend, LinkingPolicy,
    PASSWORD_PROVIDER_ID,
};
use serde_json::json;

/// First Google sign-in creates an account carrying the provider profile
#[tokio::test]
async fn test_oauth_new_user() {
    let (backend, orchestrator) = test_orchestrator();
    let user = GoogleUser::new("g-100", "g@x.com");

    let result = orchestrator
        .oauth_login(&user.id_token())
        .await
        .expect("oauth login succeeds");

    assert_eq!(result.provider_id, GOOGLE_PROVIDER_ID);
    assert_eq!(result.account.email, "g@x.com");
    assert!(result.account.email_verified);
    assert_eq!(result.account.display_name.as_deref(), Some("Google Test User"));
    assert_eq!(
        result.account.photo_url.as_deref(),
        Some("https://example.com/avatar.png")
    );
    assert!(result.account.has_link(GOOGLE_PROVIDER_ID, "g-100"));
    assert_eq!(backend.account_count().await, 1);

    // The assertion token can be exchanged for a session
    assert!(
        orchestrator
            .exchange_assertion(&result.assertion_token)
            .await
            .is_ok()
    );
}

/// Repeated sign-ins with the same identity are idempotent
#[tokio::test]
async fn test_oauth_login_is_idempotent() {
    let (backend, orchestrator) = test_orchestrator();
    let user = GoogleUser::new("g-100", "g@x.com");

    let first = orchestrator.oauth_login(&user.id_token()).await.unwrap();
    let second = orchestrator.oauth_login(&user.id_token()).await.unwrap();

    assert_eq!(first.account.id, second.account.id);
    assert_eq!(first.account.linked_providers, second.account.linked_providers);
    assert_eq!(backend.account_count().await, 1);
}

/// Google sign-in with the email of a password account links to that account
#[tokio::test]
async fn test_oauth_links_existing_password_account() {
    // Given a password account
    let (backend, orchestrator) = test_orchestrator();
    let signed_up = orchestrator
        .signup("u@x.com", "pw123456", None)
        .await
        .unwrap();

    // When signing in with Google for the same (verified) email
    let result = orchestrator
        .oauth_login(&GoogleUser::new("g-200", "u@x.com").id_token())
        .await
        .expect("link succeeds");

    // Then the same account now carries both links
    assert_eq!(result.account.id, signed_up.account.id);
    let account = orchestrator.get_account(&signed_up.account.id).await.unwrap();
    assert!(account.has_link(PASSWORD_PROVIDER_ID, "u@x.com"));
    assert!(account.has_link(GOOGLE_PROVIDER_ID, "g-200"));
    assert_eq!(backend.account_count().await, 1);

    // And password login keeps working
    assert!(orchestrator.login("u@x.com", "pw123456").await.is_ok());
}

#[tokio::test]
async fn test_unverified_provider_email_not_linked_by_default() {
    let (_backend, orchestrator) = test_orchestrator();
    let signed_up = orchestrator
        .signup("u@x.com", "pw123456", None)
        .await
        .unwrap();

    let result = orchestrator
        .oauth_login(&GoogleUser::new("g-200", "u@x.com").unverified().id_token())
        .await;

    assert!(matches!(result, Err(IdentityError::AccountLinkRejected(_))));
    let account = orchestrator.get_account(&signed_up.account.id).await.unwrap();
    assert!(account.link_for(GOOGLE_PROVIDER_ID).is_none());
}

#[tokio::test]
async fn test_trust_email_match_links_unverified_provider_email() {
    let backend = Arc::new(InMemoryBackend::new());
    let orchestrator = orchestrator_with(
        backend.clone(),
        test_config().with_linking_policy(LinkingPolicy::TrustEmailMatch),
    );
    orchestrator
        .signup("u@x.com", "pw123456", None)
        .await
        .unwrap();

    let result = orchestrator
        .oauth_login(&GoogleUser::new("g-200", "u@x.com").unverified().id_token())
        .await
        .expect("policy allows the link");

    assert!(result.account.has_link(GOOGLE_PROVIDER_ID, "g-200"));
}

#[tokio::test]
async fn test_authenticate_with_tagged_credentials() {
    let (_backend, orchestrator) = test_orchestrator();
    let user = GoogleUser::new("g-100", "g@x.com");

    let result = orchestrator
        .authenticate(&Credentials::OAuth {
            id_token: user.id_token(),
        })
        .await
        .unwrap();

    assert_eq!(result.provider_id, GOOGLE_PROVIDER_ID);
}

#[tokio::test]
async fn test_oauth_rejects_bad_tokens() {
    let (backend, orchestrator) = test_orchestrator();
    let user = GoogleUser::new("g-100", "g@x.com");

    let mut wrong_audience = user.claims();
    wrong_audience["aud"] = json!("someone-else");
    let mut wrong_issuer = user.claims();
    wrong_issuer["iss"] = json!("https://issuer.example");
    let mut expired = user.claims();
    expired["exp"] = json!(chrono::Utc::now().timestamp() - 60);

    assert_eq!(
        orchestrator.oauth_login(&sign_claims(&wrong_audience)).await,
        Err(IdentityError::InvalidToken("audience mismatch".to_string()))
    );
    assert_eq!(
        orchestrator.oauth_login(&sign_claims(&wrong_issuer)).await,
        Err(IdentityError::InvalidToken("issuer mismatch".to_string()))
    );
    assert_eq!(
        orchestrator.oauth_login(&sign_claims(&expired)).await,
        Err(IdentityError::InvalidToken("token expired".to_string()))
    );
    assert_eq!(backend.account_count().await, 0);
}

#[tokio::test]
async fn test_oauth_without_client_id() {
    let backend = Arc::new(InMemoryBackend::new());
    let mut config = test_config();
    config.oauth_client_id = None;
    let orchestrator = orchestrator_with(backend, config);

    let result = orchestrator
        .oauth_login(&GoogleUser::new("g-100", "g@x.com").id_token())
        .await;

    assert!(matches!(result, Err(IdentityError::Configuration(_))));
}

#[tokio::test]
async fn test_oauth_client_config() {
    let (_backend, orchestrator) = test_orchestrator();

    let config = orchestrator.oauth_client_config().unwrap();

    assert_eq!(config.client_id, TEST_CLIENT_ID);
    assert_eq!(config.token_uri, "https://oauth2.googleapis.com/token");
}

/// No case folding: an OAuth email differing only in case gets its own account
#[tokio::test]
async fn test_oauth_email_case_is_significant() {
    let (backend, orchestrator) = test_orchestrator();
    let password_account = orchestrator
        .signup("A@x.com", "pw123456", None)
        .await
        .unwrap();

    let result = orchestrator
        .oauth_login(&GoogleUser::new("g-1", "a@x.com").id_token())
        .await
        .unwrap();

    assert_ne!(result.account.id, password_account.account.id);
    assert_eq!(backend.account_count().await, 2);
}
