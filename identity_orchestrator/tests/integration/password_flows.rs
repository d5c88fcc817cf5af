use std::sync::Arc;

use crate::common::{
    RacingBackend, orchestrator_with, test_config, test_orchestrator, wait_for_mail,
};
use identity_orchestrator::{
    CredentialFailure, IdentityBackend, IdentityError, InMemoryBackend, PASSWORD_PROVIDER_ID,
};
use proptest::prelude::*;

/// Sign-up followed by login with the same credentials lands on the same account
#[tokio::test]
async fn test_signup_then_login() {
    // Given a fresh system
    let (backend, orchestrator) = test_orchestrator();

    // When signing up and then logging in
    let signed_up = orchestrator
        .signup("u@x.com", "pw123456", Some("Password User".to_string()))
        .await
        .expect("signup succeeds");
    let logged_in = orchestrator
        .login("u@x.com", "pw123456")
        .await
        .expect("login succeeds");

    // Then both name the same unverified account with a password link
    assert_eq!(signed_up.account.id, logged_in.account.id);
    assert!(!logged_in.account.email_verified);
    assert!(
        logged_in
            .account
            .has_link(PASSWORD_PROVIDER_ID, "u@x.com")
    );
    assert_eq!(logged_in.provider_id, PASSWORD_PROVIDER_ID);

    // And a verification email was sent in the background
    let mail = wait_for_mail(&backend, &signed_up.account.id, 1).await;
    assert_eq!(mail.len(), 1);
    assert_eq!(mail[0].email, "u@x.com");
}

#[tokio::test]
async fn test_wrong_password() {
    let (_backend, orchestrator) = test_orchestrator();
    orchestrator
        .signup("u@x.com", "pw123456", None)
        .await
        .unwrap();

    let result = orchestrator.login("u@x.com", "not-the-password").await;

    assert_eq!(
        result,
        Err(IdentityError::AuthenticationFailed {
            reason: CredentialFailure::InvalidPassword
        })
    );
}

#[tokio::test]
async fn test_login_unknown_email() {
    let (_backend, orchestrator) = test_orchestrator();

    let result = orchestrator.login("ghost@x.com", "pw123456").await;

    assert_eq!(
        result,
        Err(IdentityError::AuthenticationFailed {
            reason: CredentialFailure::EmailNotFound
        })
    );
}

#[tokio::test]
async fn test_signup_duplicate_email() {
    let (backend, orchestrator) = test_orchestrator();
    orchestrator
        .signup("u@x.com", "pw123456", None)
        .await
        .unwrap();

    let result = orchestrator.signup("u@x.com", "another-pw", None).await;

    assert_eq!(result, Err(IdentityError::DuplicateAccount));
    assert_eq!(backend.account_count().await, 1);
}

#[tokio::test]
async fn test_signup_weak_password() {
    let (backend, orchestrator) = test_orchestrator();

    let result = orchestrator.signup("u@x.com", "abc", None).await;

    assert!(matches!(result, Err(IdentityError::WeakCredential(_))));
    assert_eq!(backend.account_count().await, 0);
}

/// Sign-up succeeds while the mail system is down
#[tokio::test]
async fn test_signup_with_mail_outage() {
    let (backend, orchestrator) = test_orchestrator();
    backend.set_mail_outage(true);

    let signed_up = orchestrator
        .signup("u@x.com", "pw123456", None)
        .await
        .expect("signup is not blocked by mail failures");

    assert!(
        wait_for_mail(&backend, &signed_up.account.id, 1)
            .await
            .is_empty()
    );
}

/// No verification email goes out for a sign-up that failed to mint its token
#[tokio::test]
async fn test_signup_mint_failure_sends_no_mail() {
    // Given a backend that cannot mint assertion tokens
    let inner = Arc::new(InMemoryBackend::new());
    let failing = Arc::new(RacingBackend::new(inner.clone(), 0).with_failing_mint());
    let orchestrator = orchestrator_with(failing, test_config());

    // When signing up
    let result = orchestrator.signup("u@x.com", "pw123456", None).await;

    // Then the caller sees the outage and no email was dispatched
    assert!(matches!(result, Err(IdentityError::BackendUnavailable(_))));
    let account = inner.find_by_email("u@x.com").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(inner.sent_verification_mail(&account.id).await.is_empty());
}

#[tokio::test]
async fn test_deleted_account_frees_email() {
    let (_backend, orchestrator) = test_orchestrator();
    let first = orchestrator
        .signup("u@x.com", "pw123456", None)
        .await
        .unwrap();

    orchestrator.delete_account(&first.account.id).await.unwrap();

    assert!(matches!(
        orchestrator.get_account(&first.account.id).await,
        Err(IdentityError::NotFound(_))
    ));
    let second = orchestrator
        .signup("u@x.com", "pw123456", None)
        .await
        .expect("email is free again");
    assert_ne!(first.account.id, second.account.id);
}

fn email_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,8}@[a-z]{1,6}\\.com"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Emails differing only in case name different accounts
    #[test]
    fn emails_are_case_sensitive(email in email_strategy()) {
        let upper = email.to_uppercase();
        let runtime = tokio::runtime::Runtime::new().unwrap();

        runtime.block_on(async {
            let (backend, orchestrator) = test_orchestrator();
            let lower_account = orchestrator.signup(&email, "pw123456", None).await.unwrap();
            let upper_account = orchestrator.signup(&upper, "pw123456", None).await.unwrap();

            assert_ne!(lower_account.account.id, upper_account.account.id);
            assert_eq!(backend.account_count().await, 2);
            assert!(orchestrator.login(&upper, "pw123456").await.is_ok());
        });
    }
}
