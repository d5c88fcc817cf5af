use crate::common::{GoogleUser, test_orchestrator, wait_for_mail};
use identity_orchestrator::{
    IdentityError, VerificationDispatch, VerificationOutcome, VerificationState,
};

/// Unverified -> Verified via the emailed code, and never back
#[tokio::test]
async fn test_verification_is_monotone() {
    // Given a freshly signed-up (unverified) account
    let (backend, orchestrator) = test_orchestrator();
    let signed_up = orchestrator
        .signup("u@x.com", "pw123456", None)
        .await
        .unwrap();
    let account_id = signed_up.account.id.clone();
    assert_eq!(
        orchestrator.check_verification(&account_id).await.unwrap(),
        VerificationState::Unverified
    );

    // When the code from the signup email is applied
    let mail = wait_for_mail(&backend, &account_id, 1).await;
    let outcome = orchestrator
        .complete_verification(&mail[0].code)
        .await
        .unwrap();

    // Then the account is verified, and stays verified
    assert!(matches!(outcome, VerificationOutcome::Verified(_)));
    assert!(outcome.account().email_verified);
    assert_eq!(
        orchestrator.check_verification(&account_id).await.unwrap(),
        VerificationState::Verified
    );

    let again = orchestrator
        .complete_verification(&mail[0].code)
        .await
        .unwrap();
    assert!(matches!(again, VerificationOutcome::AlreadyVerified(_)));

    orchestrator
        .login("u@x.com", "pw123456")
        .await
        .expect("login after verification");
    assert_eq!(
        orchestrator.check_verification(&account_id).await.unwrap(),
        VerificationState::Verified
    );
}

/// The guard fails exactly while the account is unverified
#[tokio::test]
async fn test_require_verification_guard() {
    let (backend, orchestrator) = test_orchestrator();
    let signed_up = orchestrator
        .signup("u@x.com", "pw123456", None)
        .await
        .unwrap();
    let account_id = signed_up.account.id.clone();

    assert_eq!(
        orchestrator.require_verification(&account_id).await,
        Err(IdentityError::VerificationRequired)
    );

    let mail = wait_for_mail(&backend, &account_id, 1).await;
    orchestrator
        .complete_verification(&mail[0].code)
        .await
        .unwrap();

    assert_eq!(orchestrator.require_verification(&account_id).await, Ok(()));
}

#[tokio::test]
async fn test_send_and_resend_verification() {
    let (backend, orchestrator) = test_orchestrator();
    let signed_up = orchestrator
        .signup("u@x.com", "pw123456", None)
        .await
        .unwrap();
    let account_id = signed_up.account.id.clone();
    wait_for_mail(&backend, &account_id, 1).await;

    assert_eq!(
        orchestrator.send_verification(&account_id).await.unwrap(),
        VerificationDispatch::Sent
    );
    assert_eq!(
        orchestrator.resend_verification("u@x.com").await.unwrap(),
        VerificationDispatch::Sent
    );

    assert_eq!(wait_for_mail(&backend, &account_id, 3).await.len(), 3);
}

#[tokio::test]
async fn test_send_verification_when_already_verified() {
    let (backend, orchestrator) = test_orchestrator();
    // Google-verified accounts start out verified
    let result = orchestrator
        .oauth_login(&GoogleUser::new("g-1", "g@x.com").id_token())
        .await
        .unwrap();

    let dispatch = orchestrator
        .send_verification(&result.account.id)
        .await
        .unwrap();

    assert_eq!(dispatch, VerificationDispatch::AlreadyVerified);
    assert!(
        backend
            .sent_verification_mail(&result.account.id)
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn test_verification_for_unknown_account() {
    let (_backend, orchestrator) = test_orchestrator();

    assert!(matches!(
        orchestrator.send_verification("missing").await,
        Err(IdentityError::NotFound(_))
    ));
    assert!(matches!(
        orchestrator.resend_verification("ghost@x.com").await,
        Err(IdentityError::NotFound(_))
    ));
    assert!(matches!(
        orchestrator.require_verification("missing").await,
        Err(IdentityError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_invalid_verification_code() {
    let (_backend, orchestrator) = test_orchestrator();

    assert_eq!(
        orchestrator.complete_verification("not-a-code").await,
        Err(IdentityError::InvalidToken(
            "invalid verification code".to_string()
        ))
    );
}

/// Failed sends are absorbed: the caller still gets `Sent`
#[tokio::test]
async fn test_send_verification_during_mail_outage() {
    let (backend, orchestrator) = test_orchestrator();
    let signed_up = orchestrator
        .signup("u@x.com", "pw123456", None)
        .await
        .unwrap();
    wait_for_mail(&backend, &signed_up.account.id, 1).await;
    backend.set_mail_outage(true);

    let dispatch = orchestrator
        .send_verification(&signed_up.account.id)
        .await
        .unwrap();

    assert_eq!(dispatch, VerificationDispatch::Sent);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(
        backend
            .sent_verification_mail(&signed_up.account.id)
            .await
            .len(),
        1
    );
}
