use std::sync::Arc;

use crate::common::{orchestrator_with, test_config, test_orchestrator};
use identity_orchestrator::{IdentityError, InMemoryBackend, RefreshRotation, SessionStatus};

/// Mint -> exchange -> refresh with rotation: the used refresh token is dead
#[tokio::test]
async fn test_refresh_rotation_rejects_reuse() {
    let (_backend, orchestrator) = test_orchestrator();
    let signed_up = orchestrator
        .signup("u@x.com", "pw123456", None)
        .await
        .unwrap();
    let tokens = orchestrator
        .exchange_assertion(&signed_up.assertion_token)
        .await
        .unwrap();

    let refreshed = orchestrator.refresh(&tokens.refresh_token).await.unwrap();

    assert_ne!(refreshed.access_token, tokens.access_token);
    assert_eq!(
        orchestrator.refresh(&tokens.refresh_token).await,
        Err(IdentityError::InvalidRefreshToken)
    );
    assert!(orchestrator.refresh(&refreshed.refresh_token).await.is_ok());
}

/// With re-issue rotation a reused token yields the newest refresh token
#[tokio::test]
async fn test_refresh_reissue_latest() {
    let backend =
        Arc::new(InMemoryBackend::new().with_refresh_rotation(RefreshRotation::ReissueLatest));
    let orchestrator = orchestrator_with(backend, test_config());
    let signed_up = orchestrator
        .signup("u@x.com", "pw123456", None)
        .await
        .unwrap();
    let tokens = orchestrator
        .exchange_assertion(&signed_up.assertion_token)
        .await
        .unwrap();
    let refreshed = orchestrator.refresh(&tokens.refresh_token).await.unwrap();

    let reused = orchestrator
        .refresh(&tokens.refresh_token)
        .await
        .expect("reuse is tolerated");

    assert_eq!(reused.refresh_token, refreshed.refresh_token);
}

#[tokio::test]
async fn test_expired_refresh_token() {
    let backend =
        Arc::new(InMemoryBackend::new().with_refresh_ttl(chrono::Duration::seconds(-1)));
    let orchestrator = orchestrator_with(backend, test_config());
    let signed_up = orchestrator
        .signup("u@x.com", "pw123456", None)
        .await
        .unwrap();
    let tokens = orchestrator
        .exchange_assertion(&signed_up.assertion_token)
        .await
        .unwrap();

    assert_eq!(
        orchestrator.refresh(&tokens.refresh_token).await,
        Err(IdentityError::ExpiredRefreshToken)
    );
}

#[tokio::test]
async fn test_assertion_exchange_is_single_use() {
    let (_backend, orchestrator) = test_orchestrator();
    let signed_up = orchestrator
        .signup("u@x.com", "pw123456", None)
        .await
        .unwrap();

    orchestrator
        .exchange_assertion(&signed_up.assertion_token)
        .await
        .unwrap();

    assert!(matches!(
        orchestrator
            .exchange_assertion(&signed_up.assertion_token)
            .await,
        Err(IdentityError::InvalidToken(_))
    ));
}

/// Revocation kills every outstanding token but not future sign-ins
#[tokio::test]
async fn test_revoke_sessions() {
    let (_backend, orchestrator) = test_orchestrator();
    let signed_up = orchestrator
        .signup("u@x.com", "pw123456", None)
        .await
        .unwrap();
    let tokens = orchestrator
        .exchange_assertion(&signed_up.assertion_token)
        .await
        .unwrap();

    orchestrator
        .revoke_sessions(&signed_up.account.id)
        .await
        .unwrap();

    assert_eq!(
        orchestrator.refresh(&tokens.refresh_token).await,
        Err(IdentityError::InvalidRefreshToken)
    );
    assert!(matches!(
        orchestrator.verify_session(&tokens.access_token).await,
        Err(IdentityError::InvalidToken(_))
    ));
    // A password login carries a backend access token
    let fresh = orchestrator.login("u@x.com", "pw123456").await.unwrap();
    assert!(matches!(
        orchestrator.verify_session(&fresh.assertion_token).await,
        Ok(SessionStatus::Active { .. })
    ));
}

#[tokio::test]
async fn test_verify_session_after_account_deletion() {
    let (_backend, orchestrator) = test_orchestrator();
    let signed_up = orchestrator
        .signup("u@x.com", "pw123456", None)
        .await
        .unwrap();
    let tokens = orchestrator
        .exchange_assertion(&signed_up.assertion_token)
        .await
        .unwrap();

    orchestrator
        .delete_account(&signed_up.account.id)
        .await
        .unwrap();

    assert_eq!(
        orchestrator.verify_session(&tokens.access_token).await,
        Ok(SessionStatus::AccountDeleted {
            account_id: signed_up.account.id.clone()
        })
    );
    assert_eq!(
        orchestrator.refresh(&tokens.refresh_token).await,
        Err(IdentityError::InvalidRefreshToken)
    );
}
