// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session login, restore and refresh behavior.

use std::time::Duration;

use secrecy::ExposeSecret;
use tracing_test::traced_test;

use fieldsync_bus::SyncEvent;
use fieldsync_core::{AuthErrorKind, FieldsyncError};
use fieldsync_test_utils::{MockIdentityProvider, TestHarness};

const ADVISOR: &str = "1234567";
/// Past the default 900s token lifetime.
const PAST_EXPIRY: Duration = Duration::from_secs(2 * 3_600);

fn token(value: Option<secrecy::SecretString>) -> Option<String> {
    value.map(|t| t.expose_secret().to_string())
}

#[tokio::test]
async fn login_is_validated_before_calling_the_provider() {
    let harness = TestHarness::builder().build().await.unwrap();
    let session = &harness.engine().session;

    for (id, password) in [("12345", "pw"), ("12345678901", "pw"), (ADVISOR, "")] {
        let err = session.login(id, password, true).await.unwrap_err();
        assert!(matches!(err, FieldsyncError::Validation { .. }), "{id:?}");
    }
    assert_eq!(harness.identity.login_calls(), 0);
    assert!(!session.is_authenticated().await);
}

#[tokio::test]
async fn rejected_login_surfaces_auth_error() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .identity
        .push_login(Err(FieldsyncError::auth(
            AuthErrorKind::InvalidCredentials,
            "Credenciales inválidas",
        )))
        .await;

    let err = harness.login(ADVISOR).await.unwrap_err();
    assert!(err.requires_login());
    assert!(harness.engine().session.current_user().await.is_none());
}

#[tokio::test]
#[traced_test]
async fn login_persists_and_restores_without_refresh() {
    let mut harness = TestHarness::builder().build().await.unwrap();
    let user = harness.login(ADVISOR).await.unwrap();
    assert_eq!(user.id, ADVISOR);
    assert!(logs_contain("logged in"));
    assert!(!logs_contain("access-1"));

    harness.restart(true);
    let restored = harness.engine().session.restore_session().await.unwrap();
    assert_eq!(restored, Some(user));
    assert_eq!(harness.identity.refresh_calls(), 0);
    assert_eq!(
        token(harness.engine().session.get_token().await.unwrap()),
        Some("access-1".into())
    );
}

#[tokio::test]
async fn expired_session_restored_offline_skips_refresh() {
    let mut harness = TestHarness::builder().build().await.unwrap();
    let user = harness.login(ADVISOR).await.unwrap();

    harness.advance(PAST_EXPIRY);
    harness.restart(false);

    let restored = harness.engine().session.restore_session().await.unwrap();
    assert_eq!(restored, Some(user));
    assert_eq!(harness.identity.refresh_calls(), 0);

    // stale token is handed out while offline
    assert_eq!(
        token(harness.engine().session.get_token().await.unwrap()),
        Some("access-1".into())
    );
    assert_eq!(harness.identity.refresh_calls(), 0);
}

#[tokio::test]
async fn expired_session_restored_online_is_refreshed() {
    let mut harness = TestHarness::builder().build().await.unwrap();
    harness.login(ADVISOR).await.unwrap();

    harness.advance(PAST_EXPIRY);
    harness.restart(true);

    assert!(harness.engine().session.restore_session().await.unwrap().is_some());
    assert_eq!(harness.identity.refresh_calls(), 1);
    assert_eq!(
        token(harness.engine().session.get_token().await.unwrap()),
        Some("refreshed-1".into())
    );
}

#[tokio::test]
async fn rejected_refresh_on_restore_discards_the_session() {
    let mut harness = TestHarness::builder().build().await.unwrap();
    harness.login(ADVISOR).await.unwrap();
    harness
        .identity
        .push_refresh(Err(FieldsyncError::auth(
            AuthErrorKind::InvalidCredentials,
            "revoked",
        )))
        .await;

    harness.advance(PAST_EXPIRY);
    harness.restart(true);
    assert_eq!(harness.engine().session.restore_session().await.unwrap(), None);
    assert!(!harness.engine().session.is_authenticated().await);

    // the persisted copy is gone too
    harness.restart(true);
    assert_eq!(harness.engine().session.restore_session().await.unwrap(), None);
    assert_eq!(harness.identity.refresh_calls(), 1);
}

#[tokio::test]
async fn transient_refresh_failure_on_restore_keeps_the_session() {
    let mut harness = TestHarness::builder().build().await.unwrap();
    let user = harness.login(ADVISOR).await.unwrap();
    harness
        .identity
        .push_refresh(Err(FieldsyncError::TransientNetwork {
            message: "503".into(),
        }))
        .await;

    harness.advance(PAST_EXPIRY);
    harness.restart(true);
    assert_eq!(
        harness.engine().session.restore_session().await.unwrap(),
        Some(user)
    );
    assert!(harness.engine().session.is_authenticated().await);
}

#[tokio::test(start_paused = true)]
async fn concurrent_expired_callers_share_one_refresh() {
    let identity = MockIdentityProvider::new().with_refresh_delay(Duration::from_millis(200));
    let harness = TestHarness::builder()
        .with_identity(identity)
        .build()
        .await
        .unwrap();
    let session = &harness.engine().session;
    harness.login(ADVISOR).await.unwrap();
    harness.advance(PAST_EXPIRY);

    let (a, b, c) = tokio::join!(session.get_token(), session.get_token(), session.get_token());
    let a = token(a.unwrap());
    assert_eq!(a, Some("refreshed-1".into()));
    assert_eq!(token(b.unwrap()), a);
    assert_eq!(token(c.unwrap()), a);
    assert_eq!(harness.identity.refresh_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_the_same_rejection() {
    let identity = MockIdentityProvider::new().with_refresh_delay(Duration::from_millis(200));
    let harness = TestHarness::builder()
        .with_identity(identity)
        .build()
        .await
        .unwrap();
    let session = &harness.engine().session;
    harness.login(ADVISOR).await.unwrap();
    harness
        .identity
        .push_refresh(Err(FieldsyncError::auth(
            AuthErrorKind::InvalidCredentials,
            "revoked",
        )))
        .await;
    harness.advance(PAST_EXPIRY);

    let (a, b) = tokio::join!(session.refresh(), session.refresh());
    for result in [a, b] {
        assert!(matches!(
            result,
            Err(FieldsyncError::Auth {
                kind: AuthErrorKind::SessionExpired,
                ..
            })
        ));
    }
    assert_eq!(harness.identity.refresh_calls(), 1);
    assert!(!session.is_authenticated().await);
}

#[tokio::test(start_paused = true)]
async fn concurrent_token_callers_share_a_rejected_refresh() {
    let identity = MockIdentityProvider::new().with_refresh_delay(Duration::from_millis(200));
    let harness = TestHarness::builder()
        .with_identity(identity)
        .build()
        .await
        .unwrap();
    let session = &harness.engine().session;
    harness.login(ADVISOR).await.unwrap();
    harness
        .identity
        .push_refresh(Err(FieldsyncError::auth(
            AuthErrorKind::InvalidCredentials,
            "revoked",
        )))
        .await;
    harness.advance(PAST_EXPIRY);

    let (a, b) = tokio::join!(session.get_token(), session.get_token());
    for result in [a, b] {
        assert!(
            matches!(
                result,
                Err(FieldsyncError::Auth {
                    kind: AuthErrorKind::SessionExpired,
                    ..
                })
            ),
            "every caller should see the rejection"
        );
    }
    assert_eq!(harness.identity.refresh_calls(), 1);
    assert!(!session.is_authenticated().await);
}

#[tokio::test(start_paused = true)]
async fn concurrent_token_callers_share_a_transient_refresh_failure() {
    let identity = MockIdentityProvider::new().with_refresh_delay(Duration::from_millis(200));
    let harness = TestHarness::builder()
        .with_identity(identity)
        .build()
        .await
        .unwrap();
    let session = &harness.engine().session;
    harness.login(ADVISOR).await.unwrap();
    for _ in 0..2 {
        harness
            .identity
            .push_refresh(Err(FieldsyncError::TransientNetwork {
                message: "connection refused".into(),
            }))
            .await;
    }
    harness.advance(PAST_EXPIRY);

    let (a, b, c) = tokio::join!(session.get_token(), session.get_token(), session.get_token());
    for result in [a, b, c] {
        assert_eq!(token(result.unwrap()), Some("access-1".into()));
    }
    assert_eq!(harness.identity.refresh_calls(), 1);
    assert!(session.is_authenticated().await);
}

#[tokio::test]
async fn transient_refresh_failure_hands_out_current_token() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.login(ADVISOR).await.unwrap();
    for _ in 0..2 {
        harness
            .identity
            .push_refresh(Err(FieldsyncError::TransientNetwork {
                message: "connection refused".into(),
            }))
            .await;
    }
    harness.advance(PAST_EXPIRY);

    let session = &harness.engine().session;
    assert_eq!(token(session.get_token().await.unwrap()), Some("access-1".into()));
    assert!(session.is_authenticated().await);

    let err = session.refresh().await.unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn rotated_refresh_token_is_used_next_time() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.login(ADVISOR).await.unwrap();
    harness
        .identity
        .push_refresh(Ok(MockIdentityProvider::refresh_grant(
            "second-access",
            Some("rotated-refresh"),
        )))
        .await;

    let session = &harness.engine().session;
    harness.advance(PAST_EXPIRY);
    assert_eq!(
        token(session.get_token().await.unwrap()),
        Some("second-access".into())
    );
    harness.advance(PAST_EXPIRY);
    session.get_token().await.unwrap();

    assert_eq!(
        harness.identity.refresh_tokens_seen().await,
        vec!["refresh-1", "rotated-refresh"]
    );
}

#[tokio::test]
async fn login_without_remember_me_drops_persisted_copy() {
    let mut harness = TestHarness::builder().build().await.unwrap();
    harness.login(ADVISOR).await.unwrap();
    harness
        .engine()
        .session
        .login(ADVISOR, "secret", false)
        .await
        .unwrap();
    assert!(harness.engine().session.is_authenticated().await);

    harness.restart(true);
    assert_eq!(harness.engine().session.restore_session().await.unwrap(), None);
}

#[tokio::test]
async fn logout_clears_everything_and_notifies() {
    let mut harness = TestHarness::builder().build().await.unwrap();
    let mut events = harness.engine().bus.subscribe();
    harness.login(ADVISOR).await.unwrap();

    harness.engine().session.logout().await.unwrap();
    assert!(harness.engine().session.get_token().await.unwrap().is_none());
    assert_eq!(events.recv().await.unwrap(), SyncEvent::SessionEnded);

    harness.restart(true);
    assert_eq!(harness.engine().session.restore_session().await.unwrap(), None);
}
