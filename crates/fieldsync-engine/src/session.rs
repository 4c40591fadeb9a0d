// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session lifecycle: login, restore, refresh, logout.
//!
//! The in-memory [`Session`] is the only copy readers see. The persisted
//! record in the `session` partition is written after each change and read
//! once at start-up by [`SessionManager::restore_session`].
//!
//! Refresh is single-flight: concurrent callers that find the token expired
//! share one call to the identity provider and observe the same result.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use fieldsync_bus::{EventBus, SyncEvent};
use fieldsync_core::{
    AuthErrorKind, Clock, FieldsyncError, IdentityProvider, Session, User,
};
use fieldsync_resilience::SingleFlight;
use fieldsync_storage::queries::records;
use fieldsync_storage::{Database, Partition};

use crate::network::NetworkGatekeeper;

const SESSION_KEY: &str = "current";
const MIN_ID_LEN: usize = 6;
const MAX_ID_LEN: usize = 10;

/// Persisted form of a [`Session`].
#[derive(Serialize, Deserialize)]
struct StoredSession {
    access_token: String,
    refresh_token: String,
    expires_at: i64,
    user: User,
}

impl StoredSession {
    fn from_session(session: &Session) -> Self {
        Self {
            access_token: session.access_token.expose_secret().to_string(),
            refresh_token: session.refresh_token.expose_secret().to_string(),
            expires_at: session.expires_at,
            user: session.user.clone(),
        }
    }

    fn into_session(self) -> Session {
        Session {
            access_token: self.access_token.into(),
            refresh_token: self.refresh_token.into(),
            expires_at: self.expires_at,
            user: self.user,
            persist: true,
        }
    }
}

/// Result of a shared refresh flight. Cloned to every waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RefreshFailure {
    /// The identity provider no longer accepts the credential.
    Rejected(String),
    /// The provider could not be reached; the old token is kept.
    Transient {
        message: String,
        retry_after: Option<Duration>,
    },
    NoSession,
}

impl From<RefreshFailure> for FieldsyncError {
    fn from(failure: RefreshFailure) -> Self {
        match failure {
            RefreshFailure::Rejected(message) => {
                FieldsyncError::auth(AuthErrorKind::SessionExpired, message)
            }
            RefreshFailure::Transient {
                message,
                retry_after: Some(delay),
            } => FieldsyncError::RateLimited {
                retry_after: Some(delay),
                message,
            },
            RefreshFailure::Transient { message, .. } => {
                FieldsyncError::TransientNetwork { message }
            }
            RefreshFailure::NoSession => {
                FieldsyncError::auth(AuthErrorKind::NotAuthenticated, "no active session")
            }
        }
    }
}

struct Inner {
    db: Database,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    network: NetworkGatekeeper,
    bus: EventBus,
    skew_ms: i64,
    state: RwLock<Option<Session>>,
    refresh_flight: SingleFlight<SecretString, RefreshFailure>,
}

/// Owns the authenticated session. Cheap to clone.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("identity", &self.inner.identity.name())
            .field("refreshing", &self.inner.refresh_flight.is_in_flight())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(
        db: Database,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
        network: NetworkGatekeeper,
        bus: EventBus,
        refresh_skew: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                db,
                identity,
                clock,
                network,
                bus,
                skew_ms: i64::try_from(refresh_skew.as_millis()).unwrap_or(i64::MAX),
                state: RwLock::new(None),
                refresh_flight: SingleFlight::new(),
            }),
        }
    }

    /// Authenticate against the identity provider.
    ///
    /// With `persist` the session survives a restart; without it any
    /// previously persisted session is removed.
    pub async fn login(
        &self,
        id: &str,
        password: &str,
        persist: bool,
    ) -> Result<User, FieldsyncError> {
        let id = id.trim();
        let len = id.chars().count();
        if !(MIN_ID_LEN..=MAX_ID_LEN).contains(&len) {
            return Err(FieldsyncError::Validation {
                message: format!("id must be {MIN_ID_LEN} to {MAX_ID_LEN} characters"),
            });
        }
        if password.is_empty() {
            return Err(FieldsyncError::Validation {
                message: "password must not be empty".into(),
            });
        }

        let grant = self.inner.identity.login(id, password).await?;
        let session = Session {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at: self.inner.expires_at(grant.expires_in_secs),
            user: grant.user,
            persist,
        };

        if persist {
            self.inner.persist(&session).await?;
        } else {
            records::delete(&self.inner.db, Partition::Session, SESSION_KEY).await?;
        }

        let user = session.user.clone();
        *self.inner.state.write().await = Some(session);
        info!(user_id = %user.id, role = %user.role, persist, "logged in");
        Ok(user)
    }

    /// Clear the session from memory and disk.
    pub async fn logout(&self) -> Result<(), FieldsyncError> {
        let user = self.inner.state.write().await.take().map(|s| s.user.id);
        records::delete(&self.inner.db, Partition::Session, SESSION_KEY).await?;
        info!(user_id = ?user, "logged out");
        self.inner.bus.publish(SyncEvent::SessionEnded);
        Ok(())
    }

    /// Load the persisted session at start-up.
    ///
    /// An expired session is accepted as-is while offline. Online, it is
    /// refreshed; only a rejected credential discards it.
    pub async fn restore_session(&self) -> Result<Option<User>, FieldsyncError> {
        let Some(stored) = records::get_as::<StoredSession>(
            &self.inner.db,
            Partition::Session,
            SESSION_KEY,
        )
        .await?
        else {
            return Ok(None);
        };

        let session = stored.into_session();
        let user = session.user.clone();
        let expired = self.inner.is_expired(&session);
        *self.inner.state.write().await = Some(session);

        if !expired {
            debug!(user_id = %user.id, "session restored");
            return Ok(Some(user));
        }
        if !self.inner.network.is_online() {
            debug!(user_id = %user.id, "offline with an expired token, keeping session until reconnect");
            return Ok(Some(user));
        }

        match self.refresh().await {
            Ok(_) => Ok(Some(user)),
            Err(e) if e.requires_login() => {
                info!(user_id = %user.id, "persisted session is no longer valid");
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "could not refresh restored session, keeping it");
                Ok(Some(user))
            }
        }
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// A rejected credential tears the session down and yields
    /// `Auth(SessionExpired)`. A transient failure keeps the old token and
    /// yields `TransientNetwork`, or `RateLimited` when the provider asked
    /// for a delay.
    pub async fn refresh(&self) -> Result<SecretString, FieldsyncError> {
        self.refresh_shared().await.map_err(FieldsyncError::from)
    }

    /// A usable access token, refreshing first if needed.
    ///
    /// Returns `Ok(None)` without a session. Offline, or when the refresh
    /// fails transiently, the current (possibly stale) token is returned.
    /// A caller that finds a refresh in flight takes that flight's result
    /// and never starts another one.
    pub async fn get_token(&self) -> Result<Option<SecretString>, FieldsyncError> {
        if let Some(flight) = self.inner.refresh_flight.in_flight() {
            debug!("waiting for in-flight refresh");
            let current = self.current_token().await;
            return settle_refresh(flight.await, current);
        }

        let Some((token, expired)) = self
            .inner
            .state
            .read()
            .await
            .as_ref()
            .map(|s| (s.access_token.clone(), self.inner.is_expired(s)))
        else {
            return Ok(None);
        };

        if !expired || !self.inner.network.is_online() {
            return Ok(Some(token));
        }

        settle_refresh(self.refresh_shared().await, Some(token))
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.state.read().await.is_some()
    }

    pub async fn current_user(&self) -> Option<User> {
        self.inner.state.read().await.as_ref().map(|s| s.user.clone())
    }
}

impl SessionManager {
    async fn refresh_shared(&self) -> Result<SecretString, RefreshFailure> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .refresh_flight
            .run(move || async move { inner.refresh_once().await })
            .await
    }

    async fn current_token(&self) -> Option<SecretString> {
        self.inner
            .state
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
    }
}

/// Map a refresh result to what [`SessionManager::get_token`] hands out.
fn settle_refresh(
    result: Result<SecretString, RefreshFailure>,
    current: Option<SecretString>,
) -> Result<Option<SecretString>, FieldsyncError> {
    match result {
        Ok(fresh) => Ok(Some(fresh)),
        Err(RefreshFailure::Transient { message, .. }) => {
            debug!(error = %message, "refresh failed transiently, using current token");
            Ok(current)
        }
        Err(failure) => Err(failure.into()),
    }
}

impl Inner {
    fn expires_at(&self, expires_in_secs: i64) -> i64 {
        self.clock
            .now_ms()
            .saturating_add(expires_in_secs.saturating_mul(1_000))
    }

    fn is_expired(&self, session: &Session) -> bool {
        session.is_expired(self.clock.now_ms(), self.skew_ms)
    }

    async fn persist(&self, session: &Session) -> Result<(), FieldsyncError> {
        records::put_as(
            &self.db,
            Partition::Session,
            SESSION_KEY,
            &StoredSession::from_session(session),
        )
        .await
    }

    async fn refresh_once(&self) -> Result<SecretString, RefreshFailure> {
        let refresh_token = self
            .state
            .read()
            .await
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .ok_or(RefreshFailure::NoSession)?;

        debug!(provider = self.identity.name(), "refreshing access token");
        match self.identity.refresh(refresh_token.expose_secret()).await {
            Ok(grant) => {
                let access = grant.access_token.clone();
                let updated = {
                    let mut state = self.state.write().await;
                    match state.as_mut() {
                        // A logout or new login during the call wins.
                        Some(session)
                            if session.refresh_token.expose_secret()
                                == refresh_token.expose_secret() =>
                        {
                            session.access_token = grant.access_token;
                            session.expires_at = self.expires_at(grant.expires_in_secs);
                            if let Some(rotated) = grant.refresh_token {
                                session.refresh_token = rotated;
                            }
                            Some(session.clone())
                        }
                        _ => None,
                    }
                };

                match updated {
                    Some(session) => {
                        if session.persist
                            && let Err(e) = self.persist(&session).await
                        {
                            warn!(error = %e, "failed to persist refreshed session");
                        }
                        info!(user_id = %session.user.id, "access token refreshed");
                        Ok(access)
                    }
                    None => Err(RefreshFailure::NoSession),
                }
            }
            Err(e @ FieldsyncError::Auth { .. }) => {
                warn!(error = %e, "refresh rejected, ending session");
                self.teardown().await;
                Err(RefreshFailure::Rejected(e.to_string()))
            }
            Err(e) => {
                warn!(error = %e, "refresh failed, keeping current token");
                let retry_after = e.retry_after();
                let message = match e {
                    FieldsyncError::RateLimited { message, .. } => message,
                    other => other.to_string(),
                };
                Err(RefreshFailure::Transient {
                    message,
                    retry_after,
                })
            }
        }
    }

    async fn teardown(&self) {
        self.state.write().await.take();
        if let Err(e) = records::delete(&self.db, Partition::Session, SESSION_KEY).await {
            warn!(error = %e, "failed to remove persisted session");
        }
        self.bus.publish(SyncEvent::SessionEnded);
    }
}
