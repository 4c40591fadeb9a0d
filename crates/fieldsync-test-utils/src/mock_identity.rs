// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock identity provider.
//!
//! Login and refresh answer from separate FIFO scripts. With an empty
//! script, login succeeds for any id and refresh issues `refreshed-<n>`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use fieldsync_core::types::{LoginGrant, RefreshGrant, Role};
use fieldsync_core::{Adapter, FieldsyncError, HealthStatus, IdentityProvider, User};

/// Token lifetime handed out by default, in seconds.
pub const DEFAULT_EXPIRES_IN: i64 = 900;

#[derive(Debug, Clone, Default)]
pub struct MockIdentityProvider {
    logins: Arc<Mutex<VecDeque<Result<LoginGrant, FieldsyncError>>>>,
    refreshes: Arc<Mutex<VecDeque<Result<RefreshGrant, FieldsyncError>>>>,
    login_calls: Arc<AtomicUsize>,
    refresh_calls: Arc<AtomicUsize>,
    refresh_tokens_seen: Arc<Mutex<Vec<String>>>,
    refresh_delay: Option<Duration>,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every refresh take `delay`, so concurrent callers overlap.
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    pub async fn push_login(&self, result: Result<LoginGrant, FieldsyncError>) {
        self.logins.lock().await.push_back(result);
    }

    pub async fn push_refresh(&self, result: Result<RefreshGrant, FieldsyncError>) {
        self.refreshes.lock().await.push_back(result);
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Refresh tokens presented so far, in call order.
    pub async fn refresh_tokens_seen(&self) -> Vec<String> {
        self.refresh_tokens_seen.lock().await.clone()
    }

    /// A login grant for an advisor with the given tokens.
    pub fn grant(user_id: &str, access: &str, refresh: &str, expires_in_secs: i64) -> LoginGrant {
        LoginGrant {
            access_token: access.into(),
            refresh_token: refresh.into(),
            expires_in_secs,
            user: User {
                id: user_id.to_string(),
                display_name: format!("Advisor {user_id}"),
                role: Role::Asesor,
            },
        }
    }

    pub fn refresh_grant(access: &str, rotated: Option<&str>) -> RefreshGrant {
        RefreshGrant {
            access_token: access.into(),
            expires_in_secs: DEFAULT_EXPIRES_IN,
            refresh_token: rotated.map(Into::into),
        }
    }
}

#[async_trait]
impl Adapter for MockIdentityProvider {
    fn name(&self) -> &str {
        "mock-identity"
    }

    async fn health_check(&self) -> Result<HealthStatus, FieldsyncError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn login(&self, id: &str, _password: &str) -> Result<LoginGrant, FieldsyncError> {
        let n = self.login_calls.fetch_add(1, Ordering::SeqCst) + 1;
        match self.logins.lock().await.pop_front() {
            Some(result) => result,
            None => Ok(Self::grant(
                id,
                &format!("access-{n}"),
                &format!("refresh-{n}"),
                DEFAULT_EXPIRES_IN,
            )),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshGrant, FieldsyncError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.refresh_tokens_seen
            .lock()
            .await
            .push(refresh_token.to_string());
        if let Some(delay) = self.refresh_delay {
            tokio::time::sleep(delay).await;
        }
        match self.refreshes.lock().await.pop_front() {
            Some(result) => result,
            None => Ok(Self::refresh_grant(&format!("refreshed-{n}"), None)),
        }
    }
}
