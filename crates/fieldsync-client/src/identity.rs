// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity provider backed by `/api/auth/*`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use fieldsync_core::types::{LoginGrant, RefreshGrant};
use fieldsync_core::{Adapter, FieldsyncError, HealthStatus, IdentityProvider};

use crate::http::{
    ApiClient, REQUEST_ID_HEADER, classify_identity_failure, identity_send_error, new_request_id,
};
use crate::wire::{LoginRequest, LoginResponse, RefreshRequest, RefreshResponse};

const LOGIN_PATH: &str = "/api/auth/login";
const REFRESH_PATH: &str = "/api/auth/refresh";

#[derive(Debug, Clone)]
pub struct HttpIdentityProvider {
    api: ApiClient,
    remember_me: bool,
}

impl HttpIdentityProvider {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            remember_me: true,
        }
    }

    /// Value sent as `rememberMe` on login.
    pub fn with_remember_me(mut self, remember_me: bool) -> Self {
        self.remember_me = remember_me;
        self
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, FieldsyncError>
    where
        B: serde::Serialize + ?Sized + Sync,
        T: DeserializeOwned + Send,
    {
        let response = self
            .api
            .http()
            .post(self.api.url(path))
            .header(REQUEST_ID_HEADER, new_request_id())
            .json(body)
            .send()
            .await
            .map_err(|e| identity_send_error(&e))?;

        let status = response.status();
        debug!(%status, path, "identity response received");
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_identity_failure(status, &headers, &body));
        }

        response.json::<T>().await.map_err(|e| FieldsyncError::TransientNetwork {
            message: format!("unreadable identity response: {e}"),
        })
    }
}

#[async_trait]
impl Adapter for HttpIdentityProvider {
    fn name(&self) -> &str {
        "http-identity"
    }

    async fn health_check(&self) -> Result<HealthStatus, FieldsyncError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn login(&self, id: &str, password: &str) -> Result<LoginGrant, FieldsyncError> {
        let body = LoginRequest {
            id,
            password,
            remember_me: self.remember_me,
        };
        let response: LoginResponse = self.post(LOGIN_PATH, &body).await?;
        Ok(response.into())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshGrant, FieldsyncError> {
        let response: RefreshResponse = self
            .post(REFRESH_PATH, &RefreshRequest { refresh_token })
            .await?;
        Ok(response.into())
    }
}
