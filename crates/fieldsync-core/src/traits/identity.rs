// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity provider consumed by the session manager.

use async_trait::async_trait;

use crate::error::FieldsyncError;
use crate::traits::adapter::Adapter;
use crate::types::{LoginGrant, RefreshGrant};

/// Issues and renews credentials.
///
/// Errors follow the [`FieldsyncError`] taxonomy: `Auth` for rejected
/// credentials, `TransientNetwork`/`RateLimited` for anything worth retrying.
#[async_trait]
pub trait IdentityProvider: Adapter {
    async fn login(&self, id: &str, password: &str) -> Result<LoginGrant, FieldsyncError>;

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshGrant, FieldsyncError>;
}
