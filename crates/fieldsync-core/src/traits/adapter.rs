// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base trait that all boundary adapters implement.

use async_trait::async_trait;

use crate::error::FieldsyncError;
use crate::types::HealthStatus;

/// Identity and health of an adapter.
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, FieldsyncError>;
}
