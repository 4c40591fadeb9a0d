// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only route/reference data service.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::traits::adapter::Adapter;
use crate::types::RoutePlan;

/// Produces the full daily dataset for the authenticated representative.
#[async_trait]
pub trait ReferenceSource: Adapter {
    /// `date` is an ISO calendar day (`YYYY-MM-DD`).
    async fn fetch_route_plan(&self, date: &str, token: &str) -> Result<RoutePlan, TransportError>;
}
