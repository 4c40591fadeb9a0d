// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock route plan source backed by a map of dates.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use fieldsync_core::types::RoutePlan;
use fieldsync_core::{Adapter, FieldsyncError, HealthStatus, ReferenceSource, TransportError};

#[derive(Debug, Clone, Default)]
pub struct MockReferenceSource {
    plans: Arc<Mutex<HashMap<String, RoutePlan>>>,
    failures: Arc<Mutex<VecDeque<TransportError>>>,
    tokens_seen: Arc<Mutex<Vec<String>>>,
}

impl MockReferenceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_plan(&self, plan: RoutePlan) {
        self.plans.lock().await.insert(plan.date.clone(), plan);
    }

    /// Fail the next fetch with `err`. Queued failures are used in order.
    pub async fn fail_next(&self, err: TransportError) {
        self.failures.lock().await.push_back(err);
    }

    pub async fn tokens_seen(&self) -> Vec<String> {
        self.tokens_seen.lock().await.clone()
    }
}

#[async_trait]
impl Adapter for MockReferenceSource {
    fn name(&self) -> &str {
        "mock-reference"
    }

    async fn health_check(&self) -> Result<HealthStatus, FieldsyncError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl ReferenceSource for MockReferenceSource {
    async fn fetch_route_plan(&self, date: &str, token: &str) -> Result<RoutePlan, TransportError> {
        self.tokens_seen.lock().await.push(token.to_string());
        if let Some(err) = self.failures.lock().await.pop_front() {
            return Err(err);
        }
        self.plans
            .lock()
            .await
            .get(date)
            .cloned()
            .ok_or_else(|| TransportError::ServerPermanent {
                status: 404,
                message: format!("no route plan for {date}"),
            })
    }
}
