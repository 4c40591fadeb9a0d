// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock mutation transport for deterministic testing.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use fieldsync_core::{Adapter, FieldsyncError, HealthStatus, ServerAck, Transport, TransportError};

/// One recorded call to [`MockTransport::send`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentRequest {
    pub endpoint: String,
    pub payload: serde_json::Value,
    pub idempotency_key: String,
    pub token: String,
}

/// A transport that answers from a FIFO script.
///
/// When the script is empty every send is accepted.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<VecDeque<Result<ServerAck, TransportError>>>>,
    calls: Arc<Mutex<Vec<SentRequest>>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: Vec<Result<ServerAck, TransportError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::from(responses))),
            ..Self::default()
        }
    }

    /// Make every send take `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn push_response(&self, response: Result<ServerAck, TransportError>) {
        self.script.lock().await.push_back(response);
    }

    pub async fn calls(&self) -> Vec<SentRequest> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl Adapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    async fn health_check(&self) -> Result<HealthStatus, FieldsyncError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        endpoint: &str,
        payload: &serde_json::Value,
        idempotency_key: &str,
        token: &str,
    ) -> Result<ServerAck, TransportError> {
        self.calls.lock().await.push(SentRequest {
            endpoint: endpoint.to_string(),
            payload: payload.clone(),
            idempotency_key: idempotency_key.to_string(),
            token: token.to_string(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or(Ok(ServerAck::Accepted))
    }
}
