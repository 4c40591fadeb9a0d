// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reachability probe against `GET /api/health`.
//!
//! Supplies the raw connectivity signal in daemon mode. The probe only
//! reports; debouncing is the gatekeeper's job.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use fieldsync_core::{Adapter, FieldsyncError, HealthStatus};

use crate::http::{ApiClient, REQUEST_ID_HEADER, new_request_id};

const HEALTH_PATH: &str = "/api/health";

#[derive(Debug, Clone)]
pub struct HealthProbe {
    api: ApiClient,
}

impl HealthProbe {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Whether the backend answered the health endpoint with a 2xx.
    pub async fn is_reachable(&self) -> bool {
        let result = self
            .api
            .http()
            .get(self.api.url(HEALTH_PATH))
            .header(REQUEST_ID_HEADER, new_request_id())
            .send()
            .await;
        match result {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "health probe failed");
                false
            }
        }
    }

    /// Probe every `interval` and hand each result to `report` until
    /// `cancel` fires.
    pub async fn run<F>(&self, interval: Duration, cancel: CancellationToken, mut report: F)
    where
        F: FnMut(bool) + Send,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("health probe stopped");
                    return;
                }
                _ = ticker.tick() => {
                    report(self.is_reachable().await);
                }
            }
        }
    }
}

#[async_trait]
impl Adapter for HealthProbe {
    fn name(&self) -> &str {
        "http-health"
    }

    async fn health_check(&self) -> Result<HealthStatus, FieldsyncError> {
        if self.is_reachable().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy(format!(
                "{} is unreachable",
                self.api.url(HEALTH_PATH)
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn probe(base: &str) -> HealthProbe {
        HealthProbe::new(ApiClient::new(base, Duration::from_secs(1), Duration::from_secs(1)).unwrap())
    }

    #[tokio::test]
    async fn healthy_backend_is_reachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(HEALTH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok", "message": "backend is running"
            })))
            .mount(&server)
            .await;

        let probe = probe(&server.uri());
        assert!(probe.is_reachable().await);
        assert_eq!(probe.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn server_error_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        assert!(!probe(&server.uri()).is_reachable().await);
    }

    #[tokio::test]
    async fn run_reports_until_cancelled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let cancel = CancellationToken::new();
        let probe = probe(&server.uri());

        let task = {
            let seen = Arc::clone(&seen);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                probe
                    .run(Duration::from_millis(20), cancel, move |online| {
                        seen.lock().unwrap().push(online)
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(120)).await;
        cancel.cancel();
        task.await.unwrap();

        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|online| *online));
    }
}
