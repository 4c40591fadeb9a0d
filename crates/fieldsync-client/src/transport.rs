// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mutation transport over HTTP.

use async_trait::async_trait;
use tracing::debug;

use fieldsync_core::{Adapter, FieldsyncError, HealthStatus, ServerAck, Transport, TransportError};

use crate::http::{
    ApiClient, IDEMPOTENCY_KEY_HEADER, REQUEST_ID_HEADER, classify_mutation, classify_send_error,
    new_request_id,
};

/// Posts queued mutations to the backend.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    api: ApiClient,
}

impl HttpTransport {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Adapter for HttpTransport {
    fn name(&self) -> &str {
        "http-transport"
    }

    async fn health_check(&self) -> Result<HealthStatus, FieldsyncError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        endpoint: &str,
        payload: &serde_json::Value,
        idempotency_key: &str,
        token: &str,
    ) -> Result<ServerAck, TransportError> {
        let request_id = new_request_id();
        let response = self
            .api
            .http()
            .post(self.api.url(endpoint))
            .bearer_auth(token)
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key)
            .header(REQUEST_ID_HEADER, &request_id)
            .json(payload)
            .send()
            .await
            .map_err(|e| classify_send_error(&e))?;

        let status = response.status();
        let headers = response.headers().clone();
        debug!(%status, endpoint, request_id, "mutation response received");

        if status.is_success() {
            return Ok(ServerAck::Accepted);
        }
        let body = response.text().await.unwrap_or_default();
        classify_mutation(status, &headers, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(server: &MockServer) -> HttpTransport {
        HttpTransport::new(
            ApiClient::new(&server.uri(), Duration::from_millis(500), Duration::from_secs(1))
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn sends_required_headers_and_body() {
        let server = MockServer::start().await;
        let payload = serde_json::json!({"clientId": "c1", "sku": "A1"});

        Mock::given(method("POST"))
            .and(path("/api/stockouts"))
            .and(header("authorization", "Bearer tok-1"))
            .and(header("idempotency-key", "key-1"))
            .and(header_exists("x-request-id"))
            .and(body_json(&payload))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let ack = transport(&server)
            .send("/api/stockouts", &payload, "key-1", "tok-1")
            .await
            .unwrap();
        assert_eq!(ack, ServerAck::Accepted);
    }

    #[tokio::test]
    async fn conflict_is_a_duplicate_ack() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let ack = transport(&server)
            .send("/api/feedback", &serde_json::json!({}), "k", "t")
            .await
            .unwrap();
        assert_eq!(ack, ServerAck::Duplicate);
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", "7")
                    .set_body_json(serde_json::json!({"error": "RATE_LIMITED", "message": "slow down"})),
            )
            .mount(&server)
            .await;

        let err = transport(&server)
            .send("/api/inventory", &serde_json::json!({}), "k", "t")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TransportError::ServerTransient {
                status: 429,
                message: "RATE_LIMITED: slow down".into(),
                retry_after: Some(Duration::from_secs(7)),
            }
        );
    }

    #[tokio::test]
    async fn unauthorized_and_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/visits/close"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/feedback"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad payload"))
            .mount(&server)
            .await;

        let t = transport(&server);
        let body = serde_json::json!({});
        assert_eq!(
            t.send("/api/visits/close", &body, "k", "t").await,
            Err(TransportError::Unauthorized)
        );
        assert!(matches!(
            t.send("/api/feedback", &body, "k", "t").await,
            Err(TransportError::ServerPermanent { status: 422, .. })
        ));
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let err = transport(&server)
            .send("/api/feedback", &serde_json::json!({}), "k", "t")
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Timeout);
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        // Port 9 (discard) is closed on test hosts.
        let api = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(2), Duration::from_secs(1))
            .unwrap();
        let err = HttpTransport::new(api)
            .send("/api/feedback", &serde_json::json!({}), "k", "t")
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Network(_) | TransportError::Timeout));
        assert!(err.is_retryable());
    }
}
