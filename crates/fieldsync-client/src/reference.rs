// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Route plan source backed by `GET /api/plan-de-ruta`.

use async_trait::async_trait;
use tracing::debug;

use fieldsync_core::types::RoutePlan;
use fieldsync_core::{Adapter, FieldsyncError, HealthStatus, ReferenceSource, TransportError};

use crate::http::{ApiClient, REQUEST_ID_HEADER, classify_failure, classify_send_error, new_request_id};
use crate::wire::PlanDeRutaDto;

const ROUTE_PLAN_PATH: &str = "/api/plan-de-ruta";

#[derive(Debug, Clone)]
pub struct HttpReferenceSource {
    api: ApiClient,
}

impl HttpReferenceSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Adapter for HttpReferenceSource {
    fn name(&self) -> &str {
        "http-reference"
    }

    async fn health_check(&self) -> Result<HealthStatus, FieldsyncError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl ReferenceSource for HttpReferenceSource {
    async fn fetch_route_plan(&self, date: &str, token: &str) -> Result<RoutePlan, TransportError> {
        let response = self
            .api
            .http()
            .get(format!("{}?fecha={date}", self.api.url(ROUTE_PLAN_PATH)))
            .bearer_auth(token)
            .header(REQUEST_ID_HEADER, new_request_id())
            .send()
            .await
            .map_err(|e| classify_send_error(&e))?;

        let status = response.status();
        debug!(%status, date, "route plan response received");
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &headers, &body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_send_error(&e))?;
        let plan: PlanDeRutaDto =
            serde_json::from_str(&body).map_err(|e| TransportError::ServerPermanent {
                status: status.as_u16(),
                message: format!("malformed route plan: {e}"),
            })?;
        Ok(plan.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer) -> HttpReferenceSource {
        HttpReferenceSource::new(
            ApiClient::new(&server.uri(), Duration::from_secs(2), Duration::from_secs(1)).unwrap(),
        )
    }

    #[tokio::test]
    async fn fetches_plan_for_date() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ROUTE_PLAN_PATH))
            .and(query_param("fecha", "2026-03-01"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "plan-1",
                "fecha": "2026-03-01",
                "asesorId": "123456",
                "clientes": [],
                "recomendaciones": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let plan = source(&server).fetch_route_plan("2026-03-01", "tok").await.unwrap();
        assert_eq!(plan.id, "plan-1");
        assert_eq!(plan.date, "2026-03-01");
    }

    #[tokio::test]
    async fn expired_token_is_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = source(&server).fetch_route_plan("2026-03-01", "old").await.unwrap_err();
        assert_eq!(err, TransportError::Unauthorized);
    }

    #[tokio::test]
    async fn malformed_body_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\": 1}"))
            .mount(&server)
            .await;

        let err = source(&server).fetch_route_plan("2026-03-01", "t").await.unwrap_err();
        assert!(matches!(err, TransportError::ServerPermanent { status: 200, .. }));
    }
}
