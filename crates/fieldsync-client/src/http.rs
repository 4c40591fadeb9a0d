// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared reqwest client and HTTP status classification.

use std::time::Duration;

use fieldsync_config::model::ApiConfig;
use fieldsync_core::{AuthErrorKind, FieldsyncError, ServerAck, TransportError};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};

use crate::wire::ApiErrorBody;

pub(crate) const REQUEST_ID_HEADER: &str = "X-Request-ID";
pub(crate) const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Connection pool and base URL shared by every adapter.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, FieldsyncError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .user_agent(concat!("fieldsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FieldsyncError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, FieldsyncError> {
        Self::new(
            &config.base_url,
            config.request_timeout(),
            config.connect_timeout(),
        )
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

pub(crate) fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
pub(crate) fn retry_after_header(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn is_transient_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 425 | 429) || status.is_server_error()
}

/// Map a mutation response to its acknowledgement or failure class.
///
/// 409 means the idempotency key was already processed.
pub(crate) fn classify_mutation(
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
) -> Result<ServerAck, TransportError> {
    if status.is_success() {
        return Ok(ServerAck::Accepted);
    }
    if status == StatusCode::CONFLICT {
        return Ok(ServerAck::Duplicate);
    }
    Err(classify_failure(status, headers, body))
}

/// Failure class of a non-2xx response.
pub(crate) fn classify_failure(status: StatusCode, headers: &HeaderMap, body: &str) -> TransportError {
    let parsed = ApiErrorBody::parse(body);
    let message = parsed.describe(body);

    if status == StatusCode::UNAUTHORIZED {
        TransportError::Unauthorized
    } else if is_transient_status(status) {
        TransportError::ServerTransient {
            status: status.as_u16(),
            message,
            retry_after: retry_after_header(headers)
                .or_else(|| parsed.retry_after.map(Duration::from_secs)),
        }
    } else {
        TransportError::ServerPermanent {
            status: status.as_u16(),
            message,
        }
    }
}

/// Transport-level failure (no HTTP response).
pub(crate) fn classify_send_error(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(err.to_string())
    }
}

/// Map an identity endpoint failure into the engine's error taxonomy.
pub(crate) fn classify_identity_failure(
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
) -> FieldsyncError {
    let parsed = ApiErrorBody::parse(body);
    let message = parsed.describe(body);

    match status.as_u16() {
        401 => FieldsyncError::auth(AuthErrorKind::InvalidCredentials, message),
        403 => FieldsyncError::auth(AuthErrorKind::AccountBlocked, message),
        429 => FieldsyncError::RateLimited {
            retry_after: retry_after_header(headers)
                .or_else(|| parsed.retry_after.map(Duration::from_secs)),
            message,
        },
        408 | 425 => FieldsyncError::TransientNetwork { message },
        s if (500..600).contains(&s) => FieldsyncError::TransientNetwork {
            message: format!("server returned {s}: {message}"),
        },
        _ => FieldsyncError::Validation { message },
    }
}

pub(crate) fn identity_send_error(err: &reqwest::Error) -> FieldsyncError {
    FieldsyncError::TransientNetwork {
        message: if err.is_timeout() {
            "identity request timed out".to_string()
        } else {
            format!("identity request failed: {err}")
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers_with_retry_after(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn success_and_conflict_are_acknowledged() {
        let none = HeaderMap::new();
        assert_eq!(
            classify_mutation(StatusCode::CREATED, &none, ""),
            Ok(ServerAck::Accepted)
        );
        assert_eq!(
            classify_mutation(StatusCode::CONFLICT, &none, ""),
            Ok(ServerAck::Duplicate)
        );
    }

    #[test]
    fn transient_statuses() {
        let none = HeaderMap::new();
        for code in [408u16, 425, 429, 500, 502, 503, 504] {
            let status = StatusCode::from_u16(code).unwrap();
            let err = classify_mutation(status, &none, "").unwrap_err();
            assert!(
                matches!(err, TransportError::ServerTransient { status, .. } if status == code),
                "{code}"
            );
        }
    }

    #[test]
    fn permanent_statuses() {
        let none = HeaderMap::new();
        for code in [400u16, 403, 404, 422] {
            let status = StatusCode::from_u16(code).unwrap();
            let err = classify_mutation(status, &none, r#"{"error":"BAD","message":"nope"}"#)
                .unwrap_err();
            assert_eq!(
                err,
                TransportError::ServerPermanent {
                    status: code,
                    message: "BAD: nope".into()
                }
            );
        }
    }

    #[test]
    fn unauthorized_is_distinct() {
        assert_eq!(
            classify_mutation(StatusCode::UNAUTHORIZED, &HeaderMap::new(), ""),
            Err(TransportError::Unauthorized)
        );
    }

    #[test]
    fn retry_after_prefers_header_then_body() {
        let err = classify_failure(
            StatusCode::TOO_MANY_REQUESTS,
            &headers_with_retry_after("120"),
            r#"{"retryAfter": 5}"#,
        );
        assert_eq!(err.retry_after(), Some(Duration::from_secs(120)));

        let err = classify_failure(
            StatusCode::TOO_MANY_REQUESTS,
            &HeaderMap::new(),
            r#"{"error":"RATE_LIMITED","message":"slow","retryAfter": 5}"#,
        );
        assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));

        let err = classify_failure(
            StatusCode::SERVICE_UNAVAILABLE,
            &headers_with_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"),
            "",
        );
        assert_eq!(err.retry_after(), None);
    }

    #[test]
    fn identity_failures_map_to_auth_kinds() {
        let none = HeaderMap::new();
        assert!(matches!(
            classify_identity_failure(StatusCode::UNAUTHORIZED, &none, ""),
            FieldsyncError::Auth { kind: AuthErrorKind::InvalidCredentials, .. }
        ));
        assert!(matches!(
            classify_identity_failure(StatusCode::FORBIDDEN, &none, ""),
            FieldsyncError::Auth { kind: AuthErrorKind::AccountBlocked, .. }
        ));
        assert!(matches!(
            classify_identity_failure(StatusCode::UNPROCESSABLE_ENTITY, &none, ""),
            FieldsyncError::Validation { .. }
        ));
        assert!(classify_identity_failure(StatusCode::BAD_GATEWAY, &none, "").is_retryable());
        assert_eq!(
            classify_identity_failure(
                StatusCode::TOO_MANY_REQUESTS,
                &headers_with_retry_after("30"),
                ""
            )
            .retry_after(),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn url_joins_without_double_slash() {
        let client =
            ApiClient::new("http://localhost:8000/", Duration::from_secs(1), Duration::from_secs(1))
                .unwrap();
        assert_eq!(client.url("/api/health"), "http://localhost:8000/api/health");
    }
}
