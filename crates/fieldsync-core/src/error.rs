// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the fieldsync engine.
//!
//! [`FieldsyncError`] is the single error type crossing crate boundaries.
//! [`TransportError`] is the narrower taxonomy returned by the mutation
//! transport, which the orchestrator resolves into queue transitions.

use std::time::Duration;

use strum::{Display, EnumString};
use thiserror::Error;

/// Why an authentication attempt or session was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AuthErrorKind {
    /// The identity provider rejected the id/password or refresh token.
    InvalidCredentials,
    /// The account is blocked or inactive server-side.
    AccountBlocked,
    /// The refresh token is no longer accepted; re-authentication required.
    SessionExpired,
    /// No session exists.
    NotAuthenticated,
}

/// The primary error type used across all fieldsync crates.
#[derive(Debug, Error)]
pub enum FieldsyncError {
    /// Configuration errors (invalid TOML, failed validation).
    #[error("configuration error: {0}")]
    Config(String),

    /// Local store errors (open, migration, query, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Input rejected without retry (local validation or server 4xx).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Credential problems. `InvalidCredentials` and `SessionExpired`
    /// require the user to log in again.
    #[error("authentication error ({kind}): {message}")]
    Auth { kind: AuthErrorKind, message: String },

    /// Server unreachable or transient server failure.
    #[error("transient network error: {message}")]
    TransientNetwork { message: String },

    /// The server asked us to slow down.
    #[error("rate limited: {message}")]
    RateLimited {
        retry_after: Option<Duration>,
        message: String,
    },

    /// A queued item used up its retry budget and is now dead.
    #[error("item {item_id} exhausted its retries after {attempts} attempts")]
    ExhaustedRetries { item_id: String, attempts: u32 },

    /// Requested entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A queue item was asked to move along an edge its state machine lacks.
    #[error("invalid transition for item {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: &'static str,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl FieldsyncError {
    /// Wraps any error as a storage error.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            source: Box::new(err),
        }
    }

    /// Shorthand for an authentication error.
    pub fn auth(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self::Auth {
            kind,
            message: message.into(),
        }
    }

    /// Whether the failure is worth retrying automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientNetwork { .. } | Self::RateLimited { .. } | Self::Timeout { .. }
        )
    }

    /// Server-provided minimum delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Whether this error means the user has to log in again.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Self::Auth {
                kind: AuthErrorKind::InvalidCredentials
                    | AuthErrorKind::SessionExpired
                    | AuthErrorKind::NotAuthenticated,
                ..
            }
        )
    }
}

/// Outcome taxonomy of a single mutation transmission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No route to the server (DNS, connect, reset).
    #[error("network unreachable: {0}")]
    Network(String),

    /// The call did not complete within its deadline.
    #[error("request timed out")]
    Timeout,

    /// 5xx, 408, 425 or 429: try again later.
    #[error("server transient failure ({status}): {message}")]
    ServerTransient {
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },

    /// The server will never accept this payload.
    #[error("server rejected payload ({status}): {message}")]
    ServerPermanent { status: u16, message: String },

    /// The access token was not accepted.
    #[error("unauthorized")]
    Unauthorized,
}

impl TransportError {
    /// Retryable outcomes reschedule the item; the rest freeze it.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::ServerPermanent { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::ServerTransient { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<TransportError> for FieldsyncError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Network(message) => Self::TransientNetwork { message },
            TransportError::Timeout => Self::TransientNetwork {
                message: "request timed out".into(),
            },
            TransportError::ServerTransient {
                status: 429,
                message,
                retry_after,
            } => Self::RateLimited {
                retry_after,
                message,
            },
            TransportError::ServerTransient { status, message, .. } => Self::TransientNetwork {
                message: format!("server returned {status}: {message}"),
            },
            TransportError::ServerPermanent { message, .. } => Self::Validation { message },
            TransportError::Unauthorized => {
                Self::auth(AuthErrorKind::SessionExpired, "access token rejected")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(FieldsyncError::TransientNetwork {
            message: "down".into()
        }
        .is_retryable());
        assert!(FieldsyncError::Timeout {
            duration: Duration::from_secs(30)
        }
        .is_retryable());
        assert!(!FieldsyncError::Validation {
            message: "bad".into()
        }
        .is_retryable());
        assert!(!FieldsyncError::auth(AuthErrorKind::InvalidCredentials, "nope").is_retryable());
    }

    #[test]
    fn rate_limited_exposes_retry_after() {
        let err = FieldsyncError::from(TransportError::ServerTransient {
            status: 429,
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(120)),
        });
        assert!(matches!(err, FieldsyncError::RateLimited { .. }));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn permanent_transport_error_is_not_retryable() {
        let err = TransportError::ServerPermanent {
            status: 422,
            message: "missing sku".into(),
        };
        assert!(!err.is_retryable());
        assert!(matches!(
            FieldsyncError::from(err),
            FieldsyncError::Validation { .. }
        ));
    }

    #[test]
    fn unauthorized_requires_login() {
        let err = FieldsyncError::from(TransportError::Unauthorized);
        assert!(err.requires_login());
        assert!(!FieldsyncError::auth(AuthErrorKind::AccountBlocked, "blocked").requires_login());
    }
}
