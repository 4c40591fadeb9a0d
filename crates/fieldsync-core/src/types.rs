// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the store, the engine, and the adapters.

use std::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Unique local identifier of a queued mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub String);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Kind of field mutation. Each kind is its own queue partition.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// Visit feedback captured by the representative.
    Feedback,
    /// Shelf inventory count.
    Inventory,
    /// Reported stockout of a SKU.
    Stockout,
    /// Closure of a visit (outcome and timestamps).
    VisitClosure,
}

impl OperationType {
    /// All operation types, in a stable order.
    pub const ALL: [OperationType; 4] = [
        OperationType::Feedback,
        OperationType::Inventory,
        OperationType::Stockout,
        OperationType::VisitClosure,
    ];

    /// Server path the mutation is posted to.
    pub fn endpoint(&self) -> &'static str {
        match self {
            OperationType::Feedback => "/api/feedback",
            OperationType::Inventory => "/api/inventory",
            OperationType::Stockout => "/api/stockouts",
            OperationType::VisitClosure => "/api/visits/close",
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Lifecycle state of a queued mutation.
///
/// `Sent` has no variant: a successfully transmitted item is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ItemStatus {
    /// Waiting for its first transmission (or released unsent).
    Pending,
    /// Claimed by a drain cycle; no one else may transmit it.
    Sending,
    /// Failed retryably; not due before `next_retry_at` (epoch ms).
    Error { next_retry_at: i64 },
    /// Out of retries or permanently rejected. Needs a human.
    Dead,
}

impl ItemStatus {
    pub fn kind(&self) -> StatusKind {
        match self {
            ItemStatus::Pending => StatusKind::Pending,
            ItemStatus::Sending => StatusKind::Sending,
            ItemStatus::Error { .. } => StatusKind::Error,
            ItemStatus::Dead => StatusKind::Dead,
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())
    }
}

/// Fieldless mirror of [`ItemStatus`], used for filters and storage.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Pending,
    Sending,
    Error,
    Dead,
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// A mutation captured on the device and waiting to reach the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: ItemId,
    /// Generated once at creation and sent on every attempt.
    pub idempotency_key: String,
    pub op_type: OperationType,
    pub payload: serde_json::Value,
    /// Epoch milliseconds.
    pub created_at: i64,
    pub attempts: u32,
    pub status: ItemStatus,
    pub last_error: Option<String>,
}

impl QueueItem {
    pub fn next_retry_at(&self) -> Option<i64> {
        match self.status {
            ItemStatus::Error { next_retry_at } => Some(next_retry_at),
            _ => None,
        }
    }

    /// Whether the item may be claimed at `now_ms`.
    pub fn is_due(&self, now_ms: i64) -> bool {
        match self.status {
            ItemStatus::Pending => true,
            ItemStatus::Error { next_retry_at } => next_retry_at <= now_ms,
            ItemStatus::Sending | ItemStatus::Dead => false,
        }
    }
}

/// What the server said about a delivered mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerAck {
    /// First delivery of this idempotency key.
    Accepted,
    /// The key was already processed; treated as success.
    Duplicate,
}

/// Role of an authenticated user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Field sales representative.
    Asesor,
    Supervisor,
    Admin,
}

/// An authenticated user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub role: Role,
}

/// Authenticated session owned by the session manager.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    /// Epoch milliseconds at which `access_token` stops being valid.
    pub expires_at: i64,
    pub user: User,
    /// Whether the session survives a restart.
    pub persist: bool,
}

impl Session {
    /// True once `now_ms` is within `skew_ms` of expiry.
    pub fn is_expired(&self, now_ms: i64, skew_ms: i64) -> bool {
        now_ms.saturating_add(skew_ms) >= self.expires_at
    }
}

/// Successful login response from the identity provider.
#[derive(Debug, Clone)]
pub struct LoginGrant {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub expires_in_secs: i64,
    pub user: User,
}

/// Successful refresh response. A rotated refresh token replaces the old one.
#[derive(Debug, Clone)]
pub struct RefreshGrant {
    pub access_token: SecretString,
    pub expires_in_secs: i64,
    pub refresh_token: Option<SecretString>,
}

// --- Reference data ---

/// Visit priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Alta,
    Media,
    Baja,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// A client on the representative's route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    pub coordinates: Option<Coordinates>,
    /// Commercial segment (BRONCE, PLATA, ORO, PLATINO, TITANIO).
    pub segment: String,
    pub visit_reason: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    Venta,
    Cobranza,
    Merchandising,
    Informacion,
}

/// Suggested action for a client visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub client_id: String,
    pub kind: RecommendationKind,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub visit_reason: String,
    pub sku: Option<String>,
}

/// A full day of route data for one representative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlan {
    pub id: String,
    /// ISO date, `YYYY-MM-DD`.
    pub date: String,
    pub advisor_id: String,
    pub clients: Vec<Client>,
    pub recommendations: Vec<Recommendation>,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn item(status: ItemStatus) -> QueueItem {
        QueueItem {
            id: ItemId("i-1".into()),
            idempotency_key: "k-1".into(),
            op_type: OperationType::Stockout,
            payload: serde_json::json!({"sku": "A1"}),
            created_at: 0,
            attempts: 0,
            status,
            last_error: None,
        }
    }

    #[test]
    fn operation_type_parses_snake_case() {
        assert_eq!(
            OperationType::from_str("visit_closure").unwrap(),
            OperationType::VisitClosure
        );
        assert_eq!(OperationType::VisitClosure.to_string(), "visit_closure");
        assert!(OperationType::from_str("visits").is_err());
    }

    #[test]
    fn every_operation_type_has_an_endpoint() {
        for op in OperationType::ALL {
            assert!(op.endpoint().starts_with("/api/"), "{op}");
        }
    }

    #[test]
    fn due_rules_follow_status() {
        assert!(item(ItemStatus::Pending).is_due(0));
        assert!(!item(ItemStatus::Sending).is_due(i64::MAX));
        assert!(!item(ItemStatus::Dead).is_due(i64::MAX));

        let waiting = item(ItemStatus::Error { next_retry_at: 5_000 });
        assert!(!waiting.is_due(4_999));
        assert!(waiting.is_due(5_000));
        assert_eq!(waiting.next_retry_at(), Some(5_000));
        assert_eq!(item(ItemStatus::Pending).next_retry_at(), None);
    }

    #[test]
    fn session_expiry_honours_skew() {
        let session = Session {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at: 10_000,
            user: User {
                id: "123456".into(),
                display_name: "Ana".into(),
                role: Role::Asesor,
            },
            persist: true,
        };
        assert!(!session.is_expired(5_000, 1_000));
        assert!(session.is_expired(9_500, 1_000));
        assert!(session.is_expired(10_000, 0));
    }

    #[test]
    fn session_debug_redacts_tokens() {
        let session = Session {
            access_token: "very-secret-access".into(),
            refresh_token: "very-secret-refresh".into(),
            expires_at: 0,
            user: User {
                id: "123456".into(),
                display_name: "Ana".into(),
                role: Role::Admin,
            },
            persist: false,
        };
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("very-secret"));
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Supervisor).unwrap(), "\"supervisor\"");
        assert_eq!(Role::from_str("asesor").unwrap(), Role::Asesor);
    }
}
