// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the fieldsync offline synchronization engine.
//!
//! This crate provides the error taxonomy, the domain types (queue items,
//! sessions, reference data), the clock abstraction, and the adapter traits
//! implemented by the HTTP client and by test doubles.

pub mod clock;
pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AuthErrorKind, FieldsyncError, TransportError};
pub use types::{
    HealthStatus, ItemId, ItemStatus, OperationType, QueueItem, ServerAck, Session, StatusKind,
    User,
};

pub use traits::{Adapter, IdentityProvider, ReferenceSource, Transport};
