// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mutation transport consumed by the sync orchestrator.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::traits::adapter::Adapter;
use crate::types::ServerAck;

/// Delivers one queued mutation to the server.
///
/// Implementations must forward `idempotency_key` unchanged on every call so
/// the server can collapse repeated deliveries of the same item.
#[async_trait]
pub trait Transport: Adapter {
    async fn send(
        &self,
        endpoint: &str,
        payload: &serde_json::Value,
        idempotency_key: &str,
        token: &str,
    ) -> Result<ServerAck, TransportError>;
}
