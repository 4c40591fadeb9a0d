// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed event bus connecting the sync engine to the UI layer.
//!
//! Events are fanned out over a `tokio::sync::broadcast` channel. Publishing
//! never blocks and never fails; a subscriber that falls behind by more than
//! the channel capacity observes a lag and skips ahead.

use fieldsync_core::OperationType;
use serde::Serialize;
use tokio::sync::broadcast;

/// Default number of buffered events per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

/// Something the UI may want to react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A debounced connectivity transition was committed.
    ConnectivityChanged { online: bool },
    /// A drain cycle finished.
    DrainCompleted {
        sent: usize,
        retried: usize,
        dead: usize,
        released: usize,
    },
    /// A queued mutation exhausted its retries or was permanently rejected.
    ItemDead {
        id: String,
        op_type: OperationType,
        error: String,
    },
    /// The credential became invalid while syncing; the user must log in.
    AuthLost,
    /// The session ended (logout or teardown).
    SessionEnded,
}

/// Cloneable handle to the broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to every current subscriber.
    pub fn publish(&self, event: SyncEvent) {
        tracing::debug!(?event, "publishing sync event");
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
