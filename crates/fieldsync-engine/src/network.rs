// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Debounced connectivity state.
//!
//! The platform (or the health probe) reports raw reachability through
//! [`NetworkGatekeeper::report`]. A background task commits a transition
//! only after the raw value has held for the settle window, so a flapping
//! link never fires a burst of drains. Consumers either poll
//! [`NetworkGatekeeper::is_online`] or [`subscribe`](NetworkGatekeeper::subscribe)
//! to committed transitions.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use fieldsync_bus::{EventBus, SyncEvent};
use fieldsync_core::Clock;

const EVENT_CAPACITY: usize = 16;

/// A committed connectivity transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityEvent {
    pub online: bool,
    /// Epoch milliseconds at commit time.
    pub at: i64,
}

struct Shared {
    committed: watch::Sender<bool>,
    events: broadcast::Sender<ConnectivityEvent>,
    clock: Arc<dyn Clock>,
    bus: EventBus,
}

impl Shared {
    fn commit(&self, online: bool) {
        let changed = self.committed.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if !changed {
            debug!(online, "raw signal settled on the committed state");
            return;
        }

        info!(online, "connectivity changed");
        let _ = self.events.send(ConnectivityEvent {
            online,
            at: self.clock.now_ms(),
        });
        self.bus.publish(SyncEvent::ConnectivityChanged { online });
    }
}

struct Inner {
    raw: watch::Sender<bool>,
    shared: Arc<Shared>,
    settle: Duration,
}

/// Cloneable handle to the debounced connectivity state.
///
/// The debounce task stops once every handle has been dropped.
#[derive(Clone)]
pub struct NetworkGatekeeper {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for NetworkGatekeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkGatekeeper")
            .field("online", &self.is_online())
            .field("settle", &self.inner.settle)
            .finish()
    }
}

impl NetworkGatekeeper {
    /// Start a gatekeeper in `initial` state. Must be called inside a tokio
    /// runtime.
    pub fn new(initial: bool, settle: Duration, clock: Arc<dyn Clock>, bus: EventBus) -> Self {
        let (raw, raw_rx) = watch::channel(initial);
        let (committed, _) = watch::channel(initial);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let shared = Arc::new(Shared {
            committed,
            events,
            clock,
            bus,
        });

        tokio::spawn(debounce(raw_rx, Arc::clone(&shared), settle));

        Self {
            inner: Arc::new(Inner {
                raw,
                shared,
                settle,
            }),
        }
    }

    /// Feed a raw reachability sample.
    pub fn report(&self, online: bool) {
        self.inner.raw.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }

    /// The last committed state.
    pub fn is_online(&self) -> bool {
        *self.inner.shared.committed.borrow()
    }

    pub fn subscribe(&self) -> ConnectivitySubscription {
        ConnectivitySubscription {
            events: self.inner.shared.events.subscribe(),
        }
    }

    /// Watch channel over the committed state, for `changed()`-style waits.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.inner.shared.committed.subscribe()
    }
}

async fn debounce(mut raw: watch::Receiver<bool>, shared: Arc<Shared>, settle: Duration) {
    while raw.changed().await.is_ok() {
        loop {
            let candidate = *raw.borrow_and_update();
            tokio::select! {
                () = tokio::time::sleep(settle) => {
                    shared.commit(candidate);
                    break;
                }
                changed = raw.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    debug!("raw connectivity flapped, restarting settle window");
                }
            }
        }
    }
}

/// Receiver of committed transitions. Dropping it unsubscribes.
#[derive(Debug)]
pub struct ConnectivitySubscription {
    events: broadcast::Receiver<ConnectivityEvent>,
}

impl ConnectivitySubscription {
    /// Next transition, or `None` once the gatekeeper is gone.
    pub async fn recv(&mut self) -> Option<ConnectivityEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "connectivity subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}
}
