// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Offline synchronization engine for the fieldsync client.
//!
//! Field mutations are written to a durable local queue first and delivered
//! later, exactly once from the server's point of view, by the
//! [`SyncOrchestrator`]. The [`SessionManager`] keeps a usable credential
//! through expiry and network loss, and the [`NetworkGatekeeper`] turns a
//! noisy reachability signal into debounced transitions.
//!
//! [`Engine`] wires the managers together from a [`FieldsyncConfig`].

pub mod network;
pub mod orchestrator;
pub mod pull;
pub mod queue;
pub mod session;
pub mod shutdown;

use std::sync::Arc;
use std::time::Duration;

use fieldsync_bus::EventBus;
use fieldsync_config::FieldsyncConfig;
use fieldsync_core::{Clock, FieldsyncError, IdentityProvider, ReferenceSource, Transport};
use fieldsync_storage::Database;

pub use network::{ConnectivityEvent, ConnectivitySubscription, NetworkGatekeeper};
pub use orchestrator::{DrainReport, ItemOutcome, ItemReport, SyncHandle, SyncOrchestrator, SyncTrigger};
pub use pull::ReferenceSync;
pub use queue::{DEFAULT_CLAIM_LEASE, Failure, FailureOutcome, QueueManager};
pub use session::SessionManager;

/// Added to the longest a renewed claim can stay in flight.
const CLAIM_LEASE_SLACK: Duration = Duration::from_secs(30);

/// How long a claim may go unrenewed: a send, a token refresh after a 401
/// and the resend, each bounded by `request_timeout`.
pub fn claim_lease(request_timeout: Duration) -> Duration {
    request_timeout
        .saturating_mul(3)
        .saturating_add(CLAIM_LEASE_SLACK)
}

/// Boundary adapters the engine talks to.
#[derive(Clone)]
pub struct Adapters {
    pub transport: Arc<dyn Transport>,
    pub identity: Arc<dyn IdentityProvider>,
    pub reference: Arc<dyn ReferenceSource>,
}

/// Every manager, sharing one store, clock and event bus.
pub struct Engine {
    pub db: Database,
    pub bus: EventBus,
    pub network: NetworkGatekeeper,
    pub queue: QueueManager,
    pub session: SessionManager,
    pub reference: ReferenceSync,
    pub orchestrator: Arc<SyncOrchestrator>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("db", &self.db)
            .field("network", &self.network)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Assemble the engine. Must be called inside a tokio runtime.
    ///
    /// `initially_online` seeds the gatekeeper before the first raw sample.
    pub fn new(
        config: &FieldsyncConfig,
        db: Database,
        clock: Arc<dyn Clock>,
        adapters: Adapters,
        initially_online: bool,
    ) -> Self {
        let bus = EventBus::default();
        let network = NetworkGatekeeper::new(
            initially_online,
            config.network.settle(),
            Arc::clone(&clock),
            bus.clone(),
        );
        let queue = QueueManager::from_config(db.clone(), Arc::clone(&clock), bus.clone(), &config.sync)
            .with_claim_lease(claim_lease(config.api.request_timeout()));
        let session = SessionManager::new(
            db.clone(),
            adapters.identity,
            Arc::clone(&clock),
            network.clone(),
            bus.clone(),
            config.session.refresh_skew(),
        );
        let reference = ReferenceSync::new(
            db.clone(),
            adapters.reference,
            session.clone(),
            network.clone(),
            clock,
        );
        let orchestrator = SyncOrchestrator::new(
            queue.clone(),
            session.clone(),
            adapters.transport,
            network.clone(),
            bus.clone(),
        )
        .with_send_timeout(config.api.request_timeout())
        .with_poll_interval(config.sync.poll_interval())
        .with_reference_pull(reference.clone(), config.sync.pull_on_reconnect);

        Self {
            db,
            bus,
            network,
            queue,
            session,
            reference,
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// Start-up housekeeping: release abandoned claims and restore the
    /// session. Claims still within their lease may belong to another
    /// running process and are kept.
    pub async fn start(&self) -> Result<Option<fieldsync_core::User>, FieldsyncError> {
        self.orchestrator.recover_stale_claims().await?;
        self.session.restore_session().await
    }
}
