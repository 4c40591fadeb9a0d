// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sync orchestrator.
//!
//! A drain claims every due item, per operation type, and delivers it
//! through the [`Transport`]. Types drain concurrently; items of one type go
//! one at a time in creation order. Drains never overlap.
//!
//! Triggers: a committed offline-to-online transition, an explicit sync
//! request, the app returning to the foreground, and a timer while online.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, mpsc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use fieldsync_bus::{EventBus, SyncEvent};
use fieldsync_core::{
    FieldsyncError, ItemId, OperationType, QueueItem, ServerAck, Transport, TransportError,
};

use crate::network::NetworkGatekeeper;
use crate::pull::ReferenceSync;
use crate::queue::{Failure, FailureOutcome, QueueManager};
use crate::session::SessionManager;

pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
const TRIGGER_CAPACITY: usize = 8;

/// Why a drain was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// The user asked for a sync.
    Manual,
    /// The app came back to the foreground.
    Foreground,
    /// Connectivity came back.
    Reconnect,
    /// Recurring timer.
    Timer,
}

/// What happened to one claimed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Sent,
    Retrying { next_retry_at: i64 },
    Dead,
    /// Put back untransmitted.
    Released,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub id: ItemId,
    pub op_type: OperationType,
    pub outcome: ItemOutcome,
    /// Attempts recorded on the item after this outcome.
    pub attempts: u32,
}

/// Summary of one drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub sent: usize,
    pub retried: usize,
    pub dead: usize,
    pub released: usize,
    /// No usable credential; the user must log in.
    pub auth_required: bool,
    /// The drain was skipped because the device is offline.
    pub offline: bool,
    pub outcomes: Vec<ItemReport>,
}

impl DrainReport {
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    fn record(&mut self, report: ItemReport) {
        match report.outcome {
            ItemOutcome::Sent => self.sent += 1,
            ItemOutcome::Retrying { .. } => self.retried += 1,
            ItemOutcome::Dead => self.dead += 1,
            ItemOutcome::Released => self.released += 1,
        }
        self.outcomes.push(report);
    }

    fn merge(&mut self, other: DrainReport) {
        self.auth_required |= other.auth_required;
        for report in other.outcomes {
            self.record(report);
        }
    }
}

/// Result of delivering one item.
enum Delivery {
    Done(ItemReport),
    /// The credential was rejected while delivering; the item is untouched.
    AuthLost,
}

/// Result of draining one operation type.
#[derive(Default)]
struct TypeDrain {
    report: DrainReport,
    auth_lost: bool,
}

/// Cloneable handle the UI uses to ask for a sync.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    triggers: mpsc::Sender<SyncTrigger>,
}

impl SyncHandle {
    /// Ask for a drain. Returns `false` if the orchestrator is gone.
    pub fn request_sync(&self) -> bool {
        self.send(SyncTrigger::Manual)
    }

    /// Signal that the app returned to the foreground.
    pub fn foreground(&self) -> bool {
        self.send(SyncTrigger::Foreground)
    }

    fn send(&self, trigger: SyncTrigger) -> bool {
        match self.triggers.try_send(trigger) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(?trigger, "sync already requested");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

pub struct SyncOrchestrator {
    queue: QueueManager,
    session: SessionManager,
    transport: Arc<dyn Transport>,
    network: NetworkGatekeeper,
    bus: EventBus,
    reference: Option<ReferenceSync>,
    pull_on_reconnect: bool,
    send_timeout: Duration,
    poll_interval: Duration,
    drain_lock: Mutex<()>,
    trigger_tx: mpsc::Sender<SyncTrigger>,
    trigger_rx: StdMutex<Option<mpsc::Receiver<SyncTrigger>>>,
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("transport", &self.transport.name())
            .field("send_timeout", &self.send_timeout)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl SyncOrchestrator {
    pub fn new(
        queue: QueueManager,
        session: SessionManager,
        transport: Arc<dyn Transport>,
        network: NetworkGatekeeper,
        bus: EventBus,
    ) -> Self {
        let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_CAPACITY);
        Self {
            queue,
            session,
            transport,
            network,
            bus,
            reference: None,
            pull_on_reconnect: false,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            drain_lock: Mutex::new(()),
            trigger_tx,
            trigger_rx: StdMutex::new(Some(trigger_rx)),
        }
    }

    /// Upper bound on a single transport call.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Timer period of [`run`](Self::run).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Pull today's route plan after reconnect and manual syncs.
    pub fn with_reference_pull(mut self, reference: ReferenceSync, on_reconnect: bool) -> Self {
        self.reference = Some(reference);
        self.pull_on_reconnect = on_reconnect;
        self
    }

    pub fn handle(&self) -> SyncHandle {
        SyncHandle {
            triggers: self.trigger_tx.clone(),
        }
    }

    /// Transmit every due item once.
    pub async fn drain(&self) -> Result<DrainReport, FieldsyncError> {
        let _guard = self.drain_lock.lock().await;

        if !self.network.is_online() {
            debug!("offline, skipping drain");
            return Ok(DrainReport::offline());
        }

        let results = join_all(OperationType::ALL.map(|op| self.drain_type(op))).await;

        let mut report = DrainReport::default();
        let mut auth_lost = false;
        let mut failure = None;
        for (op_type, result) in OperationType::ALL.into_iter().zip(results) {
            match result {
                Ok(part) => {
                    auth_lost |= part.auth_lost;
                    report.merge(part.report);
                }
                Err(e) => {
                    error!(%op_type, error = %e, "drain failed");
                    failure.get_or_insert(e);
                }
            }
        }

        if auth_lost {
            warn!("credential rejected during drain, login required");
            self.bus.publish(SyncEvent::AuthLost);
        }
        self.bus.publish(SyncEvent::DrainCompleted {
            sent: report.sent,
            retried: report.retried,
            dead: report.dead,
            released: report.released,
        });
        if !report.is_empty() {
            info!(
                sent = report.sent,
                retried = report.retried,
                dead = report.dead,
                released = report.released,
                "drain completed"
            );
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    async fn drain_type(&self, op_type: OperationType) -> Result<TypeDrain, FieldsyncError> {
        let mut batch: VecDeque<QueueItem> = self.queue.claim_due(op_type).await?.into();
        let mut drained = TypeDrain::default();

        let result = self.deliver_batch(op_type, &mut batch, &mut drained).await;
        if !batch.is_empty() {
            debug!(%op_type, left = batch.len(), "releasing undelivered claims");
            self.release_batch(&mut batch, &mut drained.report).await;
        }
        result.map(|()| drained)
    }

    /// Deliver `batch` front to back. Items still in `batch` on return were
    /// not delivered.
    async fn deliver_batch(
        &self,
        op_type: OperationType,
        batch: &mut VecDeque<QueueItem>,
        drained: &mut TypeDrain,
    ) -> Result<(), FieldsyncError> {
        while let Some(item) = batch.front() {
            if !self.network.is_online() {
                debug!(%op_type, "went offline mid-drain");
                return Ok(());
            }

            let token = match self.session.get_token().await {
                Ok(Some(token)) => token,
                Ok(None) => {
                    debug!(%op_type, "no session");
                    drained.report.auth_required = true;
                    return Ok(());
                }
                Err(e) if e.requires_login() => {
                    drained.report.auth_required = true;
                    drained.auth_lost = true;
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            if !self.queue.renew_claim(&item.id).await? {
                batch.pop_front();
                continue;
            }

            match self.deliver(item, token).await? {
                Delivery::Done(report) => {
                    drained.report.record(report);
                    batch.pop_front();
                }
                Delivery::AuthLost => {
                    drained.report.auth_required = true;
                    drained.auth_lost = true;
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    async fn deliver(
        &self,
        item: &QueueItem,
        token: SecretString,
    ) -> Result<Delivery, FieldsyncError> {
        let result = match self.send(item, &token).await {
            Err(TransportError::Unauthorized) => {
                debug!(item_id = %item.id, "unauthorized, refreshing token");
                match self.session.refresh().await {
                    Ok(fresh) => self.send(item, &fresh).await,
                    Err(e) if e.requires_login() => return Ok(Delivery::AuthLost),
                    Err(e) => Err(refresh_failure_to_transport(e)),
                }
            }
            other => other,
        };

        let report = match result {
            Ok(ack) => {
                self.queue.mark_sent(&item.id).await?;
                if ack == ServerAck::Duplicate {
                    debug!(item_id = %item.id, "server already had this item");
                }
                ItemReport {
                    id: item.id.clone(),
                    op_type: item.op_type,
                    outcome: ItemOutcome::Sent,
                    attempts: item.attempts,
                }
            }
            Err(err) => {
                let failure = Failure::from_transport(&err);
                let outcome = self
                    .queue
                    .mark_failed(&item.id, &err.to_string(), failure)
                    .await?;
                ItemReport {
                    id: item.id.clone(),
                    op_type: item.op_type,
                    outcome: match outcome {
                        FailureOutcome::Retrying { next_retry_at, .. } => {
                            ItemOutcome::Retrying { next_retry_at }
                        }
                        FailureOutcome::Dead { .. } => ItemOutcome::Dead,
                    },
                    attempts: outcome.attempts(),
                }
            }
        };
        Ok(Delivery::Done(report))
    }

    async fn send(&self, item: &QueueItem, token: &SecretString) -> Result<ServerAck, TransportError> {
        let call = self.transport.send(
            item.op_type.endpoint(),
            &item.payload,
            &item.idempotency_key,
            token.expose_secret(),
        );
        match tokio::time::timeout(self.send_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                debug!(item_id = %item.id, timeout = ?self.send_timeout, "send timed out");
                Err(TransportError::Timeout)
            }
        }
    }

    /// Put back every claim left in `batch` that this drain still holds.
    /// Failures are logged; the lease recovers whatever is left.
    async fn release_batch(&self, batch: &mut VecDeque<QueueItem>, report: &mut DrainReport) {
        for item in batch.drain(..) {
            match self.queue.release_if_held(&item.id).await {
                Ok(true) => report.record(ItemReport {
                    id: item.id,
                    op_type: item.op_type,
                    outcome: ItemOutcome::Released,
                    attempts: item.attempts,
                }),
                Ok(false) => debug!(item_id = %item.id, "claim no longer held"),
                Err(e) => warn!(item_id = %item.id, error = %e, "failed to release claim"),
            }
        }
    }

    /// Release claims whose lease ran out. Holds the drain lock so claims of
    /// a running drain here are never touched.
    pub async fn recover_stale_claims(&self) -> Result<usize, FieldsyncError> {
        let _guard = self.drain_lock.lock().await;
        self.queue.recover_stale_claims().await
    }

    /// Drive drains until `cancel` fires.
    ///
    /// Fails if called twice on the same orchestrator.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), FieldsyncError> {
        let mut triggers = self
            .trigger_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| FieldsyncError::Internal("sync loop is already running".into()))?;
        let mut connectivity = self.network.subscribe();
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(poll_interval = ?self.poll_interval, "sync loop started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                event = connectivity.recv() => match event {
                    Some(event) if event.online => self.on_trigger(SyncTrigger::Reconnect).await,
                    Some(_) => debug!("went offline"),
                    None => break,
                },
                Some(trigger) = triggers.recv() => self.on_trigger(trigger).await,
                _ = ticker.tick() => {
                    if let Err(e) = self.recover_stale_claims().await {
                        warn!(error = %e, "stale claim recovery failed");
                    }
                    if self.network.is_online() {
                        self.on_trigger(SyncTrigger::Timer).await;
                    }
                }
            }
        }
        info!("sync loop stopped");
        Ok(())
    }

    async fn on_trigger(&self, trigger: SyncTrigger) {
        debug!(?trigger, "sync triggered");
        match self.drain().await {
            Ok(report) if report.offline => return,
            Ok(_) => {}
            Err(e) => warn!(?trigger, error = %e, "drain failed"),
        }

        let wants_pull = match trigger {
            SyncTrigger::Reconnect => self.pull_on_reconnect,
            SyncTrigger::Manual => true,
            SyncTrigger::Foreground | SyncTrigger::Timer => false,
        };
        if let Some(reference) = self.reference.as_ref().filter(|_| wants_pull) {
            let date = reference.today();
            if let Err(e) = reference.pull_route_plan(&date).await {
                warn!(?trigger, date, error = %e, "route plan pull failed");
            }
        }
    }
}

/// A refresh that failed without rejecting the credential, as a retryable
/// transport outcome. A provider-set delay is kept.
fn refresh_failure_to_transport(err: FieldsyncError) -> TransportError {
    match err {
        FieldsyncError::RateLimited {
            retry_after,
            message,
        } => TransportError::ServerTransient {
            status: 429,
            message,
            retry_after,
        },
        other => TransportError::Network(other.to_string()),
    }
}
