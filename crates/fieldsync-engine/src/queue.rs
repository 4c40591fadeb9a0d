// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operation queue manager.
//!
//! Owns the lifecycle of queued mutations on top of the storage queries:
//!
//! ```text
//! pending --claim--> sending --success--> (deleted)
//! sending --failure(retryable)--> error --due--> sending
//! sending --failure(permanent or exhausted)--> dead
//! ```
//!
//! `dead` is terminal unless a human requeues or discards the item.
//!
//! A claim is stamped with its claim time. The manager remembers the stamps
//! of the claims it holds and renews one right before the item is sent; a
//! claim whose stamp no longer matches belongs to someone else. Claims older
//! than the lease are treated as abandoned and released.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use fieldsync_bus::{EventBus, SyncEvent};
use fieldsync_config::model::SyncConfig;
use fieldsync_core::{
    Clock, FieldsyncError, ItemId, ItemStatus, OperationType, QueueItem, StatusKind,
    TransportError,
};
use fieldsync_resilience::{RetryPolicy, new_idempotency_key};
use fieldsync_storage::Database;
use fieldsync_storage::queries::queue;

/// How long a claim may go unrenewed before another drain may release it.
pub const DEFAULT_CLAIM_LEASE: Duration = Duration::from_secs(120);

/// How a failed transmission should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Try again later, but not sooner than `min_delay` if the server set one.
    Retryable { min_delay: Option<Duration> },
    /// The server will never accept this item.
    Permanent,
}

impl Failure {
    pub fn from_transport(err: &TransportError) -> Self {
        if err.is_retryable() {
            Failure::Retryable {
                min_delay: err.retry_after(),
            }
        } else {
            Failure::Permanent
        }
    }
}

/// Where a failed item ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    Retrying { attempts: u32, next_retry_at: i64 },
    Dead { attempts: u32 },
}

impl FailureOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            FailureOutcome::Retrying { attempts, .. } | FailureOutcome::Dead { attempts } => {
                *attempts
            }
        }
    }
}

/// Persistent FIFO of mutations, one partition per [`OperationType`].
#[derive(Debug, Clone)]
pub struct QueueManager {
    db: Database,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    bus: EventBus,
    claim_limit: Option<u32>,
    claim_lease: Duration,
    /// Claims held by this manager, by item, with their current stamp.
    held: Arc<Mutex<HashMap<ItemId, i64>>>,
}

impl QueueManager {
    pub fn new(db: Database, clock: Arc<dyn Clock>, policy: RetryPolicy, bus: EventBus) -> Self {
        Self {
            db,
            clock,
            policy,
            bus,
            claim_limit: None,
            claim_lease: DEFAULT_CLAIM_LEASE,
            held: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Build a manager whose retry policy and claim batch come from `[sync]`.
    pub fn from_config(
        db: Database,
        clock: Arc<dyn Clock>,
        bus: EventBus,
        config: &SyncConfig,
    ) -> Self {
        let policy = RetryPolicy {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
            jitter: config.jitter(),
        };
        Self::new(db, clock, policy, bus).with_claim_limit(config.claim_limit())
    }

    /// Cap on items claimed per type and drain. `None` claims everything due.
    pub fn with_claim_limit(mut self, limit: Option<u32>) -> Self {
        self.claim_limit = limit;
        self
    }

    /// Age past which an unrenewed claim counts as abandoned.
    pub fn with_claim_lease(mut self, lease: Duration) -> Self {
        self.claim_lease = lease;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Record a mutation locally. Never touches the network.
    pub async fn enqueue(
        &self,
        op_type: OperationType,
        payload: Value,
    ) -> Result<QueueItem, FieldsyncError> {
        if !payload.is_object() {
            return Err(FieldsyncError::Validation {
                message: format!("{op_type} payload must be a JSON object"),
            });
        }

        let item = QueueItem {
            id: ItemId(uuid::Uuid::new_v4().to_string()),
            idempotency_key: new_idempotency_key(),
            op_type,
            payload,
            created_at: self.clock.now_ms(),
            attempts: 0,
            status: ItemStatus::Pending,
            last_error: None,
        };
        queue::insert(&self.db, &item).await?;

        info!(item_id = %item.id, %op_type, "mutation enqueued");
        Ok(item)
    }

    pub async fn get(&self, id: &ItemId) -> Result<Option<QueueItem>, FieldsyncError> {
        queue::get(&self.db, id).await
    }

    /// Move every due item of `op_type` to `sending` and return them, oldest
    /// first.
    pub async fn claim_due(&self, op_type: OperationType) -> Result<Vec<QueueItem>, FieldsyncError> {
        let now = self.clock.now_ms();
        let claimed = queue::claim_due(&self.db, op_type, now, self.claim_limit).await?;
        if !claimed.is_empty() {
            let mut held = self.held();
            for item in &claimed {
                held.insert(item.id.clone(), now);
            }
            debug!(%op_type, count = claimed.len(), "claimed due items");
        }
        Ok(claimed)
    }

    /// Refresh the stamp of a claim this manager holds.
    ///
    /// Returns `false` when the claim is no longer ours: it was released as
    /// stale, and possibly claimed again elsewhere. The item must not be sent.
    pub async fn renew_claim(&self, id: &ItemId) -> Result<bool, FieldsyncError> {
        let Some(stamp) = self.held().get(id).copied() else {
            return Ok(false);
        };
        let now = self.clock.now_ms();
        if queue::renew_claim(&self.db, id, stamp, now).await? {
            self.held().insert(id.clone(), now);
            Ok(true)
        } else {
            self.held().remove(id);
            warn!(item_id = %id, "claim was taken over, skipping item");
            Ok(false)
        }
    }

    /// The server acknowledged the item; remove it.
    ///
    /// Only a claim this manager still holds can be completed.
    pub async fn mark_sent(&self, id: &ItemId) -> Result<(), FieldsyncError> {
        let Some(stamp) = self.held().remove(id) else {
            return Err(self.transition_error(id, "sent").await);
        };
        let removed = queue::delete_sending(&self.db, id, Some(stamp)).await?;
        if removed {
            debug!(item_id = %id, "item sent");
            Ok(())
        } else {
            Err(self.transition_error(id, "sent").await)
        }
    }

    /// Record a failed transmission of a claimed item.
    pub async fn mark_failed(
        &self,
        id: &ItemId,
        error: &str,
        failure: Failure,
    ) -> Result<FailureOutcome, FieldsyncError> {
        let stamp = self.held().remove(id);
        let item = match (stamp, queue::get(&self.db, id).await?) {
            (Some(_), Some(item)) if item.status == ItemStatus::Sending => item,
            _ => return Err(self.transition_error(id, "error").await),
        };

        let outcome = match failure {
            Failure::Retryable { min_delay } if self.policy.allows_retry_after(item.attempts) => {
                let attempts = item.attempts + 1;
                let delay = self
                    .policy
                    .delay_for(attempts)
                    .max(min_delay.unwrap_or_default());
                let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
                FailureOutcome::Retrying {
                    attempts,
                    next_retry_at: self.clock.now_ms().saturating_add(delay_ms),
                }
            }
            _ => FailureOutcome::Dead {
                attempts: item
                    .attempts
                    .saturating_add(1)
                    .min(self.policy.max_attempts),
            },
        };

        let status = match outcome {
            FailureOutcome::Retrying { next_retry_at, .. } => ItemStatus::Error { next_retry_at },
            FailureOutcome::Dead { .. } => ItemStatus::Dead,
        };
        let recorded =
            queue::record_failure(&self.db, id, stamp, outcome.attempts(), status, error).await?;
        if !recorded {
            return Err(self.transition_error(id, "error").await);
        }

        match outcome {
            FailureOutcome::Retrying {
                attempts,
                next_retry_at,
            } => {
                debug!(item_id = %id, op_type = %item.op_type, attempts, next_retry_at, error, "item scheduled for retry");
            }
            FailureOutcome::Dead { attempts } => {
                if failure == Failure::Permanent {
                    warn!(item_id = %id, op_type = %item.op_type, attempts, error, "item rejected permanently");
                } else {
                    let exhausted = FieldsyncError::ExhaustedRetries {
                        item_id: id.to_string(),
                        attempts,
                    };
                    warn!(op_type = %item.op_type, error, "{exhausted}");
                }
                self.bus.publish(SyncEvent::ItemDead {
                    id: id.to_string(),
                    op_type: item.op_type,
                    error: error.to_string(),
                });
            }
        }
        Ok(outcome)
    }

    /// Put a claimed item back without counting an attempt.
    ///
    /// A claim held by this manager is only released while its stamp still
    /// matches.
    pub async fn release(&self, id: &ItemId) -> Result<(), FieldsyncError> {
        let stamp = self.held().remove(id);
        let released = match stamp {
            Some(stamp) => queue::release_claim(&self.db, id, stamp).await?,
            None => queue::release(&self.db, id).await?,
        };
        if released {
            debug!(item_id = %id, "claim released");
            Ok(())
        } else {
            Err(self.transition_error(id, "released").await)
        }
    }

    /// Release `id` only if this manager still holds its claim. Returns
    /// whether it was released.
    pub async fn release_if_held(&self, id: &ItemId) -> Result<bool, FieldsyncError> {
        let Some(stamp) = self.held().remove(id) else {
            return Ok(false);
        };
        let released = queue::release_claim(&self.db, id, stamp).await?;
        if released {
            debug!(item_id = %id, "claim released");
        }
        Ok(released)
    }

    /// Release claims nobody renewed within the lease, such as those left
    /// behind by a process that died mid-drain. Live claims are kept.
    pub async fn recover_stale_claims(&self) -> Result<usize, FieldsyncError> {
        let lease_ms = i64::try_from(self.claim_lease.as_millis()).unwrap_or(i64::MAX);
        let cutoff = self.clock.now_ms().saturating_sub(lease_ms);
        let released = queue::release_stale(&self.db, cutoff).await?;
        if released > 0 {
            info!(released, "recovered stale claims");
        }
        Ok(released)
    }

    /// Release every claim this manager still holds. Returns how many were
    /// released; claims taken over elsewhere are left alone.
    pub async fn release_held(&self) -> Result<usize, FieldsyncError> {
        let held: Vec<(ItemId, i64)> = self.held().drain().collect();
        let mut released = 0;
        for (id, stamp) in held {
            if queue::release_claim(&self.db, &id, stamp).await? {
                released += 1;
            }
        }
        Ok(released)
    }

    /// Give a dead item one more attempt.
    pub async fn requeue_dead(&self, id: &ItemId) -> Result<(), FieldsyncError> {
        if queue::requeue_dead(&self.db, id).await? {
            info!(item_id = %id, "dead item requeued");
            Ok(())
        } else {
            Err(self.transition_error(id, "pending").await)
        }
    }

    /// Drop a dead item for good.
    pub async fn discard_dead(&self, id: &ItemId) -> Result<(), FieldsyncError> {
        if queue::delete_dead(&self.db, id).await? {
            info!(item_id = %id, "dead item discarded");
            Ok(())
        } else {
            Err(self.transition_error(id, "discarded").await)
        }
    }

    pub async fn count(
        &self,
        op_type: OperationType,
        status: Option<StatusKind>,
    ) -> Result<u64, FieldsyncError> {
        queue::count(&self.db, Some(op_type), status).await
    }

    pub async fn count_all(&self, status: Option<StatusKind>) -> Result<u64, FieldsyncError> {
        queue::count(&self.db, None, status).await
    }

    pub async fn list(
        &self,
        op_type: Option<OperationType>,
        status: Option<StatusKind>,
    ) -> Result<Vec<QueueItem>, FieldsyncError> {
        queue::list(&self.db, op_type, status).await
    }

    fn held(&self) -> MutexGuard<'_, HashMap<ItemId, i64>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Explain why a guarded transition of `id` to `to` matched no row.
    async fn transition_error(&self, id: &ItemId, to: &'static str) -> FieldsyncError {
        match queue::get(&self.db, id).await {
            Ok(Some(item)) => FieldsyncError::InvalidTransition {
                id: id.to_string(),
                from: item.status.to_string(),
                to,
            },
            Ok(None) => FieldsyncError::NotFound {
                entity: "queue item",
                id: id.to_string(),
            },
            Err(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsync_core::ManualClock;
    use serde_json::json;
    use tempfile::TempDir;

    const START: i64 = 1_700_000_000_000;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(60_000),
            jitter: Duration::ZERO,
        }
    }

    async fn setup(max_attempts: u32) -> (QueueManager, ManualClock, EventBus, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        let clock = ManualClock::new(START);
        let bus = EventBus::default();
        let manager = QueueManager::new(db, Arc::new(clock.clone()), policy(max_attempts), bus.clone());
        (manager, clock, bus, dir)
    }

    #[tokio::test]
    async fn enqueue_is_local_and_pending() {
        let (queue, _clock, _bus, _dir) = setup(10).await;
        let item = queue
            .enqueue(OperationType::Stockout, json!({"sku": "A1"}))
            .await
            .unwrap();

        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.attempts, 0);
        assert_eq!(item.created_at, START);
        assert_eq!(queue.count(OperationType::Stockout, None).await.unwrap(), 1);
        assert_eq!(queue.count_all(Some(StatusKind::Pending)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn enqueue_rejects_non_object_payload() {
        let (queue, _clock, _bus, _dir) = setup(10).await;
        let err = queue
            .enqueue(OperationType::Feedback, json!([1, 2]))
            .await
            .unwrap_err();
        assert!(matches!(err, FieldsyncError::Validation { .. }));
        assert_eq!(queue.count_all(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn idempotency_keys_are_unique_and_stable() {
        let (queue, clock, _bus, _dir) = setup(10).await;
        let a = queue.enqueue(OperationType::Inventory, json!({})).await.unwrap();
        let b = queue.enqueue(OperationType::Inventory, json!({})).await.unwrap();
        assert_ne!(a.idempotency_key, b.idempotency_key);

        queue.claim_due(OperationType::Inventory).await.unwrap();
        queue
            .mark_failed(&a.id, "503", Failure::Retryable { min_delay: None })
            .await
            .unwrap();
        clock.advance(Duration::from_secs(120));
        let reclaimed = queue.claim_due(OperationType::Inventory).await.unwrap();
        let again = reclaimed.iter().find(|i| i.id == a.id).unwrap();
        assert_eq!(again.idempotency_key, a.idempotency_key);
    }

    #[tokio::test]
    async fn mark_sent_requires_sending() {
        let (queue, _clock, _bus, _dir) = setup(10).await;
        let item = queue.enqueue(OperationType::Feedback, json!({})).await.unwrap();

        let err = queue.mark_sent(&item.id).await.unwrap_err();
        assert!(matches!(err, FieldsyncError::InvalidTransition { ref from, .. } if from == "pending"));

        queue.claim_due(OperationType::Feedback).await.unwrap();
        queue.mark_sent(&item.id).await.unwrap();
        assert!(queue.get(&item.id).await.unwrap().is_none());

        let err = queue.mark_sent(&item.id).await.unwrap_err();
        assert!(matches!(err, FieldsyncError::NotFound { .. }));
    }

    #[tokio::test]
    async fn retryable_failure_schedules_backoff() {
        let (queue, clock, _bus, _dir) = setup(10).await;
        let item = queue.enqueue(OperationType::Feedback, json!({})).await.unwrap();
        queue.claim_due(OperationType::Feedback).await.unwrap();

        let outcome = queue
            .mark_failed(&item.id, "timeout", Failure::Retryable { min_delay: None })
            .await
            .unwrap();
        // base * 2^1, no jitter
        assert_eq!(
            outcome,
            FailureOutcome::Retrying {
                attempts: 1,
                next_retry_at: START + 2_000
            }
        );

        clock.advance(Duration::from_millis(1_999));
        assert!(queue.claim_due(OperationType::Feedback).await.unwrap().is_empty());
        clock.advance(Duration::from_millis(1));
        assert_eq!(queue.claim_due(OperationType::Feedback).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn server_retry_after_is_a_floor() {
        let (queue, _clock, _bus, _dir) = setup(10).await;
        let item = queue.enqueue(OperationType::Feedback, json!({})).await.unwrap();
        queue.claim_due(OperationType::Feedback).await.unwrap();

        let outcome = queue
            .mark_failed(
                &item.id,
                "429",
                Failure::Retryable {
                    min_delay: Some(Duration::from_secs(30)),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            outcome,
            FailureOutcome::Retrying {
                attempts: 1,
                next_retry_at: START + 30_000
            }
        );
    }

    #[tokio::test]
    async fn permanent_failure_is_dead_after_one_attempt() {
        let (queue, clock, bus, _dir) = setup(10).await;
        let mut events = bus.subscribe();
        let item = queue.enqueue(OperationType::Stockout, json!({})).await.unwrap();
        queue.claim_due(OperationType::Stockout).await.unwrap();

        let outcome = queue
            .mark_failed(&item.id, "422 bad sku", Failure::Permanent)
            .await
            .unwrap();
        assert_eq!(outcome, FailureOutcome::Dead { attempts: 1 });

        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            SyncEvent::ItemDead {
                id: item.id.to_string(),
                op_type: OperationType::Stockout,
                error: "422 bad sku".into(),
            }
        );

        clock.advance(Duration::from_secs(3_600));
        assert!(queue.claim_due(OperationType::Stockout).await.unwrap().is_empty());
        assert_eq!(queue.count_all(Some(StatusKind::Dead)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn attempts_are_bounded_by_max() {
        let (queue, clock, _bus, _dir) = setup(3).await;
        let item = queue.enqueue(OperationType::Inventory, json!({})).await.unwrap();

        let mut seen = Vec::new();
        loop {
            let claimed = queue.claim_due(OperationType::Inventory).await.unwrap();
            if claimed.is_empty() {
                break;
            }
            let outcome = queue
                .mark_failed(&item.id, "503", Failure::Retryable { min_delay: None })
                .await
                .unwrap();
            seen.push(outcome);
            clock.advance(Duration::from_secs(120));
        }

        assert_eq!(seen.len(), 3);
        assert_eq!(seen.last(), Some(&FailureOutcome::Dead { attempts: 3 }));
        let attempts: Vec<u32> = seen.iter().map(FailureOutcome::attempts).collect();
        assert_eq!(attempts, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn requeued_dead_item_gets_exactly_one_more_attempt() {
        let (queue, _clock, _bus, _dir) = setup(2).await;
        let item = queue.enqueue(OperationType::Feedback, json!({})).await.unwrap();
        queue.claim_due(OperationType::Feedback).await.unwrap();
        queue
            .mark_failed(&item.id, "bad", Failure::Permanent)
            .await
            .unwrap();

        queue.requeue_dead(&item.id).await.unwrap();
        let requeued = queue.get(&item.id).await.unwrap().unwrap();
        assert_eq!(requeued.status, ItemStatus::Pending);
        assert_eq!(requeued.attempts, 1);

        queue.claim_due(OperationType::Feedback).await.unwrap();
        let outcome = queue
            .mark_failed(&item.id, "503", Failure::Retryable { min_delay: None })
            .await
            .unwrap();
        assert_eq!(outcome, FailureOutcome::Dead { attempts: 2 });
    }

    #[tokio::test]
    async fn discard_only_applies_to_dead_items() {
        let (queue, _clock, _bus, _dir) = setup(10).await;
        let item = queue.enqueue(OperationType::Feedback, json!({})).await.unwrap();

        let err = queue.discard_dead(&item.id).await.unwrap_err();
        assert!(matches!(err, FieldsyncError::InvalidTransition { to: "discarded", .. }));

        queue.claim_due(OperationType::Feedback).await.unwrap();
        queue.mark_failed(&item.id, "bad", Failure::Permanent).await.unwrap();
        queue.discard_dead(&item.id).await.unwrap();
        assert_eq!(queue.count_all(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn release_and_recover_do_not_count_attempts() {
        let (queue, clock, _bus, _dir) = setup(10).await;
        let a = queue.enqueue(OperationType::Feedback, json!({})).await.unwrap();
        let b = queue.enqueue(OperationType::Feedback, json!({})).await.unwrap();
        queue.claim_due(OperationType::Feedback).await.unwrap();

        queue.release(&a.id).await.unwrap();
        assert_eq!(queue.recover_stale_claims().await.unwrap(), 0);
        clock.advance(DEFAULT_CLAIM_LEASE);
        assert_eq!(queue.recover_stale_claims().await.unwrap(), 1);

        for id in [&a.id, &b.id] {
            let item = queue.get(id).await.unwrap().unwrap();
            assert_eq!(item.status, ItemStatus::Pending);
            assert_eq!(item.attempts, 0);
        }
        assert!(queue.release(&a.id).await.is_err());
    }

    #[tokio::test]
    async fn claims_taken_over_elsewhere_are_not_renewed() {
        let (queue, clock, bus, _dir) = setup(10).await;
        let item = queue.enqueue(OperationType::Inventory, json!({})).await.unwrap();
        queue.claim_due(OperationType::Inventory).await.unwrap();

        clock.advance(Duration::from_secs(1));
        assert!(queue.renew_claim(&item.id).await.unwrap());

        // Another manager over the same store finds the claim abandoned.
        clock.advance(DEFAULT_CLAIM_LEASE);
        let other = QueueManager::new(queue.db.clone(), Arc::new(clock.clone()), policy(10), bus);
        assert_eq!(other.recover_stale_claims().await.unwrap(), 1);
        assert_eq!(other.claim_due(OperationType::Inventory).await.unwrap().len(), 1);

        assert!(!queue.renew_claim(&item.id).await.unwrap());
        assert_eq!(queue.release_held().await.unwrap(), 0);
        assert!(other.renew_claim(&item.id).await.unwrap());
        assert_eq!(other.release_held().await.unwrap(), 1);

        let item = queue.get(&item.id).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::Pending);
    }

    #[tokio::test]
    async fn late_outcomes_of_a_lost_claim_are_rejected() {
        let (queue, clock, bus, _dir) = setup(10).await;
        let item = queue.enqueue(OperationType::Stockout, json!({})).await.unwrap();
        queue.claim_due(OperationType::Stockout).await.unwrap();

        clock.advance(DEFAULT_CLAIM_LEASE);
        let other = QueueManager::new(queue.db.clone(), Arc::new(clock.clone()), policy(10), bus);
        assert_eq!(other.recover_stale_claims().await.unwrap(), 1);
        assert_eq!(other.claim_due(OperationType::Stockout).await.unwrap().len(), 1);

        // The first send outlived its lease and finishes now.
        assert!(queue.mark_sent(&item.id).await.is_err());
        assert!(
            queue
                .mark_failed(&item.id, "late", Failure::Permanent)
                .await
                .is_err()
        );
        let current = queue.get(&item.id).await.unwrap().unwrap();
        assert_eq!(current.status, ItemStatus::Sending);
        assert_eq!(current.attempts, 0);

        other.mark_sent(&item.id).await.unwrap();
        assert!(queue.get(&item.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_limit_bounds_the_batch() {
        let (queue, _clock, _bus, _dir) = setup(10).await;
        let queue = queue.with_claim_limit(Some(2));
        for n in 0..5 {
            queue
                .enqueue(OperationType::Inventory, json!({ "n": n }))
                .await
                .unwrap();
        }

        let first = queue.claim_due(OperationType::Inventory).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].payload, json!({"n": 0}));
        assert_eq!(first[1].payload, json!({"n": 1}));
    }

    #[test]
    fn failure_classification_follows_transport_error() {
        assert_eq!(
            Failure::from_transport(&TransportError::Timeout),
            Failure::Retryable { min_delay: None }
        );
        assert_eq!(
            Failure::from_transport(&TransportError::ServerTransient {
                status: 429,
                message: "slow down".into(),
                retry_after: Some(Duration::from_secs(5)),
            }),
            Failure::Retryable {
                min_delay: Some(Duration::from_secs(5))
            }
        );
        assert_eq!(
            Failure::from_transport(&TransportError::ServerPermanent {
                status: 422,
                message: "bad".into(),
            }),
            Failure::Permanent
        );
    }
}
