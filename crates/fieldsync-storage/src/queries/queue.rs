// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row-level operations on the outbound mutation queue.
//!
//! Every state change is guarded by the row's current status, so a caller
//! learns from the affected-row count whether the transition happened.

use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, params};

use fieldsync_core::{FieldsyncError, ItemId, ItemStatus, OperationType, QueueItem, StatusKind};

use crate::database::{Database, map_tr_err};

const COLUMNS: &str =
    "id, idempotency_key, op_type, payload, created_at, attempts, status, next_retry_at, last_error";

fn conversion_err<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<QueueItem> {
    let op_type: String = row.get(2)?;
    let payload: String = row.get(3)?;
    let status: String = row.get(6)?;
    let next_retry_at: Option<i64> = row.get(7)?;

    let status = match StatusKind::from_str(&status).map_err(|e| conversion_err(6, e))? {
        StatusKind::Pending => ItemStatus::Pending,
        StatusKind::Sending => ItemStatus::Sending,
        StatusKind::Error => ItemStatus::Error {
            next_retry_at: next_retry_at.unwrap_or(0),
        },
        StatusKind::Dead => ItemStatus::Dead,
    };

    Ok(QueueItem {
        id: ItemId(row.get(0)?),
        idempotency_key: row.get(1)?,
        op_type: OperationType::from_str(&op_type).map_err(|e| conversion_err(2, e))?,
        payload: serde_json::from_str(&payload).map_err(|e| conversion_err(3, e))?,
        created_at: row.get(4)?,
        attempts: row.get(5)?,
        status,
        last_error: row.get(8)?,
    })
}

/// Persist a new item.
pub async fn insert(db: &Database, item: &QueueItem) -> Result<(), FieldsyncError> {
    let id = item.id.0.clone();
    let key = item.idempotency_key.clone();
    let op_type = item.op_type.as_str();
    let payload = item.payload.to_string();
    let created_at = item.created_at;
    let attempts = item.attempts;
    let status = item.status.kind().as_str();
    let next_retry_at = item.next_retry_at();
    let last_error = item.last_error.clone();

    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO queue_items
                     (id, idempotency_key, op_type, payload, created_at,
                      attempts, status, next_retry_at, last_error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id,
                    key,
                    op_type,
                    payload,
                    created_at,
                    attempts,
                    status,
                    next_retry_at,
                    last_error
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get(db: &Database, id: &ItemId) -> Result<Option<QueueItem>, FieldsyncError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM queue_items WHERE id = ?1"),
                params![id],
                row_to_item,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Atomically claim every due item of `op_type`, oldest first.
///
/// Selects `pending` items and `error` items whose retry time has passed,
/// moves them to `sending`, and returns them. Runs in one transaction on
/// the writer thread, and each update re-checks the status, so two
/// concurrent claims never return the same item.
pub async fn claim_due(
    db: &Database,
    op_type: OperationType,
    now_ms: i64,
    limit: Option<u32>,
) -> Result<Vec<QueueItem>, FieldsyncError> {
    let op = op_type.as_str();
    let limit = limit.map_or(-1, i64::from);

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let candidates = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {COLUMNS} FROM queue_items
                     WHERE op_type = ?1
                       AND (status = 'pending'
                            OR (status = 'error' AND (next_retry_at IS NULL OR next_retry_at <= ?2)))
                     ORDER BY seq ASC
                     LIMIT ?3"
                ))?;
                let rows = stmt.query_map(params![op, now_ms, limit], row_to_item)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            };

            let mut claimed = Vec::with_capacity(candidates.len());
            for item in candidates {
                let changed = tx.execute(
                    "UPDATE queue_items SET status = 'sending', claimed_at = ?2
                     WHERE id = ?1 AND status IN ('pending', 'error')",
                    params![item.id.0, now_ms],
                )?;
                if changed == 1 {
                    claimed.push(QueueItem {
                        status: ItemStatus::Sending,
                        ..item
                    });
                }
            }

            tx.commit()?;
            Ok(claimed)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a `sending` item. Returns whether a row was removed.
///
/// With a `claimed_at` stamp, the row is only removed while the claim
/// still carries it.
pub async fn delete_sending(
    db: &Database,
    id: &ItemId,
    claimed_at: Option<i64>,
) -> Result<bool, FieldsyncError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM queue_items
                 WHERE id = ?1 AND status = 'sending'
                   AND (?2 IS NULL OR claimed_at = ?2)",
                params![id, claimed_at],
            )?;
            Ok(removed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Record a failed transmission of a `sending` item.
///
/// `status` must be `Error` (with its retry time) or `Dead`. A
/// `claimed_at` stamp guards the update the same way as [`delete_sending`].
pub async fn record_failure(
    db: &Database,
    id: &ItemId,
    claimed_at: Option<i64>,
    attempts: u32,
    status: ItemStatus,
    last_error: &str,
) -> Result<bool, FieldsyncError> {
    let (status, next_retry_at) = match status {
        ItemStatus::Error { next_retry_at } => (StatusKind::Error, Some(next_retry_at)),
        ItemStatus::Dead => (StatusKind::Dead, None),
        other => {
            return Err(FieldsyncError::Internal(format!(
                "record_failure called with status {other}"
            )));
        }
    };
    let id = id.0.clone();
    let status = status.as_str();
    let last_error = last_error.to_string();

    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE queue_items
                 SET attempts = ?2, status = ?3, next_retry_at = ?4,
                     last_error = ?5, claimed_at = NULL
                 WHERE id = ?1 AND status = 'sending'
                   AND (?6 IS NULL OR claimed_at = ?6)",
                params![id, attempts, status, next_retry_at, last_error, claimed_at],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Return a `sending` item to where it was claimed from, without counting
/// an attempt. Items with a retry time go back to `error`, others to
/// `pending`.
pub async fn release(db: &Database, id: &ItemId) -> Result<bool, FieldsyncError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE queue_items
                 SET status = CASE WHEN next_retry_at IS NULL THEN 'pending' ELSE 'error' END,
                     claimed_at = NULL
                 WHERE id = ?1 AND status = 'sending'",
                params![id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Release a claim only if it still carries the `claimed_at` stamp its
/// owner holds.
pub async fn release_claim(
    db: &Database,
    id: &ItemId,
    claimed_at: i64,
) -> Result<bool, FieldsyncError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE queue_items
                 SET status = CASE WHEN next_retry_at IS NULL THEN 'pending' ELSE 'error' END,
                     claimed_at = NULL
                 WHERE id = ?1 AND status = 'sending' AND claimed_at = ?2",
                params![id, claimed_at],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Move the stamp of a held claim from `claimed_at` to `now_ms`.
///
/// Returns `false` when the claim was released or taken over since, in
/// which case the caller no longer owns the item.
pub async fn renew_claim(
    db: &Database,
    id: &ItemId,
    claimed_at: i64,
    now_ms: i64,
) -> Result<bool, FieldsyncError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE queue_items SET claimed_at = ?3
                 WHERE id = ?1 AND status = 'sending' AND claimed_at = ?2",
                params![id, claimed_at, now_ms],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Release every `sending` item claimed at or before `claimed_before`.
/// Returns how many were released.
pub async fn release_stale(db: &Database, claimed_before: i64) -> Result<usize, FieldsyncError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queue_items
                 SET status = CASE WHEN next_retry_at IS NULL THEN 'pending' ELSE 'error' END,
                     claimed_at = NULL
                 WHERE status = 'sending'
                   AND (claimed_at IS NULL OR claimed_at <= ?1)",
                params![claimed_before],
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Move a `dead` item back to `pending`, keeping its attempt count.
pub async fn requeue_dead(db: &Database, id: &ItemId) -> Result<bool, FieldsyncError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE queue_items SET status = 'pending', next_retry_at = NULL
                 WHERE id = ?1 AND status = 'dead'",
                params![id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a `dead` item.
pub async fn delete_dead(db: &Database, id: &ItemId) -> Result<bool, FieldsyncError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM queue_items WHERE id = ?1 AND status = 'dead'",
                params![id],
            )?;
            Ok(removed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Number of items, optionally filtered by type and status.
pub async fn count(
    db: &Database,
    op_type: Option<OperationType>,
    status: Option<StatusKind>,
) -> Result<u64, FieldsyncError> {
    let op = op_type.map(|o| o.as_str());
    let status = status.map(|s| s.as_str());
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM queue_items
                 WHERE (?1 IS NULL OR op_type = ?1) AND (?2 IS NULL OR status = ?2)",
                params![op, status],
                |row| row.get::<_, i64>(0),
            )
        })
        .await
        .map(|n| u64::try_from(n).unwrap_or(0))
        .map_err(map_tr_err)
}

/// Items in creation order, optionally filtered by type and status.
pub async fn list(
    db: &Database,
    op_type: Option<OperationType>,
    status: Option<StatusKind>,
) -> Result<Vec<QueueItem>, FieldsyncError> {
    let op = op_type.map(|o| o.as_str());
    let status = status.map(|s| s.as_str());
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM queue_items
                 WHERE (?1 IS NULL OR op_type = ?1) AND (?2 IS NULL OR status = ?2)
                 ORDER BY seq ASC"
            ))?;
            let rows = stmt.query_map(params![op, status], row_to_item)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
