// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyed JSON records grouped into partitions.

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use fieldsync_core::FieldsyncError;

use crate::database::{Database, map_tr_err};
use crate::partition::Partition;

fn parse_value(idx: usize, text: &str) -> rusqlite::Result<Value> {
    serde_json::from_str(text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn get_in(conn: &Connection, partition: Partition, key: &str) -> rusqlite::Result<Option<Value>> {
    conn.query_row(
        "SELECT value FROM records WHERE partition = ?1 AND key = ?2",
        params![partition.as_str(), key],
        |row| parse_value(0, &row.get::<_, String>(0)?),
    )
    .optional()
}

fn put_in(conn: &Connection, partition: Partition, key: &str, value: &Value) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO records (partition, key, value) VALUES (?1, ?2, ?3)
         ON CONFLICT (partition, key) DO UPDATE SET
             value = excluded.value,
             updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
        params![partition.as_str(), key, value.to_string()],
    )?;
    Ok(())
}

fn delete_in(conn: &Connection, partition: Partition, key: &str) -> rusqlite::Result<bool> {
    let removed = conn.execute(
        "DELETE FROM records WHERE partition = ?1 AND key = ?2",
        params![partition.as_str(), key],
    )?;
    Ok(removed > 0)
}

fn all_in(conn: &Connection, partition: Partition) -> rusqlite::Result<Vec<(String, Value)>> {
    let mut stmt =
        conn.prepare("SELECT key, value FROM records WHERE partition = ?1 ORDER BY key")?;
    let rows = stmt.query_map(params![partition.as_str()], |row| {
        Ok((row.get(0)?, parse_value(1, &row.get::<_, String>(1)?)?))
    })?;
    rows.collect()
}

/// `path` comes from a partition's static index table, never from input.
fn query_in(
    conn: &Connection,
    partition: Partition,
    path: &str,
    value: &str,
) -> rusqlite::Result<Vec<(String, Value)>> {
    let sql = format!(
        "SELECT key, value FROM records
         WHERE partition = ?1 AND json_extract(value, '{path}') = ?2
         ORDER BY key"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![partition.as_str(), value], |row| {
        Ok((row.get(0)?, parse_value(1, &row.get::<_, String>(1)?)?))
    })?;
    rows.collect()
}

fn delete_where_in(
    conn: &Connection,
    partition: Partition,
    path: &str,
    value: &str,
) -> rusqlite::Result<usize> {
    let sql = format!(
        "DELETE FROM records WHERE partition = ?1 AND json_extract(value, '{path}') = ?2"
    );
    conn.execute(&sql, params![partition.as_str(), value])
}

/// Fetch one record.
pub async fn get(
    db: &Database,
    partition: Partition,
    key: &str,
) -> Result<Option<Value>, FieldsyncError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| get_in(conn, partition, &key))
        .await
        .map_err(map_tr_err)
}

/// Fetch one record and deserialize it.
pub async fn get_as<T: DeserializeOwned>(
    db: &Database,
    partition: Partition,
    key: &str,
) -> Result<Option<T>, FieldsyncError> {
    get(db, partition, key)
        .await?
        .map(serde_json::from_value)
        .transpose()
        .map_err(FieldsyncError::storage)
}

/// Insert or replace one record.
pub async fn put(
    db: &Database,
    partition: Partition,
    key: &str,
    value: Value,
) -> Result<(), FieldsyncError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| put_in(conn, partition, &key, &value))
        .await
        .map_err(map_tr_err)
}

pub async fn put_as<T: Serialize>(
    db: &Database,
    partition: Partition,
    key: &str,
    value: &T,
) -> Result<(), FieldsyncError> {
    let value = serde_json::to_value(value).map_err(FieldsyncError::storage)?;
    put(db, partition, key, value).await
}

/// Remove one record. Returns whether it existed.
pub async fn delete(db: &Database, partition: Partition, key: &str) -> Result<bool, FieldsyncError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| delete_in(conn, partition, &key))
        .await
        .map_err(map_tr_err)
}

/// Every record of a partition, ordered by key.
pub async fn get_all(
    db: &Database,
    partition: Partition,
) -> Result<Vec<(String, Value)>, FieldsyncError> {
    db.connection()
        .call(move |conn| all_in(conn, partition))
        .await
        .map_err(map_tr_err)
}

/// Records whose indexed field equals `value`.
///
/// Fails with `Validation` if the partition declares no such index.
pub async fn query(
    db: &Database,
    partition: Partition,
    index_name: &str,
    value: &str,
) -> Result<Vec<(String, Value)>, FieldsyncError> {
    let path = partition.index_path(index_name)?;
    let value = value.to_string();
    db.connection()
        .call(move |conn| query_in(conn, partition, path, &value))
        .await
        .map_err(map_tr_err)
}

/// Run `f` inside one SQLite transaction on the writer thread.
///
/// `f` may only touch the declared `partitions`. If `f` returns an error
/// (including an access to an undeclared partition) nothing is committed.
pub async fn run_in_transaction<F, R>(
    db: &Database,
    partitions: &[Partition],
    f: F,
) -> Result<R, FieldsyncError>
where
    F: FnOnce(&mut PartitionTx<'_>) -> Result<R, FieldsyncError> + Send + 'static,
    R: Send + 'static,
{
    let partitions = partitions.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let outcome = {
                let mut scoped = PartitionTx {
                    conn: &tx,
                    partitions: &partitions,
                };
                f(&mut scoped)
            };
            match outcome {
                Ok(value) => {
                    tx.commit()?;
                    Ok(Ok(value))
                }
                // Dropping `tx` rolls back.
                Err(err) => Ok(Err(err)),
            }
        })
        .await
        .map_err(map_tr_err)?
}

/// Record access scoped to the partitions declared for a transaction.
pub struct PartitionTx<'a> {
    conn: &'a Connection,
    partitions: &'a [Partition],
}

impl PartitionTx<'_> {
    fn check(&self, partition: Partition) -> Result<(), FieldsyncError> {
        if self.partitions.contains(&partition) {
            Ok(())
        } else {
            Err(FieldsyncError::Validation {
                message: format!("partition `{partition}` is not part of this transaction"),
            })
        }
    }

    pub fn get(&self, partition: Partition, key: &str) -> Result<Option<Value>, FieldsyncError> {
        self.check(partition)?;
        get_in(self.conn, partition, key).map_err(FieldsyncError::storage)
    }

    pub fn put(&mut self, partition: Partition, key: &str, value: &Value) -> Result<(), FieldsyncError> {
        self.check(partition)?;
        put_in(self.conn, partition, key, value).map_err(FieldsyncError::storage)
    }

    pub fn put_as<T: Serialize>(
        &mut self,
        partition: Partition,
        key: &str,
        value: &T,
    ) -> Result<(), FieldsyncError> {
        let value = serde_json::to_value(value).map_err(FieldsyncError::storage)?;
        self.put(partition, key, &value)
    }

    pub fn delete(&mut self, partition: Partition, key: &str) -> Result<bool, FieldsyncError> {
        self.check(partition)?;
        delete_in(self.conn, partition, key).map_err(FieldsyncError::storage)
    }

    pub fn get_all(&self, partition: Partition) -> Result<Vec<(String, Value)>, FieldsyncError> {
        self.check(partition)?;
        all_in(self.conn, partition).map_err(FieldsyncError::storage)
    }

    pub fn query(
        &self,
        partition: Partition,
        index_name: &str,
        value: &str,
    ) -> Result<Vec<(String, Value)>, FieldsyncError> {
        self.check(partition)?;
        let path = partition.index_path(index_name)?;
        query_in(self.conn, partition, path, value).map_err(FieldsyncError::storage)
    }

    /// Delete every record whose indexed field equals `value`.
    pub fn delete_by_index(
        &mut self,
        partition: Partition,
        index_name: &str,
        value: &str,
    ) -> Result<usize, FieldsyncError> {
        self.check(partition)?;
        let path = partition.index_path(index_name)?;
        delete_where_in(self.conn, partition, path, value).map_err(FieldsyncError::storage)
    }
}
