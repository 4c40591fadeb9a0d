// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, migrations, and lifecycle.
//!
//! All access is serialized through tokio-rusqlite's single background
//! thread. `Database` is cheap to clone; every clone talks to the same
//! thread. Do NOT open additional connections for writes.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use fieldsync_core::{Adapter, FieldsyncError, HealthStatus};

use crate::migrations;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Convert a tokio-rusqlite error into a storage error.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> FieldsyncError {
    FieldsyncError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the local SQLite store.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
    path: String,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}

impl Database {
    /// Open (or create) the database at `path` in WAL mode.
    pub async fn open(path: &str) -> Result<Self, FieldsyncError> {
        Self::open_with(path, true).await
    }

    /// Open the database, apply PRAGMAs, and run embedded migrations.
    ///
    /// Any failure here is fatal for the caller: the engine cannot run
    /// without its store.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, FieldsyncError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(FieldsyncError::storage)?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| FieldsyncError::Storage {
                source: Box::new(e),
            })?;

        let version = conn
            .call(move |conn| {
                conn.busy_timeout(BUSY_TIMEOUT)?;
                if wal_mode {
                    let _mode: String =
                        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
                    conn.pragma_update(None, "synchronous", "NORMAL")?;
                }
                conn.pragma_update(None, "foreign_keys", true)?;
                Ok(migrations::run_migrations(conn))
            })
            .await
            .map_err(map_tr_err)??;

        tracing::debug!(path, version, wal_mode, "database opened");
        Ok(Self {
            conn,
            path: path.to_string(),
        })
    }

    /// Underlying tokio-rusqlite connection, for query modules.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Value of `PRAGMA user_version`, stamped after migrations.
    pub async fn schema_version(&self) -> Result<i64, FieldsyncError> {
        self.conn
            .call(|conn| conn.pragma_query_value(None, "user_version", |row| row.get(0)))
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), FieldsyncError> {
        self.conn
            .call(|conn| conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(())))
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(map_tr_err)?;
        tracing::debug!(path = %self.path, "database closed");
        Ok(())
    }
}

#[async_trait]
impl Adapter for Database {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn health_check(&self) -> Result<HealthStatus, FieldsyncError> {
        let one: i64 = self
            .conn
            .call(|conn| conn.query_row("SELECT 1", [], |row| row.get(0)))
            .await
            .map_err(map_tr_err)?;
        if one == 1 {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy(format!("SELECT 1 returned {one}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_runs_migrations_and_stamps_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();

        assert_eq!(db.schema_version().await.unwrap(), migrations::latest_version());
        assert!(migrations::latest_version() >= 3);

        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' \
                     AND name IN ('records', 'queue_items') ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .unwrap();
        assert_eq!(tables, vec!["queue_items", "records"]);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");
        let path = path.to_str().unwrap();

        Database::open(path).await.unwrap().close().await.unwrap();
        let db = Database::open(path).await.unwrap();
        assert_eq!(db.schema_version().await.unwrap(), migrations::latest_version());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn creates_missing_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("store.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        assert!(path.exists());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn health_check_reports_healthy() {
        let dir = tempdir().unwrap();
        let db = Database::open_with(dir.path().join("h.db").to_str().unwrap(), false)
            .await
            .unwrap();
        assert_eq!(db.health_check().await.unwrap(), HealthStatus::Healthy);
        assert_eq!(db.name(), "sqlite");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn open_fails_on_unreadable_path() {
        let dir = tempdir().unwrap();
        // A directory cannot be opened as a database file.
        let result = Database::open(dir.path().to_str().unwrap()).await;
        assert!(matches!(result, Err(FieldsyncError::Storage { .. })));
    }
}
