// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded database migrations using refinery.
//!
//! SQL migration files are compiled into the binary at build time via
//! `embed_migrations!`. Migrations are additive: each version only creates
//! tables and indexes.

use fieldsync_core::FieldsyncError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Highest migration version compiled into this build.
pub fn latest_version() -> i64 {
    embedded::migrations::runner()
        .get_migrations()
        .iter()
        .map(|m| i64::from(m.version()))
        .max()
        .unwrap_or(0)
}

/// Run all pending migrations and stamp `PRAGMA user_version`.
///
/// Returns the schema version now in effect.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<i64, FieldsyncError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| FieldsyncError::Storage {
            source: e.to_string().into(),
        })?;

    let applied = report.applied_migrations().len();
    let version = latest_version();
    conn.pragma_update(None, "user_version", version)
        .map_err(FieldsyncError::storage)?;

    if applied > 0 {
        tracing::info!(applied, version, "database migrations applied");
    }
    Ok(version)
}
