// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the fieldsync offline engine.
//!
//! Provides WAL-mode SQLite storage with embedded additive migrations, a
//! single-writer concurrency model via `tokio-rusqlite`, partitioned JSON
//! records with named indexes, and the durable mutation queue.

pub mod database;
pub mod migrations;
pub mod partition;
pub mod queries;

pub use database::Database;
pub use partition::Partition;
pub use queries::records::PartitionTx;
