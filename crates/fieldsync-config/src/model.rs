// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the fieldsync engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level fieldsync configuration.
///
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FieldsyncConfig {
    /// Client identity and logging.
    #[serde(default)]
    pub client: ClientConfig,

    /// Backend API endpoint and timeouts.
    #[serde(default)]
    pub api: ApiConfig,

    /// Local store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Queue retry and drain scheduling.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Connectivity detection.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Session lifecycle.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Client identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Name reported in logs.
    #[serde(default = "default_client_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: default_client_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_client_name() -> String {
    "fieldsync".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Backend API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Base URL of the backend, without a trailing `/api`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Upper bound on a single request, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("fieldsync").join("fieldsync.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("fieldsync.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Queue retry and drain configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Failed transmissions before an item is declared dead.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Upper bound of the uniform jitter added to every retry delay.
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    /// Interval of the background drain while online.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Maximum items claimed per operation type per drain. Zero means no limit.
    #[serde(default = "default_claim_batch_size")]
    pub claim_batch_size: u32,

    /// Refresh the route plan when connectivity returns.
    #[serde(default = "default_pull_on_reconnect")]
    pub pull_on_reconnect: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
            poll_interval_secs: default_poll_interval_secs(),
            claim_batch_size: default_claim_batch_size(),
            pull_on_reconnect: default_pull_on_reconnect(),
        }
    }
}

impl SyncConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Batch limit, or `None` when unlimited.
    pub fn claim_limit(&self) -> Option<u32> {
        (self.claim_batch_size > 0).then_some(self.claim_batch_size)
    }
}

fn default_max_attempts() -> u32 {
    10
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_jitter_ms() -> u64 {
    1_000
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_claim_batch_size() -> u32 {
    50
}

fn default_pull_on_reconnect() -> bool {
    true
}

/// Connectivity detection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    /// How long the raw signal must stay unchanged before a transition is
    /// committed. At least 1000.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Interval between health probes in daemon mode.
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            probe_interval_secs: default_probe_interval_secs(),
        }
    }
}

impl NetworkConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

fn default_settle_ms() -> u64 {
    1_000
}

fn default_probe_interval_secs() -> u64 {
    15
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Tokens expiring within this margin are refreshed proactively.
    #[serde(default = "default_refresh_skew_secs")]
    pub refresh_skew_secs: u64,

    /// Default for the "remember me" login option.
    #[serde(default = "default_remember_me")]
    pub remember_me: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_skew_secs: default_refresh_skew_secs(),
            remember_me: default_remember_me(),
        }
    }
}

impl SessionConfig {
    pub fn refresh_skew(&self) -> Duration {
        Duration::from_secs(self.refresh_skew_secs)
    }
}

fn default_refresh_skew_secs() -> u64 {
    60
}

fn default_remember_me() -> bool {
    true
}
