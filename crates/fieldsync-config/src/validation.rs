// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as URL schemes, retry bounds and the connectivity settle
//! window.

use crate::diagnostic::ConfigError;
use crate::model::FieldsyncConfig;

/// Smallest accepted connectivity settle window.
pub const MIN_SETTLE_MS: u64 = 1_000;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &FieldsyncConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.client.log_level.as_str()) {
        fail(format!(
            "client.log_level must be one of {}, got `{}`",
            LOG_LEVELS.join(", "),
            config.client.log_level
        ));
    }

    let base_url = config.api.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        fail(format!(
            "api.base_url must start with http:// or https://, got `{base_url}`"
        ));
    }

    if config.api.request_timeout_secs == 0 {
        fail("api.request_timeout_secs must be greater than 0".to_string());
    }

    if config.api.connect_timeout_secs == 0 {
        fail("api.connect_timeout_secs must be greater than 0".to_string());
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.sync.max_attempts < 1 {
        fail("sync.max_attempts must be at least 1".to_string());
    }

    if config.sync.base_delay_ms == 0 {
        fail("sync.base_delay_ms must be greater than 0".to_string());
    }

    if config.sync.max_delay_ms < config.sync.base_delay_ms {
        fail(format!(
            "sync.max_delay_ms ({}) must not be smaller than sync.base_delay_ms ({})",
            config.sync.max_delay_ms, config.sync.base_delay_ms
        ));
    }

    if config.sync.jitter_ms == 0 {
        fail("sync.jitter_ms must be greater than 0".to_string());
    }

    if config.sync.poll_interval_secs == 0 {
        fail("sync.poll_interval_secs must be greater than 0".to_string());
    }

    if config.network.settle_ms < MIN_SETTLE_MS {
        fail(format!(
            "network.settle_ms must be at least {MIN_SETTLE_MS}, got {}",
            config.network.settle_ms
        ));
    }

    if config.network.probe_interval_secs == 0 {
        fail("network.probe_interval_secs must be greater than 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
