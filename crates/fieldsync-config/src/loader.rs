// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./fieldsync.toml` > `~/.config/fieldsync/fieldsync.toml`
//! > `/etc/fieldsync/fieldsync.toml`, with environment variable overrides via
//! the `FIELDSYNC_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::FieldsyncConfig;

pub const SYSTEM_CONFIG_PATH: &str = "/etc/fieldsync/fieldsync.toml";
pub const LOCAL_CONFIG_FILE: &str = "fieldsync.toml";
pub const ENV_PREFIX: &str = "FIELDSYNC_";

/// Top-level sections, used to split env var names into `section.key`.
const SECTIONS: &[&str] = &["client", "api", "storage", "sync", "network", "session"];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/fieldsync/fieldsync.toml` (system-wide)
/// 3. `~/.config/fieldsync/fieldsync.toml` (user XDG config)
/// 4. `./fieldsync.toml` (local directory)
/// 5. `FIELDSYNC_*` environment variables
pub fn load_config() -> Result<FieldsyncConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<FieldsyncConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(FieldsyncConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<FieldsyncConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(FieldsyncConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(FieldsyncConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// `~/.config/fieldsync/fieldsync.toml`, when a config dir exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fieldsync").join(LOCAL_CONFIG_FILE))
}

/// Environment provider mapping `FIELDSYNC_<SECTION>_<KEY>` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys themselves
/// contain underscores: `FIELDSYNC_SYNC_MAX_ATTEMPTS` must become
/// `sync.max_attempts`, not `sync.max.attempts`.
fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).map(|key| map_env_key(key.as_str()).into())
}

/// Maps a prefix-stripped env key to its dotted, lowercased config path.
///
/// Figment hands the key to `map` in its original case and only lowercases
/// after mapping, so the key is folded here before matching sections.
pub(crate) fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}
