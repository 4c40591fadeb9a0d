// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide wiring shared by every subcommand.

use std::sync::Arc;

use fieldsync_client::{ApiClient, HealthProbe, HttpIdentityProvider, HttpReferenceSource, HttpTransport};
use fieldsync_config::model::FieldsyncConfig;
use fieldsync_core::{FieldsyncError, SystemClock};
use fieldsync_engine::{Adapters, Engine};
use fieldsync_storage::Database;
use tracing::{debug, info};

/// Exit status when the command needs a fresh login.
pub const EXIT_AUTH_REQUIRED: u8 = 2;

/// The engine plus the pieces only the binary needs.
pub struct App {
    pub config: FieldsyncConfig,
    pub engine: Engine,
    pub probe: HealthProbe,
}

impl App {
    /// Open the store and wire the engine against the HTTP adapters.
    ///
    /// The gatekeeper is seeded from one health probe so one-shot commands
    /// do not wait out the settle window.
    pub async fn open(config: FieldsyncConfig) -> Result<Self, FieldsyncError> {
        let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;
        let api = ApiClient::from_config(&config.api)?;
        let probe = HealthProbe::new(api.clone());
        let online = probe.is_reachable().await;
        debug!(base_url = api.base_url(), online, "backend probed");

        let adapters = Adapters {
            transport: Arc::new(HttpTransport::new(api.clone())),
            identity: Arc::new(
                HttpIdentityProvider::new(api.clone()).with_remember_me(config.session.remember_me),
            ),
            reference: Arc::new(HttpReferenceSource::new(api)),
        };
        let engine = Engine::new(&config, db, Arc::new(SystemClock), adapters, online);

        info!(
            client = %config.client.name,
            database = %config.storage.database_path,
            online,
            "fieldsync ready"
        );
        Ok(Self {
            config,
            engine,
            probe,
        })
    }
}

/// Initializes the tracing subscriber with the given log level.
///
/// `RUST_LOG` overrides the configured level. Logs go to stderr so command
/// output on stdout stays scriptable.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fieldsync={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
