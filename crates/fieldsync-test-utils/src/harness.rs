// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end engine tests.
//!
//! `TestHarness` assembles a complete [`Engine`] over a temp SQLite database
//! with scripted adapters and a [`ManualClock`]. Retry jitter is disabled so
//! schedules are exact.

use std::sync::Arc;
use std::time::Duration;

use fieldsync_config::FieldsyncConfig;
use fieldsync_core::{FieldsyncError, ManualClock, User};
use fieldsync_engine::{Adapters, Engine};
use fieldsync_storage::Database;

use crate::mock_identity::MockIdentityProvider;
use crate::mock_reference::MockReferenceSource;
use crate::mock_transport::MockTransport;

/// 2026-03-01T12:00:00Z
pub const DEFAULT_START_MS: i64 = 1_772_366_400_000;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: FieldsyncConfig,
    online: bool,
    start_ms: i64,
    transport: MockTransport,
    identity: MockIdentityProvider,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = FieldsyncConfig::default();
        config.sync.jitter_ms = 0;
        Self {
            config,
            online: true,
            start_ms: DEFAULT_START_MS,
            transport: MockTransport::new(),
            identity: MockIdentityProvider::new(),
        }
    }

    /// Start with the gatekeeper offline.
    pub fn offline(mut self) -> Self {
        self.online = false;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.sync.max_attempts = max_attempts;
        self
    }

    pub fn with_transport(mut self, transport: MockTransport) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_identity(mut self, identity: MockIdentityProvider) -> Self {
        self.identity = identity;
        self
    }

    /// Adjust any other setting.
    pub fn with_config(mut self, edit: impl FnOnce(&mut FieldsyncConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    /// Build the harness. Must be called inside a tokio runtime.
    pub async fn build(self) -> Result<TestHarness, FieldsyncError> {
        let temp_dir = tempfile::TempDir::new().map_err(FieldsyncError::storage)?;
        let db_path = temp_dir.path().join("fieldsync-test.db");
        let mut config = self.config;
        config.storage.database_path = db_path.to_string_lossy().to_string();

        let db = Database::open(&config.storage.database_path).await?;
        let clock = ManualClock::new(self.start_ms);
        let reference = MockReferenceSource::new();

        let engine = wire(
            &config,
            &db,
            &clock,
            &self.transport,
            &self.identity,
            &reference,
            self.online,
        );
        Ok(TestHarness {
            engine,
            db,
            clock,
            transport: self.transport,
            identity: self.identity,
            reference,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock adapters and temp storage.
pub struct TestHarness {
    engine: Engine,
    /// Store shared across restarts.
    pub db: Database,
    pub clock: ManualClock,
    pub transport: MockTransport,
    pub identity: MockIdentityProvider,
    pub reference: MockReferenceSource,
    pub config: FieldsyncConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// The wired engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Simulate a process restart: fresh managers over the same store and
    /// adapters.
    pub fn restart(&mut self, online: bool) {
        self.engine = wire(
            &self.config,
            &self.db,
            &self.clock,
            &self.transport,
            &self.identity,
            &self.reference,
            online,
        );
    }

    /// A second engine over the same store and adapters, as another process
    /// on the device would have. Its claims and session are its own.
    pub fn second_engine(&self, online: bool) -> Engine {
        wire(
            &self.config,
            &self.db,
            &self.clock,
            &self.transport,
            &self.identity,
            &self.reference,
            online,
        )
    }

    /// Log in as `user_id` and persist the session.
    pub async fn login(&self, user_id: &str) -> Result<User, FieldsyncError> {
        self.engine().session.login(user_id, "secret", true).await
    }

    /// Report a raw connectivity change and wait out the settle window.
    pub async fn set_online(&self, online: bool) {
        self.engine().network.report(online);
        tokio::time::sleep(self.config.network.settle() + Duration::from_millis(10)).await;
    }

    /// Move the manual clock forward.
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}

fn wire(
    config: &FieldsyncConfig,
    db: &Database,
    clock: &ManualClock,
    transport: &MockTransport,
    identity: &MockIdentityProvider,
    reference: &MockReferenceSource,
    online: bool,
) -> Engine {
    let adapters = Adapters {
        transport: Arc::new(transport.clone()),
        identity: Arc::new(identity.clone()),
        reference: Arc::new(reference.clone()),
    };
    Engine::new(config, db.clone(), Arc::new(clock.clone()), adapters, online)
}
