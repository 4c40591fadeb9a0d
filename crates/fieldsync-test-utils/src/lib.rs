// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for fieldsync integration tests.
//!
//! Provides scripted adapters and a harness with a temporary database, a
//! manual clock, and fully wired managers, so engine behavior can be tested
//! without a server.
//!
//! # Components
//!
//! - [`MockTransport`] - scripted mutation transport that records every call
//! - [`MockIdentityProvider`] - scripted login/refresh with call counters
//! - [`MockReferenceSource`] - in-memory route plans
//! - [`TestHarness`] - temp store + [`ManualClock`] + [`fieldsync_engine::Engine`]

pub mod harness;
pub mod mock_identity;
pub mod mock_reference;
pub mod mock_transport;

pub use fieldsync_core::ManualClock;
pub use harness::TestHarness;
pub use mock_identity::MockIdentityProvider;
pub use mock_reference::MockReferenceSource;
pub use mock_transport::{MockTransport, SentRequest};
