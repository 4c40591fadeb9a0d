// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the engine's external boundaries.
//!
//! All adapters extend the [`Adapter`] base trait and use `#[async_trait]`
//! for dynamic dispatch compatibility, so the engine can hold them as
//! `Arc<dyn ...>` and tests can swap in mocks.

pub mod adapter;
pub mod identity;
pub mod reference;
pub mod transport;

pub use adapter::Adapter;
pub use identity::IdentityProvider;
pub use reference::ReferenceSource;
pub use transport::Transport;
