// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP adapters for the fieldsync engine.
//!
//! Implements the core boundary traits on top of a shared reqwest client:
//! [`HttpTransport`] (queued mutations), [`HttpIdentityProvider`] (login and
//! refresh), [`HttpReferenceSource`] (route plans), and [`HealthProbe`]
//! (raw connectivity signal).

pub mod health;
pub mod http;
pub mod identity;
pub mod reference;
pub mod transport;
mod wire;

pub use health::HealthProbe;
pub use http::ApiClient;
pub use identity::HttpIdentityProvider;
pub use reference::HttpReferenceSource;
pub use transport::HttpTransport;
