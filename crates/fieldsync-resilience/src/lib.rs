// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives for the fieldsync offline engine.
//!
//! - [`idempotency`]: per-item idempotency keys.
//! - [`backoff`]: capped exponential retry delays with jitter.
//! - [`single_flight`]: one shared execution for concurrent callers.

pub mod backoff;
pub mod idempotency;
pub mod single_flight;

pub use backoff::{RetryPolicy, backoff_cap, compute_retry_delay, compute_retry_delay_with};
pub use idempotency::new_idempotency_key;
pub use single_flight::SingleFlight;
