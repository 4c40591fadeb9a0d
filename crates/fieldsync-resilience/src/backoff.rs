// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capped exponential backoff with additive jitter.
//!
//! `delay(attempt) = min(base * 2^attempt, max) + uniform(0, jitter)`.
//! The exponential term saturates instead of overflowing, so any attempt
//! count is safe.

use std::time::Duration;

use rand::Rng;

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1_000);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(60_000);
pub const DEFAULT_JITTER: Duration = Duration::from_millis(1_000);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Deterministic part of the delay: `min(base * 2^attempt, max)`.
pub fn backoff_cap(attempt: u32, base: Duration, max: Duration) -> Duration {
    let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
}

/// Retry delay for `attempt` using the thread-local RNG and the default
/// one-second jitter window.
pub fn compute_retry_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    compute_retry_delay_with(&mut rand::thread_rng(), attempt, base, max, DEFAULT_JITTER)
}

/// Retry delay with an injected RNG and jitter window.
///
/// Never returns zero.
pub fn compute_retry_delay_with<R: Rng + ?Sized>(
    rng: &mut R,
    attempt: u32,
    base: Duration,
    max: Duration,
    jitter: Duration,
) -> Duration {
    let jitter_ms = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
    let jitter = Duration::from_millis(rng.gen_range(0..=jitter_ms));
    backoff_cap(attempt, base, max)
        .saturating_add(jitter)
        .max(Duration::from_millis(1))
}

/// Retry parameters for queued mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failed transmissions allowed before an item is declared dead.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter: DEFAULT_JITTER,
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.delay_for_with(&mut rand::thread_rng(), attempt)
    }

    pub fn delay_for_with<R: Rng + ?Sized>(&self, rng: &mut R, attempt: u32) -> Duration {
        compute_retry_delay_with(rng, attempt, self.base_delay, self.max_delay, self.jitter)
    }

    /// Whether a failure at `attempts` (before increment) still leaves room
    /// for another try.
    pub fn allows_retry_after(&self, attempts: u32) -> bool {
        attempts.saturating_add(1) < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn cap_doubles_until_max() {
        let base = DEFAULT_BASE_DELAY;
        let max = DEFAULT_MAX_DELAY;
        assert_eq!(backoff_cap(0, base, max), Duration::from_secs(1));
        assert_eq!(backoff_cap(1, base, max), Duration::from_secs(2));
        assert_eq!(backoff_cap(5, base, max), Duration::from_secs(32));
        assert_eq!(backoff_cap(6, base, max), Duration::from_secs(60));
        assert_eq!(backoff_cap(u32::MAX, base, max), Duration::from_secs(60));
    }

    #[test]
    fn seeded_rng_is_deterministic() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        let policy = RetryPolicy::default();
        for attempt in 0..12 {
            assert_eq!(policy.delay_for_with(&mut a, attempt), policy.delay_for_with(&mut b, attempt));
        }
    }

    #[test]
    fn zero_jitter_still_positive() {
        let mut rng = StdRng::seed_from_u64(1);
        let delay = compute_retry_delay_with(
            &mut rng,
            0,
            Duration::ZERO,
            Duration::ZERO,
            Duration::ZERO,
        );
        assert_eq!(delay, Duration::from_millis(1));
    }

    #[test]
    fn allows_retry_below_ceiling() {
        let policy = RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        };
        assert!(policy.allows_retry_after(0));
        assert!(policy.allows_retry_after(1));
        assert!(!policy.allows_retry_after(2));
        assert!(!policy.allows_retry_after(u32::MAX));
    }

    proptest! {
        #[test]
        fn delay_is_positive_and_bounded(attempt in 0u32..200, seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let delay = compute_retry_delay_with(
                &mut rng,
                attempt,
                DEFAULT_BASE_DELAY,
                DEFAULT_MAX_DELAY,
                DEFAULT_JITTER,
            );
            let cap = backoff_cap(attempt, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY);
            prop_assert!(delay > Duration::ZERO);
            prop_assert!(delay >= cap);
            prop_assert!(delay <= cap + DEFAULT_JITTER);
        }

        #[test]
        fn cap_is_non_decreasing(attempt in 0u32..200, base_ms in 1u64..10_000, extra_ms in 0u64..1_000_000) {
            let base = Duration::from_millis(base_ms);
            let max = Duration::from_millis(base_ms + extra_ms);
            let here = backoff_cap(attempt, base, max);
            let next = backoff_cap(attempt + 1, base, max);
            prop_assert!(here <= next);
            prop_assert!(next <= max);
        }
    }
}
