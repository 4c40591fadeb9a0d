// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-flight execution.
//!
//! The first caller of [`SingleFlight::run`] starts the operation and stores
//! it as a [`Shared`] future. Callers arriving while it is pending await the
//! same handle and receive a clone of the same result. Once the flight
//! resolves the slot is cleared, so the next call starts a fresh one.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

/// A pending operation shared by every caller that joined it.
pub type Flight<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

pub struct SingleFlight<T, E>
where
    T: Clone,
    E: Clone,
{
    slot: Arc<Mutex<Option<Flight<T, E>>>>,
}

impl<T, E> Clone for SingleFlight<T, E>
where
    T: Clone,
    E: Clone,
{
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T, E> Default for SingleFlight<T, E>
where
    T: Clone,
    E: Clone,
{
    fn default() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }
}

impl<T, E> std::fmt::Debug for SingleFlight<T, E>
where
    T: Clone,
    E: Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.lock().is_some())
            .finish()
    }
}

impl<T, E> SingleFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the pending flight, or starts one with `start` if none is
    /// pending. `start` is only invoked when this caller becomes the leader.
    pub async fn run<F, Fut>(&self, start: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let flight = {
            let mut slot = self.lock();
            match slot.as_ref() {
                Some(pending) if pending.peek().is_none() => {
                    tracing::trace!("joining in-flight operation");
                    pending.clone()
                }
                _ => {
                    let flight = start().boxed().shared();
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };

        let result = flight.clone().await;

        let mut slot = self.lock();
        if slot
            .as_ref()
            .is_some_and(|current| Shared::ptr_eq(current, &flight))
        {
            *slot = None;
        }
        result
    }

    /// The pending flight, if one is running.
    pub fn in_flight(&self) -> Option<Flight<T, E>> {
        self.lock()
            .as_ref()
            .filter(|flight| flight.peek().is_none())
            .cloned()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight().is_some()
    }
}

impl<T, E> SingleFlight<T, E>
where
    T: Clone,
    E: Clone,
{
    fn lock(&self) -> MutexGuard<'_, Option<Flight<T, E>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counted(
        calls: &Arc<AtomicUsize>,
        outcome: Result<u32, String>,
    ) -> impl Future<Output = Result<u32, String>> + Send + 'static {
        let calls = Arc::clone(calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            outcome
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_execution() {
        let flight = SingleFlight::<u32, String>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b, c) = tokio::join!(
            flight.run(|| counted(&calls, Ok(7))),
            flight.run(|| counted(&calls, Ok(8))),
            flight.run(|| counted(&calls, Ok(9))),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!((a, b, c), (Ok(7), Ok(7), Ok(7)));
        assert!(!flight.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn errors_are_shared_too() {
        let flight = SingleFlight::<u32, String>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            flight.run(|| counted(&calls, Err("boom".into()))),
            flight.run(|| counted(&calls, Ok(1))),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a, Err("boom".to_string()));
        assert_eq!(b, Err("boom".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn completed_flight_is_not_reused() {
        let flight = SingleFlight::<u32, String>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(flight.run(|| counted(&calls, Ok(1))).await, Ok(1));
        assert_eq!(flight.run(|| counted(&calls, Ok(2))).await, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_exposes_pending_handle() {
        let flight = SingleFlight::<u32, String>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        assert!(flight.in_flight().is_none());

        let leader = {
            let flight = flight.clone();
            let calls = Arc::clone(&calls);
            tokio::spawn(async move { flight.run(|| counted(&calls, Ok(5))).await })
        };
        tokio::task::yield_now().await;

        let handle = flight.in_flight().expect("flight should be pending");
        assert_eq!(handle.await, Ok(5));
        assert_eq!(leader.await.unwrap(), Ok(5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
