//! Single-flight guard for the token refresh.
//!
//! The first caller to find the slot empty starts the refresh on the runtime
//! and parks a shared handle to its outcome in the slot; every caller that
//! arrives while it runs awaits that same handle. The spawned task clears the
//! slot itself, so the guard resets even when every waiting caller has been
//! dropped.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

type Outcome = Shared<BoxFuture<'static, bool>>;

struct InFlight {
    generation: u64,
    outcome: Outcome,
}

#[derive(Default)]
struct GuardState {
    slot: Mutex<Option<InFlight>>,
    generation: AtomicU64,
}

impl GuardState {
    fn settle(&self, generation: u64) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|f| f.generation == generation) {
            *slot = None;
        }
    }
}

/// Clears the slot when the refresh task ends, including by panic
struct Settle {
    state: Arc<GuardState>,
    generation: u64,
}

impl Drop for Settle {
    fn drop(&mut self) {
        self.state.settle(self.generation);
    }
}

/// How a caller took part in a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flight {
    pub refreshed: bool,
    /// This caller started the refresh rather than joining one
    pub initiated: bool,
}

/// Subscribe-or-initiate guard around a `bool` producing refresh
#[derive(Clone, Default)]
pub struct RefreshGuard {
    state: Arc<GuardState>,
}

impl RefreshGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Await the in-flight refresh, or start `refresh` if none is running.
    ///
    /// `refresh` is only invoked by the caller that starts a new flight. A
    /// refresh that panics resolves to `false`.
    pub async fn run<F, Fut>(&self, refresh: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.join(refresh).await.refreshed
    }

    /// Like [`run`](Self::run), also reporting whether this caller started
    /// the flight
    pub async fn join<F, Fut>(&self, refresh: F) -> Flight
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let (outcome, initiated) = {
            let mut slot = self
                .state
                .slot
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            match slot.as_ref() {
                Some(in_flight) => {
                    tracing::debug!(
                        generation = in_flight.generation,
                        "Joining in-flight token refresh"
                    );
                    (in_flight.outcome.clone(), false)
                }
                None => {
                    let generation = self.state.generation.fetch_add(1, Ordering::SeqCst) + 1;
                    let settle = Settle {
                        state: Arc::clone(&self.state),
                        generation,
                    };
                    let refresh = refresh();

                    tracing::debug!(generation, "Starting token refresh");
                    let task = tokio::spawn(async move {
                        let _settle = settle;
                        refresh.await
                    });

                    let outcome = task
                        .map(|joined| joined.unwrap_or(false))
                        .boxed()
                        .shared();
                    *slot = Some(InFlight {
                        generation,
                        outcome: outcome.clone(),
                    });
                    (outcome, true)
                }
            }
        };

        Flight {
            refreshed: outcome.await,
            initiated,
        }
    }

    /// Whether a refresh is currently running
    pub fn is_in_flight(&self) -> bool {
        self.state
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Number of refreshes started so far
    pub fn started(&self) -> u64 {
        self.state.generation.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for RefreshGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshGuard")
            .field("in_flight", &self.is_in_flight())
            .field("started", &self.started())
            .finish()
    }
}
