//! Listener state and in-flight dispatch tracking.
//!
//! State transitions are published on a `watch` channel; an atomic counter
//! with RAII guards tracks in-flight dispatches. Nothing here cancels or
//! drains dispatches; it only makes them observable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Subscription listener state.
///
/// State machine: Disconnected -> Subscribing -> Active -> Terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// No subscription has been attempted yet.
    Disconnected,
    /// Subscribe call issued, waiting for acknowledgment.
    Subscribing,
    /// Processing notifications.
    Active,
    /// The bus closed or the subscription failed.
    Terminated,
}

/// Shared view of the router's runtime state.
#[derive(Debug)]
pub struct RouterLifecycle {
    state_tx: watch::Sender<ListenerState>,
    in_flight: Arc<AtomicU64>,
    completed: AtomicU64,
}

impl RouterLifecycle {
    /// Creates a lifecycle in the `Disconnected` state.
    #[must_use]
    pub fn new() -> Self {
        let (state_tx, _rx) = watch::channel(ListenerState::Disconnected);
        Self {
            state_tx,
            in_flight: Arc::new(AtomicU64::new(0)),
            completed: AtomicU64::new(0),
        }
    }

    /// Returns the current listener state.
    #[must_use]
    pub fn state(&self) -> ListenerState {
        *self.state_tx.borrow()
    }

    pub(crate) fn transition(&self, next: ListenerState) {
        // Stored even when nobody is subscribed.
        self.state_tx.send_replace(next);
    }

    /// Returns a receiver notified on every state transition.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ListenerState> {
        self.state_tx.subscribe()
    }

    /// Waits until the listener reaches `target`.
    pub async fn wait_for_state(&self, target: ListenerState) {
        let mut rx = self.state_receiver();
        // An error means the sender is gone, i.e. the lifecycle was dropped.
        let _ = rx.wait_for(|state| *state == target).await;
    }

    /// Creates an RAII guard that tracks one in-flight dispatch.
    ///
    /// The counter is decremented when the guard is dropped, even if the
    /// dispatch task panics.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Number of dispatches currently running.
    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub(crate) fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of dispatches that finished, successfully or not.
    #[must_use]
    pub fn completed_count(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Waits until no dispatch is in flight, up to `timeout`.
    ///
    /// Returns `false` if the timeout expired first.
    pub async fn wait_for_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if self.in_flight.load(Ordering::Relaxed) == 0 {
                return true;
            }

            if tokio::time::Instant::now() >= deadline {
                return false;
            }

            // Poll at 10ms intervals to avoid busy-waiting
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Default for RouterLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard that decrements the in-flight counter when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<AtomicU64>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_disconnected() {
        let lifecycle = RouterLifecycle::new();
        assert_eq!(lifecycle.state(), ListenerState::Disconnected);
        assert_eq!(lifecycle.in_flight_count(), 0);
        assert_eq!(lifecycle.completed_count(), 0);
    }

    #[test]
    fn transitions_are_visible() {
        let lifecycle = RouterLifecycle::new();

        lifecycle.transition(ListenerState::Subscribing);
        assert_eq!(lifecycle.state(), ListenerState::Subscribing);

        lifecycle.transition(ListenerState::Active);
        assert_eq!(lifecycle.state(), ListenerState::Active);

        lifecycle.transition(ListenerState::Terminated);
        assert_eq!(lifecycle.state(), ListenerState::Terminated);
    }

    #[test]
    fn in_flight_guard_increments_and_decrements() {
        let lifecycle = RouterLifecycle::new();

        let guard1 = lifecycle.in_flight_guard();
        let guard2 = lifecycle.in_flight_guard();
        assert_eq!(lifecycle.in_flight_count(), 2);

        drop(guard1);
        assert_eq!(lifecycle.in_flight_count(), 1);

        drop(guard2);
        assert_eq!(lifecycle.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn wait_for_state_resolves_on_transition() {
        let lifecycle = Arc::new(RouterLifecycle::new());
        let waiter = {
            let lifecycle = Arc::clone(&lifecycle);
            tokio::spawn(async move { lifecycle.wait_for_state(ListenerState::Active).await })
        };

        lifecycle.transition(ListenerState::Subscribing);
        lifecycle.transition(ListenerState::Active);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn wait_for_idle_with_active_dispatch() {
        let lifecycle = RouterLifecycle::new();
        let guard = lifecycle.in_flight_guard();

        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(guard);
        });

        assert!(lifecycle.wait_for_idle(Duration::from_secs(2)).await);
        release.await.unwrap();
    }

    #[tokio::test]
    async fn wait_for_idle_timeout() {
        let lifecycle = RouterLifecycle::new();
        let _guard = lifecycle.in_flight_guard();

        assert!(!lifecycle.wait_for_idle(Duration::from_millis(50)).await);
    }
}
