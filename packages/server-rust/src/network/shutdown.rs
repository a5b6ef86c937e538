//! Graceful shutdown controller with in-flight request tracking.
//!
//! One controller is shared by the listener, every session, and the
//! announcer's owner. Sessions take an RAII guard around each request so
//! shutdown can wait for work already in progress without accepting more.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;

/// Service health state, transitioned by the shutdown controller.
///
/// State machine: Starting -> Ready -> Draining -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Still initializing; not yet accepting sessions.
    Starting,
    /// Accepting sessions and serving requests.
    Ready,
    /// Stop flag set; draining in-flight requests.
    Draining,
    /// All in-flight requests completed.
    Stopped,
}

/// Coordinates graceful shutdown across the accept loop and sessions.
///
/// 1. loops `select!` on [`ShutdownController::shutdown_receiver`]
/// 2. `trigger_shutdown()` moves to Draining and wakes every listener
/// 3. `wait_for_drain()` blocks until in-flight requests complete
#[derive(Debug)]
pub struct ShutdownController {
    shutdown_signal: watch::Sender<bool>,
    in_flight: Arc<AtomicU64>,
    health_state: Mutex<HealthState>,
}

impl ShutdownController {
    /// Creates a controller in the `Starting` state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            shutdown_signal: tx,
            in_flight: Arc::new(AtomicU64::new(0)),
            health_state: Mutex::new(HealthState::Starting),
        }
    }

    /// Marks the service ready to accept sessions.
    pub fn set_ready(&self) {
        *self.health_state.lock() = HealthState::Ready;
    }

    /// Returns a receiver notified when shutdown is triggered.
    #[must_use]
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_signal.subscribe()
    }

    /// Whether shutdown has been triggered.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_signal.borrow()
    }

    /// Initiates graceful shutdown: Draining state, all receivers woken.
    pub fn trigger_shutdown(&self) {
        *self.health_state.lock() = HealthState::Draining;
        // Ignore send errors -- receivers may have been dropped
        let _ = self.shutdown_signal.send(true);
    }

    /// Returns the current health state.
    #[must_use]
    pub fn health_state(&self) -> HealthState {
        *self.health_state.lock()
    }

    /// Creates an RAII guard that tracks one in-flight request.
    ///
    /// The counter is decremented when the guard drops, even if the
    /// handler panics.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Returns the current number of in-flight requests.
    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Waits for in-flight requests to complete, up to `timeout`.
    ///
    /// Returns `true` on a clean drain (state becomes `Stopped`), `false`
    /// when the deadline passed with requests still running.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if self.in_flight.load(Ordering::Relaxed) == 0 {
                *self.health_state.lock() = HealthState::Stopped;
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

impl Default for ShutdownController {
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
