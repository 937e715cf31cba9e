//! Cooperative cancellation for download runs.
//!
//! A [`ShutdownCoordinator`] is the run's poison flag: the orchestrator (or the
//! Ctrl+C handler) sets it once, and every download task checks it before doing
//! any I/O. Handles are passed explicitly to whoever needs them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Shared handle to a shutdown coordinator.
pub type SharedShutdown = Arc<ShutdownCoordinator>;

/// Write-once poison flag with async notification.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    poisoned: AtomicBool,
    notify: Notify,
}

impl ShutdownCoordinator {
    /// Create a new, unset coordinator.
    pub fn new() -> Self {
        Self {
            poisoned: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Create a new coordinator wrapped in [`Arc`].
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::new())
    }

    /// Set the poison flag. Waiters are woken on the first call only.
    pub fn request_shutdown(&self) {
        if !self.poisoned.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    /// Whether the poison flag has been set.
    pub fn is_shutdown_requested(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }

    /// Resolve once the poison flag is set.
    pub async fn wait_for_shutdown(&self) {
        // Register interest before checking the flag so a concurrent
        // request_shutdown() cannot slip between the two.
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_shutdown_requested() {
            return;
        }
        notified.await;
    }
}
