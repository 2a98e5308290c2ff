//! Progress tracking across concurrently-running account pipelines.
//!
//! The tracker is a plain atomic counter. Notifier side-channels (console,
//! remote messengers) hang off it behind [`ProgressNotifier`]; their
//! failures are logged and suppressed, never surfaced to the pipeline that
//! incremented.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Trait for progress notification side-channels.
///
/// Implementations must not rely on being called from any particular task;
/// increments arrive from arbitrary worker pipelines concurrently.
pub trait ProgressNotifier: Send + Sync {
    /// Called after each increment with the new counts.
    fn notify(&self, done: usize, total: usize);
}

/// A no-op notifier that discards all updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpNotifier;

impl ProgressNotifier for NoOpNotifier {
    fn notify(&self, _done: usize, _total: usize) {
        // Intentionally empty - discards all updates
    }
}

/// A notifier that logs progress using the tracing framework.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

impl ProgressNotifier for LoggingNotifier {
    fn notify(&self, done: usize, total: usize) {
        info!(done, total, "Accounts completed: {done} of {total}");
    }
}

/// Thread-safe "N of M accounts done" counter.
///
/// `done` only ever moves forward and never exceeds `total` under the
/// one-guard-per-pipeline discipline enforced by [`ProgressGuard`].
#[derive(Default)]
pub struct ProgressTracker {
    total: usize,
    done: AtomicUsize,
    notifiers: RwLock<Vec<Arc<dyn ProgressNotifier>>>,
}

impl ProgressTracker {
    /// Creates a tracker for `total` accounts.
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            total,
            done: AtomicUsize::new(0),
            notifiers: RwLock::new(Vec::new()),
        }
    }

    /// Attaches a notifier side-channel.
    pub fn add_notifier(&self, notifier: Arc<dyn ProgressNotifier>) {
        self.notifiers.write().push(notifier);
    }

    /// Increments the done count.
    ///
    /// Safe under arbitrary concurrent callers. Notifier panics are caught
    /// and logged so the calling pipeline is never disturbed.
    pub fn increment(&self, delta: usize) {
        let done = self.done.fetch_add(delta, Ordering::SeqCst) + delta;
        let notifiers = self.notifiers.read();
        for notifier in notifiers.iter() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                notifier.notify(done, self.total);
            }));
            if let Err(e) = result {
                warn!("Progress notifier panicked: {e:?}");
            }
        }
    }

    /// Returns `(done, total)`.
    #[must_use]
    pub fn snapshot(&self) -> (usize, usize) {
        (self.done.load(Ordering::SeqCst), self.total)
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (done, total) = self.snapshot();
        f.debug_struct("ProgressTracker")
            .field("done", &done)
            .field("total", &total)
            .finish()
    }
}

/// RAII guard that increments a tracker exactly once on drop.
///
/// Each pipeline creates one guard on entry and holds it for its whole body,
/// so the increment happens even when a step errors or the pipeline task
/// panics and unwinds.
pub struct ProgressGuard {
    tracker: Arc<ProgressTracker>,
}

impl ProgressGuard {
    /// Arms a guard for one pipeline.
    #[must_use]
    pub fn new(tracker: Arc<ProgressTracker>) -> Self {
        Self { tracker }
    }
}

impl Drop for ProgressGuard {
    fn drop(&mut self) {
        self.tracker.increment(1);
    }
}

impl std::fmt::Debug for ProgressGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressGuard")
            .field("tracker", &self.tracker)
            .finish()
    }
}
