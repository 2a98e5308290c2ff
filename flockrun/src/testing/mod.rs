//! Mock tasks and notifiers for testing.

use crate::account::Account;
use crate::errors::TaskError;
use crate::progress::ProgressNotifier;
use crate::tasks::{Task, TaskContext};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A mock task that records calls and returns a configurable outcome.
#[derive(Debug)]
pub struct MockTask {
    name: String,
    outcome: Mutex<Result<bool, TaskError>>,
    call_count: AtomicUsize,
    seen_accounts: Mutex<Vec<usize>>,
}

impl MockTask {
    /// Creates a new mock task that confirms success.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: Mutex::new(Ok(true)),
            call_count: AtomicUsize::new(0),
            seen_accounts: Mutex::new(Vec::new()),
        }
    }

    /// Creates a mock task that always fails.
    #[must_use]
    pub fn failing(name: impl Into<String>) -> Self {
        let task = Self::new(name);
        task.set_outcome(Err(TaskError::failed("mock failure")));
        task
    }

    /// Sets the outcome to return.
    pub fn set_outcome(&self, outcome: Result<bool, TaskError>) {
        *self.outcome.lock() = outcome;
    }

    /// Returns the number of times the task was invoked.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Returns the account indexes from each invocation, in call order.
    #[must_use]
    pub fn seen_accounts(&self) -> Vec<usize> {
        self.seen_accounts.lock().clone()
    }
}

#[async_trait]
impl Task for MockTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &TaskContext, account: &Account) -> Result<bool, TaskError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.seen_accounts.lock().push(account.index);
        self.outcome.lock().clone()
    }
}

/// A task that fails a fixed number of times before confirming success.
#[derive(Debug)]
pub struct FlakyTask {
    name: String,
    failures: usize,
    call_count: AtomicUsize,
}

impl FlakyTask {
    /// Creates a task that fails the first `failures` invocations.
    #[must_use]
    pub fn new(name: impl Into<String>, failures: usize) -> Self {
        Self {
            name: name.into(),
            failures,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Returns the number of times the task was invoked.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Task for FlakyTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &TaskContext, _account: &Account) -> Result<bool, TaskError> {
        let call = self.call_count.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(TaskError::failed(format!("flaky failure {}", call + 1)))
        } else {
            Ok(true)
        }
    }
}

/// A task that measures how many pipelines run it simultaneously.
///
/// Holds each invocation open for a short duration so overlap is observable,
/// and records the peak.
#[derive(Debug)]
pub struct GateProbeTask {
    name: String,
    hold: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl GateProbeTask {
    /// Creates a probe that holds each call open for `hold`.
    #[must_use]
    pub fn new(name: impl Into<String>, hold: Duration) -> Self {
        Self {
            name: name.into(),
            hold,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Returns the peak number of simultaneous invocations observed.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Task for GateProbeTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &TaskContext, _account: &Account) -> Result<bool, TaskError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);

        tokio::time::sleep(self.hold).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(true)
    }
}

/// A task that panics, for failure-isolation tests.
#[derive(Debug)]
pub struct PanickingTask {
    name: String,
}

impl PanickingTask {
    /// Creates a new panicking task.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Task for PanickingTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &TaskContext, _account: &Account) -> Result<bool, TaskError> {
        panic!("Intentional panic from {}", self.name);
    }
}

/// A notifier that records every update it receives.
#[derive(Debug, Default)]
pub struct CountingNotifier {
    calls: AtomicUsize,
    last: Mutex<Option<(usize, usize)>>,
}

impl CountingNotifier {
    /// Creates a new counting notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of notifications received.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the most recent `(done, total)` pair.
    #[must_use]
    pub fn last(&self) -> Option<(usize, usize)> {
        *self.last.lock()
    }
}

impl ProgressNotifier for CountingNotifier {
    fn notify(&self, done: usize, total: usize) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock() = Some((done, total));
    }
}
