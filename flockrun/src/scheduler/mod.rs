//! Run scheduling: the bounded worker pool that drives account pipelines.
//!
//! This module provides:
//! - The scheduler with its concurrency gate and join semantics
//! - Per-account pipelines and their reports
//! - The final run report

mod pipeline;


pub use pipeline::{AccountReport, StepOutcome};

use crate::account::Account;
use crate::cancellation::CancellationToken;
use crate::config::RunConfig;
use crate::errors::EngineError;
use crate::progress::{ProgressGuard, ProgressNotifier, ProgressTracker};
use crate::retry::RetryPolicy;
use crate::spec::ExecutionPlan;
use crate::store::SharedStore;
use crate::tasks::{Task, TaskContext, TaskRegistry};
use chrono::{DateTime, Utc};
use pipeline::AccountPipeline;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info};
use uuid::Uuid;

/// Summary of one completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run ID.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the last pipeline finished.
    pub finished_at: DateTime<Utc>,
    /// Per-account reports, in completion-collection order.
    pub accounts: Vec<AccountReport>,
    /// Whether the run was cancelled.
    pub cancelled: bool,
    /// Final progress counts `(done, total)`.
    pub progress: (usize, usize),
}

impl RunReport {
    /// Returns the number of accounts with no failures.
    #[must_use]
    pub fn completed_clean(&self) -> usize {
        self.accounts.iter().filter(|a| a.ok()).count()
    }

    /// Returns the number of accounts with at least one failure.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.accounts.len() - self.completed_clean()
    }

    /// Renders the one-line human summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let (done, total) = self.progress;
        format!(
            "Run {}: {done} of {total} accounts finished ({} clean, {} with failures)",
            self.run_id,
            self.completed_clean(),
            self.failed()
        )
    }
}

/// Owns the concurrency gate and launches one pipeline per account.
///
/// Built once from explicit dependencies; no global state. The same
/// scheduler can drive multiple runs sequentially.
pub struct Scheduler {
    config: RunConfig,
    registry: Arc<TaskRegistry>,
    store: Arc<SharedStore>,
    cancel: Arc<CancellationToken>,
    notifiers: Vec<Arc<dyn ProgressNotifier>>,
    setup: Option<Arc<dyn Task>>,
}

impl Scheduler {
    /// Creates a scheduler from explicit dependencies.
    #[must_use]
    pub fn new(config: RunConfig, registry: Arc<TaskRegistry>, store: Arc<SharedStore>) -> Self {
        Self {
            config,
            registry,
            store,
            cancel: Arc::new(CancellationToken::new()),
            notifiers: Vec::new(),
            setup: None,
        }
    }

    /// Attaches a progress notifier to every run.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn ProgressNotifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    /// Sets an account-level setup task run once per account before its steps.
    #[must_use]
    pub fn with_setup(mut self, setup: Arc<dyn Task>) -> Self {
        self.setup = Some(setup);
        self
    }

    /// Returns the shared cancellation token, for wiring to SIGINT or a
    /// deadline.
    #[must_use]
    pub fn cancel_token(&self) -> Arc<CancellationToken> {
        self.cancel.clone()
    }

    /// Runs the plan for every account and waits for all pipelines.
    ///
    /// Fails fast before launching anything when the configuration is
    /// invalid or the plan names an unregistered task. After launch, one
    /// account's failure or panic never cancels its siblings; the method
    /// returns only when every dispatched pipeline has completed.
    pub async fn run(
        &self,
        accounts: &[Account],
        plan: ExecutionPlan,
    ) -> Result<RunReport, EngineError> {
        self.config.validate()?;
        plan.validate_against(&self.registry)?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let plan = Arc::new(plan);

        let tracker = Arc::new(ProgressTracker::new(accounts.len()));
        for notifier in &self.notifiers {
            tracker.add_notifier(notifier.clone());
        }

        info!(
            %run_id,
            accounts = accounts.len(),
            steps = plan.len(),
            concurrency = self.config.concurrency,
            "Run started"
        );

        // Launch order is shuffled independently of the plan's own shuffles;
        // it affects dispatch only, not execution overlap.
        let mut order: Vec<&Account> = accounts.iter().collect();
        if self.config.shuffle_accounts {
            order.shuffle(&mut rand::thread_rng());
        }

        let gate = Arc::new(Semaphore::new(self.config.concurrency));
        let mut handles = Vec::with_capacity(order.len());

        for account in order {
            // Acquire before launch so excess accounts queue here instead of
            // piling up as idle tasks.
            let Ok(permit) = gate.clone().acquire_owned().await else {
                // The gate is never closed; treat a closed gate as cancellation.
                break;
            };

            let pipeline = AccountPipeline {
                plan: plan.clone(),
                registry: self.registry.clone(),
                policy: RetryPolicy::new(self.config.retry),
                config: self.config.clone(),
                ctx: TaskContext::new(run_id, self.cancel.clone(), self.store.clone()),
                cancel: self.cancel.clone(),
                setup: self.setup.clone(),
            };
            let account = account.clone();
            let tracker = tracker.clone();

            handles.push((
                account.index,
                account.address.clone(),
                tokio::spawn(async move {
                    // Dropped on every exit path, panic included: releases
                    // the gate slot and counts this account exactly once.
                    let _permit = permit;
                    let _progress = ProgressGuard::new(tracker);

                    pipeline.run(&account).await
                }),
            ));
        }

        let joined = futures::future::join_all(handles.into_iter().map(
            |(index, address, handle)| async move { (index, address, handle.await) },
        ))
        .await;

        let mut reports = Vec::with_capacity(joined.len());
        for (index, address, result) in joined {
            match result {
                Ok(report) => reports.push(report),
                Err(join_err) => {
                    // Panic inside a pipeline: logged, recorded as a failed
                    // account, siblings unaffected.
                    error!(
                        account = index,
                        error = %join_err,
                        "Account pipeline panicked"
                    );
                    reports.push(pipeline::panicked_report(index, address));
                }
            }
        }

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            accounts: reports,
            cancelled: self.cancel.is_cancelled(),
            progress: tracker.snapshot(),
        };

        info!(%run_id, "{}", report.summary());
        Ok(report)
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
