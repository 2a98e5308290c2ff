//! Per-account pipeline: the lifecycle one account goes through in a run.
//!
//! `Init -> (per step: Running -> Succeeded|Failed) -> Paused -> Done`.
//! Step failures are recorded, never thrown; a pipeline always runs to the
//! end of its lifecycle and a run is "complete" even when every step failed.

use crate::account::Account;
use crate::cancellation::CancellationToken;
use crate::config::{PauseRange, RunConfig};
use crate::errors::TaskError;
use crate::retry::RetryPolicy;
use crate::spec::ExecutionPlan;
use crate::tasks::{Task, TaskContext, TaskRegistry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of one plan step for one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    /// The plan step index (1-based).
    pub index: usize,
    /// The task name.
    pub name: String,
    /// Whether the step ultimately succeeded.
    pub ok: bool,
    /// Attempts consumed (0 when the step was skipped by cancellation).
    pub attempts: usize,
    /// Final error message when the step failed.
    pub error: Option<String>,
}

/// Outcome of one account's full pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountReport {
    /// The account index.
    pub index: usize,
    /// The account address.
    pub address: String,
    /// Whether account-level setup succeeded (true when no setup is configured).
    pub setup_ok: bool,
    /// Per-step outcomes in plan order.
    pub steps: Vec<StepOutcome>,
    /// When the pipeline finished (ISO 8601).
    pub finished_at: DateTime<Utc>,
}

impl AccountReport {
    /// Returns true when setup and every step succeeded.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.setup_ok && self.steps.iter().all(|s| s.ok)
    }

    /// Returns the number of failed steps.
    #[must_use]
    pub fn failed_steps(&self) -> usize {
        self.steps.iter().filter(|s| !s.ok).count()
    }

    fn panicked(index: usize, address: String) -> Self {
        Self {
            index,
            address,
            setup_ok: false,
            steps: Vec::new(),
            finished_at: Utc::now(),
        }
    }
}

/// Builds the report for a pipeline whose task panicked before reporting.
pub(super) fn panicked_report(index: usize, address: String) -> AccountReport {
    AccountReport::panicked(index, address)
}

/// Per-account control flow: setup, paced steps through the retry policy,
/// and a trailing pause. Owns no shared state beyond the task context.
pub(super) struct AccountPipeline {
    pub(super) plan: Arc<ExecutionPlan>,
    pub(super) registry: Arc<TaskRegistry>,
    pub(super) policy: RetryPolicy,
    pub(super) config: RunConfig,
    pub(super) ctx: TaskContext,
    pub(super) cancel: Arc<CancellationToken>,
    pub(super) setup: Option<Arc<dyn Task>>,
}

impl AccountPipeline {
    /// Runs the full lifecycle for one account and reports the outcome.
    pub(super) async fn run(&self, account: &Account) -> AccountReport {
        let mut setup_ok = true;

        if let Some(setup) = &self.setup {
            let (ok, _attempts, error) = self.run_through_policy(setup.as_ref(), account).await;
            setup_ok = ok;
            if !ok {
                // Failed setup marks the account but never aborts the
                // remaining lifecycle stages.
                warn!(
                    account = account.index,
                    error = error.as_deref().unwrap_or("unknown"),
                    "Account setup failed, continuing lifecycle"
                );
            }
        }

        self.pause(self.config.account_pause).await;

        let mut steps = Vec::with_capacity(self.plan.len());
        let mut first = true;
        for step in self.plan.iter() {
            if self.cancel.is_cancelled() {
                steps.push(StepOutcome {
                    index: step.index,
                    name: step.name.clone(),
                    ok: false,
                    attempts: 0,
                    error: Some("cancelled before start".to_string()),
                });
                continue;
            }

            if !first {
                self.pause(self.config.step_pause).await;
            }
            first = false;

            let outcome = self.run_step(step.index, &step.name, account).await;
            if outcome.ok {
                info!(
                    account = account.index,
                    step = outcome.index,
                    task = %outcome.name,
                    attempts = outcome.attempts,
                    "Step succeeded"
                );
            } else {
                warn!(
                    account = account.index,
                    step = outcome.index,
                    task = %outcome.name,
                    attempts = outcome.attempts,
                    error = outcome.error.as_deref().unwrap_or("unknown"),
                    "Step failed, continuing with remaining steps"
                );
            }
            steps.push(outcome);
        }

        self.pause(self.config.account_pause).await;

        AccountReport {
            index: account.index,
            address: account.address.clone(),
            setup_ok,
            steps,
            finished_at: Utc::now(),
        }
    }

    async fn run_step(&self, index: usize, name: &str, account: &Account) -> StepOutcome {
        // The plan was validated before dispatch; a miss here means the
        // registry changed mid-run, which is still a step failure rather
        // than an engine abort.
        let Some(task) = self.registry.get(name) else {
            return StepOutcome {
                index,
                name: name.to_string(),
                ok: false,
                attempts: 0,
                error: Some(format!("unknown task '{name}'")),
            };
        };

        let (ok, attempts, error) = self.run_through_policy(task.as_ref(), account).await;
        StepOutcome {
            index,
            name: name.to_string(),
            ok,
            attempts,
            error,
        }
    }

    async fn run_through_policy(
        &self,
        task: &dyn Task,
        account: &Account,
    ) -> (bool, usize, Option<String>) {
        let attempts = AtomicUsize::new(0);
        let result = self
            .policy
            .run(&self.cancel, |attempt| {
                attempts.store(attempt, Ordering::SeqCst);
                async move {
                    match task.run(&self.ctx, account).await {
                        Ok(true) => Ok(()),
                        Ok(false) => Err(TaskError::Unconfirmed),
                        Err(err) => Err(err),
                    }
                }
            })
            .await;

        let attempts = attempts.load(Ordering::SeqCst);
        match result {
            Ok(()) => (true, attempts, None),
            Err(err) => (false, attempts, Some(err.to_string())),
        }
    }

    // Cancellation-aware randomized sleep. Sampling happens before the
    // await so the thread_rng handle never crosses it.
    async fn pause(&self, range: PauseRange) {
        if range.is_zero() || self.cancel.is_cancelled() {
            return;
        }
        let delay = range.sample(&mut rand::thread_rng());
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = self.cancel.cancelled() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::spec::{compile, TaskSpecNode};
    use crate::store::SharedStore;
    use crate::testing::{FlakyTask, MockTask};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn quiet_config() -> RunConfig {
        RunConfig::new()
            .with_retry(RetryConfig::new().with_attempts(3).with_pause(PauseRange::none()))
            .with_account_pause(PauseRange::none())
            .with_step_pause(PauseRange::none())
            .without_shuffle()
    }

    fn pipeline_with(
        dir: &TempDir,
        registry: Arc<TaskRegistry>,
        plan: ExecutionPlan,
        setup: Option<Arc<dyn Task>>,
    ) -> AccountPipeline {
        let config = quiet_config();
        let cancel = Arc::new(CancellationToken::new());
        AccountPipeline {
            plan: Arc::new(plan),
            registry,
            policy: RetryPolicy::new(config.retry),
            config,
            ctx: TaskContext::new(
                Uuid::new_v4(),
                cancel.clone(),
                Arc::new(SharedStore::new(dir.path().join("state.json"))),
            ),
            cancel,
            setup,
        }
    }

    fn plan_for(names: &[&str]) -> ExecutionPlan {
        let spec: Vec<TaskSpecNode> = names.iter().map(|n| TaskSpecNode::literal(*n)).collect();
        compile(&spec, &mut StdRng::seed_from_u64(0))
    }

    #[tokio::test]
    async fn test_all_steps_succeed() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(TaskRegistry::new());
        registry.register(Arc::new(MockTask::new("a")));
        registry.register(Arc::new(MockTask::new("b")));

        let pipeline = pipeline_with(&dir, registry, plan_for(&["a", "b"]), None);
        let report = pipeline.run(&Account::new(1, "0x1", "k")).await;

        assert!(report.ok());
        assert_eq!(report.steps.len(), 2);
        assert!(report.steps.iter().all(|s| s.attempts == 1));
    }

    #[tokio::test]
    async fn test_failed_step_does_not_short_circuit() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(TaskRegistry::new());
        let failing = Arc::new(MockTask::failing("bad"));
        let trailing = Arc::new(MockTask::new("after"));
        registry.register(failing.clone());
        registry.register(trailing.clone());

        let pipeline = pipeline_with(&dir, registry, plan_for(&["bad", "after"]), None);
        let report = pipeline.run(&Account::new(1, "0x1", "k")).await;

        assert!(!report.ok());
        assert_eq!(report.failed_steps(), 1);
        // Retries exhausted on the failing step.
        assert_eq!(failing.call_count(), 3);
        // The later step still ran.
        assert_eq!(trailing.call_count(), 1);
        assert!(report.steps[1].ok);
    }

    #[tokio::test]
    async fn test_flaky_step_recovers_within_attempts() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(TaskRegistry::new());
        registry.register(Arc::new(FlakyTask::new("flaky", 2)));

        let pipeline = pipeline_with(&dir, registry, plan_for(&["flaky"]), None);
        let report = pipeline.run(&Account::new(1, "0x1", "k")).await;

        assert!(report.ok());
        assert_eq!(report.steps[0].attempts, 3);
    }

    #[tokio::test]
    async fn test_setup_failure_marks_account_but_runs_steps() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(TaskRegistry::new());
        let step = Arc::new(MockTask::new("work"));
        registry.register(step.clone());

        let setup: Arc<dyn Task> = Arc::new(MockTask::failing("setup"));
        let pipeline = pipeline_with(&dir, registry, plan_for(&["work"]), Some(setup));
        let report = pipeline.run(&Account::new(1, "0x1", "k")).await;

        assert!(!report.setup_ok);
        assert!(!report.ok());
        // Steps still ran despite failed setup.
        assert_eq!(step.call_count(), 1);
        assert!(report.steps[0].ok);
    }

    #[tokio::test]
    async fn test_cancellation_skips_remaining_steps() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(TaskRegistry::new());
        registry.register(Arc::new(MockTask::new("a")));
        registry.register(Arc::new(MockTask::new("b")));

        let pipeline = pipeline_with(&dir, registry, plan_for(&["a", "b"]), None);
        pipeline.cancel.cancel("shutdown");

        let report = pipeline.run(&Account::new(1, "0x1", "k")).await;

        assert_eq!(report.steps.len(), 2);
        assert!(report.steps.iter().all(|s| !s.ok && s.attempts == 0));
    }

    #[tokio::test]
    async fn test_unknown_task_recorded_as_step_failure() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(TaskRegistry::new());

        let pipeline = pipeline_with(&dir, registry, plan_for(&["ghost"]), None);
        let report = pipeline.run(&Account::new(1, "0x1", "k")).await;

        assert!(!report.ok());
        assert!(report.steps[0]
            .error
            .as_deref()
            .unwrap()
            .contains("unknown task"));
    }

    #[tokio::test]
    async fn test_empty_plan_completes() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(TaskRegistry::new());
        let pipeline = pipeline_with(&dir, registry, ExecutionPlan::default(), None);

        let report = pipeline.run(&Account::new(1, "0x1", "k")).await;
        assert!(report.ok());
        assert!(report.steps.is_empty());
    }
}
