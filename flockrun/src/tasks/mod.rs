//! Task collaborator trait and registry.
//!
//! Tasks are the opaque units of work the engine invokes by name: HTTP API
//! clients, RPC clients, browser drivers. The engine knows nothing about
//! what a task does; it only sees a name and a confirmed/unconfirmed
//! outcome.

use crate::account::Account;
use crate::cancellation::CancellationToken;
use crate::errors::TaskError;
use crate::store::SharedStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Per-run context handed to every task invocation.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// The run this invocation belongs to.
    pub run_id: Uuid,
    /// Shared cancellation token; long tasks should poll it.
    pub cancel: Arc<CancellationToken>,
    /// Durable cross-run state, keyed by account address.
    pub store: Arc<SharedStore>,
}

impl TaskContext {
    /// Creates a new task context.
    #[must_use]
    pub fn new(run_id: Uuid, cancel: Arc<CancellationToken>, store: Arc<SharedStore>) -> Self {
        Self {
            run_id,
            cancel,
            store,
        }
    }
}

/// Trait for task implementations.
///
/// `Ok(true)` is a confirmed success. `Ok(false)` and `Err(_)` are both
/// retryable failures from the engine's point of view; the distinction only
/// affects the recorded error message.
#[async_trait]
pub trait Task: Send + Sync {
    /// Returns the task's registered name.
    fn name(&self) -> &str;

    /// Executes the task for one account.
    async fn run(&self, ctx: &TaskContext, account: &Account) -> Result<bool, TaskError>;
}

/// A closure-backed task.
pub struct FnTask<F> {
    name: String,
    func: F,
}

impl<F, Fut> FnTask<F>
where
    F: Fn(TaskContext, Account) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, TaskError>> + Send,
{
    /// Creates a new closure-backed task.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnTask<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTask").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F, Fut> Task for FnTask<F>
where
    F: Fn(TaskContext, Account) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, TaskError>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &TaskContext, account: &Account) -> Result<bool, TaskError> {
        (self.func)(ctx.clone(), account.clone()).await
    }
}

/// Registry mapping task names to implementations.
///
/// Populated once at startup; the engine resolves plan steps through it and
/// fails fast on unknown names instead of silently skipping.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Arc<dyn Task>>>,
}

impl TaskRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task under its own name.
    ///
    /// Re-registering a name replaces the previous implementation.
    pub fn register(&self, task: Arc<dyn Task>) {
        let name = task.name().to_string();
        if self.tasks.write().insert(name.clone(), task).is_some() {
            warn!(task = %name, "Task re-registered, replacing previous implementation");
        }
    }

    /// Looks up a task by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Task>> {
        self.tasks.read().get(name).cloned()
    }

    /// Returns true if a task is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tasks.read().contains_key(name)
    }

    /// Returns all registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tasks.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the number of registered tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    /// Returns true if no tasks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }
}

impl Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> TaskContext {
        let dir = std::env::temp_dir().join("flockrun-tasks-test.json");
        TaskContext::new(
            Uuid::new_v4(),
            Arc::new(CancellationToken::new()),
            Arc::new(SharedStore::new(dir)),
        )
    }

    #[tokio::test]
    async fn test_fn_task_runs_closure() {
        let task = FnTask::new("echo", |_ctx, account: Account| async move {
            Ok(account.index % 2 == 0)
        });

        let even = Account::new(2, "0x2", "k");
        let odd = Account::new(3, "0x3", "k");

        assert!(task.run(&ctx(), &even).await.unwrap());
        assert!(!task.run(&ctx(), &odd).await.unwrap());
    }

    #[test]
    fn test_registry_register_and_get() {
        let registry = TaskRegistry::new();
        assert!(registry.is_empty());

        registry.register(Arc::new(FnTask::new("faucet", |_ctx, _account| async {
            Ok(true)
        })));

        assert!(registry.contains("faucet"));
        assert!(registry.get("faucet").is_some());
        assert!(registry.get("bridge").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_names_sorted() {
        let registry = TaskRegistry::new();
        for name in ["swap", "faucet", "stake"] {
            registry.register(Arc::new(FnTask::new(name, |_ctx, _account| async {
                Ok(true)
            })));
        }
        assert_eq!(registry.names(), vec!["faucet", "stake", "swap"]);
    }

    #[test]
    fn test_registry_replacement() {
        let registry = TaskRegistry::new();
        registry.register(Arc::new(FnTask::new("faucet", |_ctx, _account| async {
            Ok(false)
        })));
        registry.register(Arc::new(FnTask::new("faucet", |_ctx, _account| async {
            Ok(true)
        })));
        assert_eq!(registry.len(), 1);
    }
}
