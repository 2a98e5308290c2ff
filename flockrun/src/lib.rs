//! # Flockrun
//!
//! A concurrent run engine for account automation.
//!
//! Flockrun turns a declarative task specification into a concrete ordered
//! plan and executes that plan for a pool of accounts:
//!
//! - **Plan compilation**: fixed items, "pick one at random" groups, and
//!   "shuffle and run all" groups are resolved once per run into an
//!   immutable [`spec::ExecutionPlan`]
//! - **Bounded concurrency**: a semaphore gate limits how many account
//!   pipelines run at the same time
//! - **Retry with pacing**: every step runs through a shared
//!   [`retry::RetryPolicy`] with randomized inter-attempt pauses
//! - **Shared durable state**: a mutex-guarded, file-backed
//!   [`store::SharedStore`] shared by all pipelines
//! - **Progress reporting**: an atomic [`progress::ProgressTracker`] with a
//!   pluggable notifier side-channel
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flockrun::prelude::*;
//!
//! let registry = TaskRegistry::new();
//! registry.register(Arc::new(FnTask::new("faucet", |_ctx, _account| async { Ok(true) })));
//!
//! let spec = vec![
//!     TaskSpecNode::literal("faucet"),
//!     TaskSpecNode::one_of([TaskSpecNode::literal("swap_a"), TaskSpecNode::literal("swap_b")]),
//! ];
//! let plan = compile(&spec, &mut rand::thread_rng());
//!
//! let scheduler = Scheduler::new(RunConfig::default(), registry, store, tracker);
//! let report = scheduler.run(accounts, plan).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod account;
pub mod cancellation;
pub mod config;
pub mod errors;
pub mod observability;
pub mod progress;
pub mod retry;
pub mod scheduler;
pub mod spec;
pub mod store;
pub mod tasks;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::account::Account;
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{PauseRange, RetryConfig, RunConfig};
    pub use crate::errors::{EngineError, StoreError, TaskError};
    pub use crate::progress::{
        LoggingNotifier, NoOpNotifier, ProgressGuard, ProgressNotifier, ProgressTracker,
    };
    pub use crate::retry::RetryPolicy;
    pub use crate::scheduler::{AccountReport, RunReport, Scheduler, StepOutcome};
    pub use crate::spec::{compile, ExecutionPlan, PlanStep, TaskSpecNode};
    pub use crate::store::SharedStore;
    pub use crate::tasks::{FnTask, Task, TaskContext, TaskRegistry};
}

#[cfg(test)]
mod tests {
    #[test]
    fn library_compiles() {
        assert!(true);
    }
}
