//! Error types for the flockrun engine.
//!
//! The taxonomy keeps three failure classes apart: retryable task failures
//! ([`TaskError`]), store persistence failures ([`StoreError`]), and
//! engine-level failures ([`EngineError`]). Task failures are expected and
//! handled inside the retry loop; they never abort sibling accounts.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A plan step references a task name with no registered implementation.
    #[error("Unknown task '{name}': no implementation registered under that name")]
    UnknownTask {
        /// The unresolved task name.
        name: String,
    },

    /// The run configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A shared store operation failed.
    #[error("{0}")]
    Store(#[from] StoreError),
}

/// A single task invocation failure.
///
/// Every variant is retryable from the engine's point of view; the retry
/// policy decides when to stop rescheduling.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// The task reported a failure.
    #[error("Task failed: {0}")]
    Failed(String),

    /// The task completed without error but did not confirm success.
    #[error("Task did not confirm success")]
    Unconfirmed,

    /// The task hit its own deadline.
    #[error("Task timed out")]
    Timeout,

    /// The task observed cancellation and stopped early.
    #[error("Task cancelled")]
    Cancelled,
}

impl TaskError {
    /// Creates a failure from any displayable error.
    #[must_use]
    pub fn failed(err: impl std::fmt::Display) -> Self {
        Self::Failed(err.to_string())
    }
}

// Task implementors typically bubble opaque integration errors up with `?`.
impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        Self::Failed(format!("{err:#}"))
    }
}

/// Shared store persistence errors.
///
/// Read-side problems (missing or corrupt backing file) are *not* errors;
/// they degrade to an empty store. Only write-side problems surface here.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store contents could not be serialized.
    #[error("Store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The backing file could not be written.
    #[error("Failed to persist store to {path}: {source}")]
    Persist {
        /// The backing file path.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_task_message() {
        let err = EngineError::UnknownTask {
            name: "faucet".to_string(),
        };
        assert!(err.to_string().contains("faucet"));
        assert!(err.to_string().contains("no implementation"));
    }

    #[test]
    fn test_task_error_failed_helper() {
        let err = TaskError::failed("connection reset");
        assert_eq!(err.to_string(), "Task failed: connection reset");
    }

    #[test]
    fn test_task_error_from_anyhow_keeps_chain() {
        let source = anyhow::anyhow!("rpc timeout").context("fetching nonce");
        let err: TaskError = source.into();
        let message = err.to_string();
        assert!(message.contains("fetching nonce"));
        assert!(message.contains("rpc timeout"));
    }

    #[test]
    fn test_store_error_wraps_into_engine_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let store_err = StoreError::Persist {
            path: PathBuf::from("/tmp/state.json"),
            source: io,
        };
        let engine_err: EngineError = store_err.into();
        assert!(matches!(engine_err, EngineError::Store(_)));
        assert!(engine_err.to_string().contains("/tmp/state.json"));
    }
}
