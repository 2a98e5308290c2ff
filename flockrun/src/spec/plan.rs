//! Execution plans: the concrete ordered output of plan compilation.

use crate::errors::EngineError;
use crate::tasks::TaskRegistry;
use serde::{Deserialize, Serialize};

/// A single resolved step of an execution plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// 1-based sequential step index, assigned at compile time.
    pub index: usize,
    /// The task name to invoke.
    pub name: String,
}

/// An ordered sequence of plan steps, immutable once compiled.
///
/// Every account pipeline in a run consumes the same plan sequentially.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    steps: Vec<PlanStep>,
}

impl ExecutionPlan {
    /// Builds a plan from already-indexed steps.
    pub(crate) fn from_steps(steps: Vec<PlanStep>) -> Self {
        debug_assert!(steps.iter().enumerate().all(|(i, s)| s.index == i + 1));
        Self { steps }
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the plan has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Iterates over the steps in execution order.
    pub fn iter(&self) -> std::slice::Iter<'_, PlanStep> {
        self.steps.iter()
    }

    /// Returns the task names in execution order.
    #[must_use]
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Checks that every step name has a registered task.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownTask`] for the first unresolved name.
    pub fn validate_against(&self, registry: &TaskRegistry) -> Result<(), EngineError> {
        for step in &self.steps {
            if !registry.contains(&step.name) {
                return Err(EngineError::UnknownTask {
                    name: step.name.clone(),
                });
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ExecutionPlan {
    type Item = &'a PlanStep;
    type IntoIter = std::slice::Iter<'a, PlanStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{FnTask, TaskRegistry};
    use std::sync::Arc;

    fn plan_of(names: &[&str]) -> ExecutionPlan {
        ExecutionPlan::from_steps(
            names
                .iter()
                .enumerate()
                .map(|(i, name)| PlanStep {
                    index: i + 1,
                    name: (*name).to_string(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_empty_plan() {
        let plan = ExecutionPlan::default();
        assert!(plan.is_empty());
        assert_eq!(plan.len(), 0);
    }

    #[test]
    fn test_step_names_in_order() {
        let plan = plan_of(&["faucet", "swap", "stake"]);
        assert_eq!(plan.step_names(), vec!["faucet", "swap", "stake"]);
    }

    #[test]
    fn test_validate_against_registry() {
        let registry = TaskRegistry::new();
        registry.register(Arc::new(FnTask::new("faucet", |_ctx, _account| async {
            Ok(true)
        })));

        let ok_plan = plan_of(&["faucet"]);
        assert!(ok_plan.validate_against(&registry).is_ok());

        let bad_plan = plan_of(&["faucet", "bridge"]);
        let err = bad_plan.validate_against(&registry).unwrap_err();
        assert!(err.to_string().contains("bridge"));
    }
}
