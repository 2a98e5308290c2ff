//! Plan compilation: resolving spec randomness into a concrete ordered plan.
//!
//! All randomness is spent here, once per run. Pick-one groups are resolved
//! to a single branch and shuffle-all groups are permuted before the first
//! account launches, so every pipeline sees the identical plan.

use super::{ExecutionPlan, PlanStep, TaskSpecNode};
use rand::seq::SliceRandom;
use rand::Rng;

/// Compiles a task spec into an execution plan.
///
/// Walks the spec top to bottom: literals append a step, `one_of` groups
/// select one child uniformly via `rng` and recurse into it, and
/// `all_shuffled` groups permute their children (Fisher-Yates) and recurse
/// into each in shuffled order. Step indexes are 1-based and sequential.
///
/// An empty spec compiles to an empty plan. A fixed-seed rng reproduces an
/// identical plan.
pub fn compile<R: Rng + ?Sized>(spec: &[TaskSpecNode], rng: &mut R) -> ExecutionPlan {
    let mut steps = Vec::new();
    for node in spec {
        compile_node(node, rng, &mut steps);
    }
    ExecutionPlan::from_steps(steps)
}

fn compile_node<R: Rng + ?Sized>(
    node: &TaskSpecNode,
    rng: &mut R,
    steps: &mut Vec<PlanStep>,
) {
    match node {
        TaskSpecNode::Literal(name) => {
            steps.push(PlanStep {
                index: steps.len() + 1,
                name: name.clone(),
            });
        }
        TaskSpecNode::OneOf { one_of } => {
            if let Some(choice) = one_of.choose(rng) {
                compile_node(choice, rng, steps);
            }
        }
        TaskSpecNode::AllShuffled { all_shuffled } => {
            let mut order: Vec<&TaskSpecNode> = all_shuffled.iter().collect();
            order.shuffle(rng);
            for child in order {
                compile_node(child, rng, steps);
            }
        }
    }
}
