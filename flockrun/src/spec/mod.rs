//! Task specification and plan compilation.
//!
//! This module provides:
//! - The declarative task spec tree (literals, pick-one and shuffle-all groups)
//! - The immutable execution plan produced once per run
//! - The compiler that resolves all randomness at compile time

mod compiler;
mod node;
mod plan;

pub use compiler::compile;
pub use node::TaskSpecNode;
pub use plan::{ExecutionPlan, PlanStep};
