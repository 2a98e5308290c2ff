//! Task spec tree nodes.

use serde::{Deserialize, Serialize};

/// One node in a declarative task specification.
///
/// The JSON surface uses three shapes: a bare string is a [`Literal`],
/// `{"one_of": [...]}` keeps exactly one child chosen at random, and
/// `{"all_shuffled": [...]}` keeps all children in a random order.
/// Nesting is usually one level deep in practice, but the compiler supports
/// arbitrary depth.
///
/// [`Literal`]: TaskSpecNode::Literal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskSpecNode {
    /// A single named task.
    Literal(String),
    /// Exactly one child is selected uniformly at random at compile time.
    OneOf {
        /// The candidate children.
        one_of: Vec<TaskSpecNode>,
    },
    /// All children are kept; their order is permuted at compile time.
    AllShuffled {
        /// The children to shuffle.
        all_shuffled: Vec<TaskSpecNode>,
    },
}

impl TaskSpecNode {
    /// Creates a literal node.
    #[must_use]
    pub fn literal(name: impl Into<String>) -> Self {
        Self::Literal(name.into())
    }

    /// Creates a pick-one group.
    #[must_use]
    pub fn one_of(options: impl IntoIterator<Item = Self>) -> Self {
        Self::OneOf {
            one_of: options.into_iter().collect(),
        }
    }

    /// Creates a shuffle-all group.
    #[must_use]
    pub fn all_shuffled(items: impl IntoIterator<Item = Self>) -> Self {
        Self::AllShuffled {
            all_shuffled: items.into_iter().collect(),
        }
    }

    /// Returns the (min, max) number of literal steps this node can compile to.
    ///
    /// The bounds differ only when `OneOf` groups contain options of unequal
    /// size. An empty `OneOf` contributes nothing.
    #[must_use]
    pub fn leaf_count_bounds(&self) -> (usize, usize) {
        match self {
            Self::Literal(_) => (1, 1),
            Self::OneOf { one_of } => one_of
                .iter()
                .map(Self::leaf_count_bounds)
                .reduce(|(amin, amax), (bmin, bmax)| (amin.min(bmin), amax.max(bmax)))
                .unwrap_or((0, 0)),
            Self::AllShuffled { all_shuffled } => all_shuffled
                .iter()
                .map(Self::leaf_count_bounds)
                .fold((0, 0), |(amin, amax), (bmin, bmax)| {
                    (amin + bmin, amax + bmax)
                }),
        }
    }
}

impl From<&str> for TaskSpecNode {
    fn from(name: &str) -> Self {
        Self::Literal(name.to_string())
    }
}
