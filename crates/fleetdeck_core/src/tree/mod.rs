//! Generic hierarchical tree engine.
//!
//! # Responsibility
//! - Turn flat parent-pointer records into an ordered, depth-annotated
//!   sequence suitable for display and keyboard navigation.
//! - Derive tri-state check display from an explicit checked set.
//!
//! # Invariants
//! - Outputs are pure recomputations from one snapshot; nothing is mutated
//!   in place.
//! - Siblings order by case-insensitive label, ties by declaration order.
//! - Parent-pointer cycles fail fast with `TreeError::CycleDetected`.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod filter;
pub mod flatten;
pub mod index;
pub mod navigator;
pub mod selection;
pub mod snapshot;
pub mod sources;

pub use filter::retain_matching;
pub use flatten::{flatten, FlatNode};
pub use index::{ParentKey, TreeIndex, TreeNode};
pub use navigator::{KeyboardNavigator, NavKey};
pub use selection::{check_states, classify, descendants_of, CheckState, CheckedSet};
pub use snapshot::TreeSnapshot;
pub use sources::TreeKey;

/// Structural integrity failures in a tree snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The ancestor chain of `node_id` loops back on itself.
    CycleDetected { node_id: String },
    /// A search query could not be compiled.
    InvalidFilter(String),
}

impl Display for TreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CycleDetected { node_id } => {
                write!(f, "tree parent chain forms a cycle at node `{node_id}`")
            }
            Self::InvalidFilter(message) => write!(f, "invalid tree filter: {message}"),
        }
    }
}

impl Error for TreeError {}
