//! One immutable tree snapshot: index plus flattened rows.

use super::filter::retain_matching;
use super::flatten::{flatten, FlatNode};
use super::index::{TreeIndex, TreeNode};
use super::selection::{check_states, descendants_of, CheckState, CheckedSet};
use super::TreeError;
use std::collections::HashSet;

/// Display-ready tree built from one fetched record set.
#[derive(Debug, Clone)]
pub struct TreeSnapshot {
    index: TreeIndex,
    rows: Vec<FlatNode>,
}

impl TreeSnapshot {
    /// Indexes and flattens `nodes`.
    pub fn build(nodes: Vec<TreeNode>) -> Result<Self, TreeError> {
        let index = TreeIndex::build(nodes);
        let rows = flatten(&index)?;
        Ok(Self { index, rows })
    }

    /// Snapshot restricted to nodes matching `query` and their ancestors.
    pub fn filtered(&self, query: &str) -> Result<Self, TreeError> {
        Self::build(retain_matching(self.index.nodes(), query)?)
    }

    pub fn index(&self) -> &TreeIndex {
        &self.index
    }

    pub fn rows(&self) -> &[FlatNode] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.rows.iter().position(|row| row.id == id)
    }

    /// Tri-state display for each row.
    pub fn check_states(&self, checked: &CheckedSet) -> Vec<CheckState> {
        check_states(&self.rows, checked)
    }

    pub fn descendants_of(&self, id: &str) -> Result<HashSet<String>, TreeError> {
        descendants_of(&self.index, id)
    }
}
