//! Tri-state check display derived from an explicit checked set.
//!
//! Toggling never cascades: only the display state is derived, the stored
//! selection holds exactly the ids the user toggled.

use super::flatten::FlatNode;
use super::index::TreeIndex;
use super::TreeError;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Checkbox display state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckState {
    Checked,
    Unchecked,
    Indeterminate,
}

/// Ids explicitly checked by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckedSet {
    ids: BTreeSet<String>,
}

impl CheckedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips membership of `id` alone. Returns whether it is now checked.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.to_string());
            true
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.ids.iter().map(String::as_str)
    }

    /// Drops ids that no longer exist in the latest snapshot.
    pub fn retain_present(&mut self, index: &TreeIndex) {
        self.ids.retain(|id| index.contains(id));
    }
}

impl<S: Into<String>> FromIterator<S> for CheckedSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// All ids reachable below `node_id`, excluding `node_id` itself.
///
/// Unknown ids have no descendants.
///
/// # Errors
/// - `TreeError::CycleDetected` when expansion revisits a node.
pub fn descendants_of(index: &TreeIndex, node_id: &str) -> Result<HashSet<String>, TreeError> {
    let mut found = HashSet::new();
    let mut stack = vec![node_id.to_string()];
    while let Some(current) = stack.pop() {
        for child in index.children_of(&current) {
            if child.id == node_id || !found.insert(child.id.clone()) {
                return Err(TreeError::CycleDetected {
                    node_id: child.id.clone(),
                });
            }
            stack.push(child.id.clone());
        }
    }
    Ok(found)
}

/// Display state of `node_id` given its descendant set.
pub fn classify(
    node_id: &str,
    explicitly_checked: &CheckedSet,
    descendants: &HashSet<String>,
) -> CheckState {
    let checked_descendants = descendants
        .iter()
        .filter(|id| explicitly_checked.contains(id))
        .count();
    state_from_counts(
        explicitly_checked.contains(node_id),
        descendants.len(),
        checked_descendants,
    )
}

/// Display state for every row of a flattened snapshot, in row order.
///
/// Computed bottom-up in one pass; equivalent to calling [`classify`] with
/// [`descendants_of`] for each row.
pub fn check_states(rows: &[FlatNode], explicitly_checked: &CheckedSet) -> Vec<CheckState> {
    let row_of: HashMap<&str, usize> = rows
        .iter()
        .enumerate()
        .map(|(row, node)| (node.id.as_str(), row))
        .collect();

    // (descendant count, checked descendant count) per row.
    let mut counts = vec![(0usize, 0usize); rows.len()];
    for (row, node) in rows.iter().enumerate().rev() {
        let Some(parent_row) = node
            .parent_id
            .as_deref()
            .and_then(|parent| row_of.get(parent).copied())
        else {
            continue;
        };
        let (total, checked) = counts[row];
        let self_checked = usize::from(explicitly_checked.contains(&node.id));
        counts[parent_row].0 += total + 1;
        counts[parent_row].1 += checked + self_checked;
    }

    rows.iter()
        .zip(counts)
        .map(|(node, (total, checked))| {
            state_from_counts(explicitly_checked.contains(&node.id), total, checked)
        })
        .collect()
}

fn state_from_counts(self_checked: bool, descendants: usize, checked: usize) -> CheckState {
    if self_checked || (descendants > 0 && checked == descendants) {
        CheckState::Checked
    } else if checked > 0 {
        CheckState::Indeterminate
    } else {
        CheckState::Unchecked
    }
}
