//! Children-by-parent index over flat tree records.

use std::collections::HashMap;

/// One flat hierarchy record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreeNode {
    pub id: String,
    /// Unresolvable parents make the node a root.
    pub parent_id: Option<String>,
    pub label: String,
}

impl TreeNode {
    pub fn new(id: impl Into<String>, parent_id: Option<&str>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.map(str::to_string),
            label: label.into(),
        }
    }
}

/// Bucket key: the root sentinel or a resolved parent id.
///
/// `Root` cannot collide with any node id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParentKey {
    Root,
    Node(String),
}

/// Immutable children-by-parent index of one snapshot.
#[derive(Debug, Clone, Default)]
pub struct TreeIndex {
    nodes: Vec<TreeNode>,
    positions: HashMap<String, usize>,
    children: HashMap<ParentKey, Vec<usize>>,
}

impl TreeIndex {
    /// Builds the index. Never fails; empty input yields an empty index.
    ///
    /// Ids are expected to be unique; a later duplicate shadows earlier ones
    /// for id lookups.
    pub fn build(nodes: Vec<TreeNode>) -> Self {
        let positions: HashMap<String, usize> = nodes
            .iter()
            .enumerate()
            .map(|(position, node)| (node.id.clone(), position))
            .collect();

        let mut children: HashMap<ParentKey, Vec<usize>> = HashMap::new();
        for (position, node) in nodes.iter().enumerate() {
            let key = match node.parent_id.as_deref() {
                Some(parent) if positions.contains_key(parent) => {
                    ParentKey::Node(parent.to_string())
                }
                _ => ParentKey::Root,
            };
            children.entry(key).or_default().push(position);
        }

        for bucket in children.values_mut() {
            // Stable: equal labels keep declaration order.
            bucket.sort_by_cached_key(|&position| nodes[position].label.to_lowercase());
        }

        Self {
            nodes,
            positions,
            children,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All records in declaration order.
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn get(&self, id: &str) -> Option<&TreeNode> {
        self.positions.get(id).map(|&position| &self.nodes[position])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Ordered bucket for one key.
    pub fn bucket(&self, key: &ParentKey) -> impl Iterator<Item = &TreeNode> + '_ {
        self.positions_in(key)
            .iter()
            .map(move |&position| &self.nodes[position])
    }

    /// Ordered root nodes.
    pub fn roots(&self) -> impl Iterator<Item = &TreeNode> + '_ {
        self.bucket(&ParentKey::Root)
    }

    /// Ordered direct children of `id`.
    pub fn children_of(&self, id: &str) -> impl Iterator<Item = &TreeNode> + '_ {
        self.bucket(&ParentKey::Node(id.to_string()))
    }

    pub fn has_children(&self, id: &str) -> bool {
        !self.positions_in(&ParentKey::Node(id.to_string())).is_empty()
    }

    pub(crate) fn positions_in(&self, key: &ParentKey) -> &[usize] {
        self.children.get(key).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn node_at(&self, position: usize) -> &TreeNode {
        &self.nodes[position]
    }

    /// Resolved parent position of the node at `position`.
    pub(crate) fn parent_position(&self, position: usize) -> Option<usize> {
        let parent = self.nodes[position].parent_id.as_deref()?;
        self.positions.get(parent).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::{ParentKey, TreeIndex, TreeNode};

    fn labels<'a>(nodes: impl Iterator<Item = &'a TreeNode>) -> Vec<&'a str> {
        nodes.map(|node| node.label.as_str()).collect()
    }

    #[test]
    fn empty_input_builds_empty_index() {
        let index = TreeIndex::build(Vec::new());
        assert!(index.is_empty());
        assert_eq!(index.roots().count(), 0);
    }

    #[test]
    fn siblings_order_case_insensitively_with_stable_ties() {
        let index = TreeIndex::build(vec![
            TreeNode::new("1", None, "beta"),
            TreeNode::new("2", None, "Alpha"),
            TreeNode::new("3", None, "alpha"),
            TreeNode::new("4", None, "Gamma"),
        ]);
        assert_eq!(labels(index.roots()), vec!["Alpha", "alpha", "beta", "Gamma"]);
        let ids: Vec<&str> = index.roots().map(|node| node.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3", "1", "4"]);
    }

    #[test]
    fn unresolved_parent_becomes_root() {
        let index = TreeIndex::build(vec![
            TreeNode::new("a", None, "A"),
            TreeNode::new("b", Some("missing"), "B"),
            TreeNode::new("c", Some("a"), "C"),
        ]);
        assert_eq!(labels(index.roots()), vec!["A", "B"]);
        assert_eq!(labels(index.children_of("a")), vec!["C"]);
        assert!(index.has_children("a"));
        assert!(!index.has_children("b"));
    }

    #[test]
    fn root_sentinel_is_distinct_from_literal_ids() {
        let index = TreeIndex::build(vec![
            TreeNode::new("root", None, "Literal root id"),
            TreeNode::new("child", Some("root"), "Child"),
        ]);
        assert_eq!(index.bucket(&ParentKey::Root).count(), 1);
        assert_eq!(
            index.bucket(&ParentKey::Node("root".to_string())).count(),
            1
        );
    }
}
