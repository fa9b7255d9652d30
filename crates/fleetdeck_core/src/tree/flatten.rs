//! Depth-first pre-order flattening of a [`TreeIndex`].

use super::index::{ParentKey, TreeIndex};
use super::TreeError;
use std::collections::HashSet;

/// A tree record annotated for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatNode {
    pub id: String,
    pub parent_id: Option<String>,
    pub label: String,
    /// Root = 0.
    pub depth: usize,
    pub has_children: bool,
}

/// Flattens every root bucket entry, pre-order, in index order.
///
/// # Errors
/// - `TreeError::CycleDetected` when some records are unreachable from any
///   root, which happens exactly when their ancestor chain loops.
pub fn flatten(index: &TreeIndex) -> Result<Vec<FlatNode>, TreeError> {
    let mut visited = vec![false; index.len()];
    let mut output = Vec::with_capacity(index.len());
    let mut stack: Vec<(usize, usize)> = index
        .positions_in(&ParentKey::Root)
        .iter()
        .rev()
        .map(|&position| (position, 0))
        .collect();

    while let Some((position, depth)) = stack.pop() {
        if std::mem::replace(&mut visited[position], true) {
            continue;
        }

        let node = index.node_at(position);
        let children = index.positions_in(&ParentKey::Node(node.id.clone()));
        output.push(FlatNode {
            id: node.id.clone(),
            parent_id: node.parent_id.clone(),
            label: node.label.clone(),
            depth,
            has_children: !children.is_empty(),
        });
        stack.extend(children.iter().rev().map(|&child| (child, depth + 1)));
    }

    if let Some(unreached) = visited.iter().position(|seen| !seen) {
        return Err(TreeError::CycleDetected {
            node_id: cycle_member(index, unreached),
        });
    }
    Ok(output)
}

/// Walks up from an unreachable record until the chain repeats.
fn cycle_member(index: &TreeIndex, start: usize) -> String {
    let mut seen = HashSet::new();
    let mut cursor = start;
    while seen.insert(cursor) {
        match index.parent_position(cursor) {
            Some(parent) => cursor = parent,
            None => break,
        }
    }
    index.node_at(cursor).id.clone()
}

#[cfg(test)]
mod tests {
    use super::flatten;
    use crate::tree::index::{TreeIndex, TreeNode};
    use crate::tree::TreeError;

    #[test]
    fn flattens_pre_order_with_depth() {
        let index = TreeIndex::build(vec![
            TreeNode::new("fleet", None, "Fleet"),
            TreeNode::new("med", Some("fleet"), "Mediterranean"),
            TreeNode::new("carib", Some("fleet"), "Caribbean"),
            TreeNode::new("aurora", Some("med"), "Aurora"),
            TreeNode::new("solo", None, "Independent"),
        ]);
        let flat = flatten(&index).expect("acyclic tree should flatten");
        let rows: Vec<(&str, usize)> = flat
            .iter()
            .map(|node| (node.id.as_str(), node.depth))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("fleet", 0),
                ("carib", 1),
                ("med", 1),
                ("aurora", 2),
                ("solo", 0),
            ]
        );
        assert!(flat[0].has_children);
        assert!(!flat[1].has_children);
    }

    #[test]
    fn depth_equals_ancestor_hops() {
        let mut nodes = vec![TreeNode::new("n0", None, "n0")];
        for level in 1..50 {
            let parent = format!("n{}", level - 1);
            nodes.push(TreeNode::new(
                format!("n{level}"),
                Some(parent.as_str()),
                format!("n{level}"),
            ));
        }
        let flat = flatten(&TreeIndex::build(nodes)).expect("chain should flatten");
        assert_eq!(flat.len(), 50);
        for (hops, node) in flat.iter().enumerate() {
            assert_eq!(node.depth, hops);
        }
    }

    #[test]
    fn cycle_fails_fast() {
        let index = TreeIndex::build(vec![
            TreeNode::new("root", None, "Root"),
            TreeNode::new("a", Some("b"), "A"),
            TreeNode::new("b", Some("a"), "B"),
        ]);
        let err = flatten(&index).expect_err("cycle must be reported");
        match err {
            TreeError::CycleDetected { node_id } => assert!(node_id == "a" || node_id == "b"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn self_parent_is_a_cycle() {
        let index = TreeIndex::build(vec![TreeNode::new("x", Some("x"), "X")]);
        assert!(flatten(&index).is_err());
    }
}
