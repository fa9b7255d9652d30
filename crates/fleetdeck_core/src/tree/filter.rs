//! Label search over tree records.

use super::index::TreeNode;
use super::TreeError;
use regex::{Regex, RegexBuilder};
use std::collections::{HashMap, HashSet};

/// Keeps records whose label matches every whitespace-separated term of
/// `query` (case-insensitive, literal), plus all of their ancestors so the
/// matches stay reachable. Input order is preserved.
///
/// A blank query keeps everything.
pub fn retain_matching(nodes: &[TreeNode], query: &str) -> Result<Vec<TreeNode>, TreeError> {
    let terms = query
        .split_whitespace()
        .map(term_pattern)
        .collect::<Result<Vec<Regex>, TreeError>>()?;
    if terms.is_empty() {
        return Ok(nodes.to_vec());
    }

    let by_id: HashMap<&str, &TreeNode> =
        nodes.iter().map(|node| (node.id.as_str(), node)).collect();
    let mut keep: HashSet<&str> = HashSet::new();

    for node in nodes {
        if !terms.iter().all(|term| term.is_match(&node.label)) {
            continue;
        }
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if !keep.insert(current.id.as_str()) {
                break;
            }
            cursor = current
                .parent_id
                .as_deref()
                .and_then(|parent| by_id.get(parent).copied());
        }
    }

    Ok(nodes
        .iter()
        .filter(|node| keep.contains(node.id.as_str()))
        .cloned()
        .collect())
}

fn term_pattern(term: &str) -> Result<Regex, TreeError> {
    RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
        .map_err(|err| TreeError::InvalidFilter(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::retain_matching;
    use crate::tree::index::TreeNode;

    fn sample() -> Vec<TreeNode> {
        vec![
            TreeNode::new("engine", None, "Engine room"),
            TreeNode::new("oil", Some("engine"), "Oil change (500h)"),
            TreeNode::new("fuel", Some("engine"), "Fuel filter"),
            TreeNode::new("deck", None, "Deck"),
            TreeNode::new("teak", Some("deck"), "Teak oiling"),
        ]
    }

    fn ids(nodes: &[TreeNode]) -> Vec<&str> {
        nodes.iter().map(|node| node.id.as_str()).collect()
    }

    #[test]
    fn matches_keep_ancestors_in_input_order() {
        let nodes = sample();
        let kept = retain_matching(&nodes, "OIL").expect("valid query");
        assert_eq!(ids(&kept), vec!["engine", "oil", "deck", "teak"]);
    }

    #[test]
    fn all_terms_must_match() {
        let nodes = sample();
        let kept = retain_matching(&nodes, "oil change").expect("valid query");
        assert_eq!(ids(&kept), vec!["engine", "oil"]);
    }

    #[test]
    fn metacharacters_are_literal() {
        let nodes = sample();
        let kept = retain_matching(&nodes, "(500h)").expect("valid query");
        assert_eq!(ids(&kept), vec!["engine", "oil"]);
        assert!(retain_matching(&nodes, ".*").expect("valid query").is_empty());
    }

    #[test]
    fn blank_query_keeps_everything() {
        let nodes = sample();
        assert_eq!(retain_matching(&nodes, "  ").expect("blank").len(), nodes.len());
    }
}
