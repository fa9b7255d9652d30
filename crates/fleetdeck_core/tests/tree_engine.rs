use fleetdeck_core::tree::{
    check_states, classify, descendants_of, CheckState, CheckedSet, KeyboardNavigator, NavKey,
    TreeError, TreeIndex, TreeNode, TreeSnapshot,
};
use std::collections::HashMap;

/// Deterministic forests: node `i` hangs under a random earlier node or is a root.
fn forest(seed: u64, size: usize) -> Vec<TreeNode> {
    let mut state = seed;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        state >> 33
    };
    (0..size)
        .map(|index| {
            let parent = match index {
                0 => None,
                _ if next() % 4 == 0 => None,
                _ => Some(format!("n{}", next() as usize % index)),
            };
            TreeNode {
                id: format!("n{index}"),
                parent_id: parent,
                label: format!("label {}", next() % 7),
            }
        })
        .collect()
}

fn depth_by_walking(nodes: &[TreeNode], id: &str) -> usize {
    let by_id: HashMap<&str, &TreeNode> = nodes.iter().map(|node| (node.id.as_str(), node)).collect();
    let mut depth = 0;
    let mut cursor = by_id[id].parent_id.as_deref();
    while let Some(parent) = cursor {
        depth += 1;
        cursor = by_id[parent].parent_id.as_deref();
    }
    depth
}

#[test]
fn flatten_visits_every_record_once_with_ancestor_depth() {
    for seed in 1..40 {
        let nodes = forest(seed, 1 + (seed as usize * 3) % 50);
        let snapshot = TreeSnapshot::build(nodes.clone()).unwrap();
        assert_eq!(snapshot.len(), nodes.len());

        let mut seen: Vec<&str> = snapshot.rows().iter().map(|row| row.id.as_str()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), nodes.len());

        for row in snapshot.rows() {
            assert_eq!(row.depth, depth_by_walking(&nodes, &row.id), "seed {seed}");
        }
    }
}

#[test]
fn children_follow_their_parent_in_label_order() {
    for seed in 1..20 {
        let snapshot = TreeSnapshot::build(forest(seed, 30)).unwrap();
        let rows = snapshot.rows();
        for (position, row) in rows.iter().enumerate() {
            if let Some(parent) = row.parent_id.as_deref() {
                let parent_position = snapshot.position_of(parent).unwrap();
                assert!(parent_position < position);
            }
        }

        let roots: Vec<String> = rows
            .iter()
            .filter(|row| row.depth == 0)
            .map(|row| row.label.to_lowercase())
            .collect();
        let mut sorted = roots.clone();
        sorted.sort();
        assert_eq!(roots, sorted);
    }
}

#[test]
fn missing_parent_makes_a_root() {
    let snapshot = TreeSnapshot::build(vec![
        TreeNode::new("yacht:1", Some("group:gone"), "Aurora"),
        TreeNode::new("group:2", None, "Baltic"),
    ])
    .unwrap();
    let depths: Vec<(&str, usize)> = snapshot
        .rows()
        .iter()
        .map(|row| (row.id.as_str(), row.depth))
        .collect();
    assert_eq!(depths, vec![("yacht:1", 0), ("group:2", 0)]);
}

#[test]
fn parent_cycle_is_reported_not_looped() {
    let err = TreeSnapshot::build(vec![
        TreeNode::new("root", None, "Root"),
        TreeNode::new("a", Some("b"), "A"),
        TreeNode::new("b", Some("a"), "B"),
    ])
    .unwrap_err();
    match err {
        TreeError::CycleDetected { node_id } => assert!(node_id == "a" || node_id == "b"),
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[test]
fn bulk_check_states_match_per_node_classification() {
    for seed in 1..25 {
        let nodes = forest(seed, 40);
        let index = TreeIndex::build(nodes.clone());
        let snapshot = TreeSnapshot::build(nodes).unwrap();
        let checked: CheckedSet = snapshot
            .rows()
            .iter()
            .enumerate()
            .filter(|(position, _)| (position + seed as usize) % 3 == 0)
            .map(|(_, row)| row.id.as_str())
            .collect();

        let bulk = check_states(snapshot.rows(), &checked);
        for (row, state) in snapshot.rows().iter().zip(bulk) {
            let descendants = descendants_of(&index, &row.id).unwrap();
            assert_eq!(classify(&row.id, &checked, &descendants), state);
        }
    }
}

#[test]
fn classification_rules() {
    let snapshot = TreeSnapshot::build(vec![
        TreeNode::new("med", None, "Mediterranean"),
        TreeNode::new("a", Some("med"), "Aurora"),
        TreeNode::new("b", Some("med"), "Bella"),
        TreeNode::new("solo", None, "Solo"),
    ])
    .unwrap();

    let all: CheckedSet = ["a", "b"].into_iter().collect();
    let states = snapshot.check_states(&all);
    assert_eq!(states[0], CheckState::Checked);

    let some: CheckedSet = ["a"].into_iter().collect();
    assert_eq!(snapshot.check_states(&some)[0], CheckState::Indeterminate);

    let leaf: CheckedSet = ["solo"].into_iter().collect();
    assert_eq!(snapshot.check_states(&leaf)[3], CheckState::Checked);
    assert_eq!(snapshot.check_states(&CheckedSet::new())[3], CheckState::Unchecked);
}

#[test]
fn navigation_stays_in_bounds_and_selects_on_every_move() {
    let snapshot = TreeSnapshot::build(forest(7, 12)).unwrap();
    let rows = snapshot.rows();
    let last = rows.len() - 1;
    let script = [
        NavKey::Previous,
        NavKey::Next,
        NavKey::Next,
        NavKey::Last,
        NavKey::Next,
        NavKey::Activate,
        NavKey::First,
        NavKey::Previous,
        NavKey::Next,
    ];

    let mut nav = KeyboardNavigator::new();
    let mut selected = Vec::new();
    for key in script {
        let before = nav.current();
        let after = nav
            .handle(key, rows, |index, row| {
                assert_eq!(rows[index].id, row.id);
                selected.push(index);
            })
            .unwrap();
        assert!(after <= last);
        let expected = match (key, before) {
            (NavKey::First, _) => 0,
            (NavKey::Last, _) => last,
            (NavKey::Next, None) | (NavKey::Previous, None) => 0,
            (NavKey::Next, Some(index)) => (index + 1).min(last),
            (NavKey::Previous, Some(index)) => index.saturating_sub(1),
            (NavKey::Activate, Some(index)) => index,
            (NavKey::Activate, None) => unreachable!("script activates after moving"),
        };
        assert_eq!(after, expected);
    }
    assert_eq!(selected, vec![0, 1, 2, last, last, 0, 1]);
}

#[test]
fn navigation_on_empty_rows_clears_cursor() {
    let mut nav = KeyboardNavigator::with_current(Some(4));
    assert_eq!(nav.handle(NavKey::Next, &[], |_, _| panic!("no rows")), None);
    assert_eq!(nav.current(), None);
}

#[test]
fn filter_keeps_matching_rows_with_ancestors() {
    let snapshot = TreeSnapshot::build(vec![
        TreeNode::new("med", None, "Mediterranean"),
        TreeNode::new("nice", Some("med"), "Nice"),
        TreeNode::new("aurora", Some("nice"), "Aurora (refit)"),
        TreeNode::new("bella", Some("nice"), "Bella"),
    ])
    .unwrap();

    let filtered = snapshot.filtered("(REFIT)").unwrap();
    let ids: Vec<&str> = filtered.rows().iter().map(|row| row.id.as_str()).collect();
    assert_eq!(ids, vec!["med", "nice", "aurora"]);
    assert_eq!(snapshot.filtered("   ").unwrap().len(), 4);
    assert!(snapshot.filtered("zzz").unwrap().is_empty());
}
