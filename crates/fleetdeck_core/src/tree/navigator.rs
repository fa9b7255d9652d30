//! Keyboard navigation over a flattened tree.
//!
//! Moving is selecting: every move that lands on a different row invokes
//! the selection callback. `Activate` re-confirms the current row so the
//! host can scroll it into view.

use super::flatten::FlatNode;

/// Logical navigation input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavKey {
    Next,
    Previous,
    First,
    Last,
    Activate,
}

impl NavKey {
    /// Maps a host key name to a logical input.
    pub fn from_key_name(name: &str) -> Option<Self> {
        match name {
            "ArrowDown" | "Down" | "j" => Some(Self::Next),
            "ArrowUp" | "Up" | "k" => Some(Self::Previous),
            "Home" => Some(Self::First),
            "End" => Some(Self::Last),
            "Enter" | " " | "Space" => Some(Self::Activate),
            _ => None,
        }
    }
}

/// Current-row cursor. `None` behaves as index -1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyboardNavigator {
    current: Option<usize>,
}

impl KeyboardNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_current(current: Option<usize>) -> Self {
        Self { current }
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = None;
    }

    /// Applies one input and returns the resulting current index.
    ///
    /// Boundaries clamp without wraparound. A cursor left beyond the end by a
    /// shrinking snapshot is clamped to the last row before moving.
    pub fn handle<F>(&mut self, key: NavKey, rows: &[FlatNode], mut on_select: F) -> Option<usize>
    where
        F: FnMut(usize, &FlatNode),
    {
        let Some(last) = rows.len().checked_sub(1) else {
            self.current = None;
            return None;
        };
        let previous = self.current.map(|index| index.min(last));

        let target = match key {
            NavKey::Next => Some(previous.map_or(0, |index| (index + 1).min(last))),
            NavKey::Previous => Some(previous.map_or(0, |index| index.saturating_sub(1))),
            NavKey::First => Some(0),
            NavKey::Last => Some(last),
            NavKey::Activate => previous,
        };

        self.current = target;
        if let Some(index) = target {
            if key == NavKey::Activate || Some(index) != previous {
                on_select(index, &rows[index]);
            }
        }
        target
    }
}

#[cfg(test)]
mod tests {
    use super::{KeyboardNavigator, NavKey};
    use crate::tree::flatten::FlatNode;

    fn rows(count: usize) -> Vec<FlatNode> {
        (0..count)
            .map(|index| FlatNode {
                id: format!("n{index}"),
                parent_id: None,
                label: format!("Node {index}"),
                depth: 0,
                has_children: false,
            })
            .collect()
    }

    #[test]
    fn first_next_from_unset_lands_on_zero() {
        let rows = rows(3);
        let mut nav = KeyboardNavigator::new();
        let mut selected = Vec::new();
        let index = nav.handle(NavKey::Next, &rows, |index, _| selected.push(index));
        assert_eq!(index, Some(0));
        assert_eq!(selected, vec![0]);
    }

    #[test]
    fn next_at_last_is_idempotent() {
        let rows = rows(3);
        let mut nav = KeyboardNavigator::with_current(Some(2));
        let mut calls = 0;
        for _ in 0..3 {
            assert_eq!(nav.handle(NavKey::Next, &rows, |_, _| calls += 1), Some(2));
        }
        assert_eq!(calls, 0);
    }

    #[test]
    fn previous_at_zero_stays() {
        let rows = rows(3);
        let mut nav = KeyboardNavigator::with_current(Some(0));
        assert_eq!(nav.handle(NavKey::Previous, &rows, |_, _| {}), Some(0));
    }

    #[test]
    fn first_last_and_activate() {
        let rows = rows(4);
        let mut nav = KeyboardNavigator::new();
        let mut selected = Vec::new();
        nav.handle(NavKey::Last, &rows, |index, _| selected.push(index));
        nav.handle(NavKey::First, &rows, |index, _| selected.push(index));
        nav.handle(NavKey::Activate, &rows, |index, _| selected.push(index));
        assert_eq!(selected, vec![3, 0, 0]);
    }

    #[test]
    fn activate_without_cursor_is_noop() {
        let rows = rows(2);
        let mut nav = KeyboardNavigator::new();
        let mut called = false;
        assert_eq!(nav.handle(NavKey::Activate, &rows, |_, _| called = true), None);
        assert!(!called);
    }

    #[test]
    fn empty_rows_reset_cursor() {
        let mut nav = KeyboardNavigator::with_current(Some(5));
        assert_eq!(nav.handle(NavKey::Next, &[], |_, _| {}), None);
        assert_eq!(nav.current(), None);
    }

    #[test]
    fn shrunken_snapshot_clamps_cursor() {
        let rows = rows(2);
        let mut nav = KeyboardNavigator::with_current(Some(9));
        assert_eq!(nav.handle(NavKey::Previous, &rows, |_, _| {}), Some(0));
    }

    #[test]
    fn key_names_map_to_inputs() {
        assert_eq!(NavKey::from_key_name("ArrowDown"), Some(NavKey::Next));
        assert_eq!(NavKey::from_key_name("Home"), Some(NavKey::First));
        assert_eq!(NavKey::from_key_name("Enter"), Some(NavKey::Activate));
        assert_eq!(NavKey::from_key_name("Tab"), None);
    }
}
