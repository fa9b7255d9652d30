//! Per-screen session context.
//!
//! # Responsibility
//! - Carry the acting identity, the explicit checked set and pending
//!   notices for one top-level screen.
//!
//! # Invariants
//! - One context per screen; dropping it discards selection and notices.
//! - The notice queue is bounded; the oldest notice is dropped first.

use crate::model::directory::{UserId, UserRole};
use crate::tree::CheckedSet;
use std::collections::VecDeque;

const MAX_PENDING_NOTICES: usize = 32;

/// Authenticated identity acting on the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: UserRole,
}

/// Severity of one user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// One user-facing notice waiting to be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Explicit session state for one screen.
#[derive(Debug, Default)]
pub struct SessionContext {
    actor: Option<Actor>,
    checked: CheckedSet,
    notices: VecDeque<Notice>,
}

impl SessionContext {
    pub fn new(actor: Option<Actor>) -> Self {
        Self {
            actor,
            ..Self::default()
        }
    }

    pub fn with_actor(actor: Actor) -> Self {
        Self::new(Some(actor))
    }

    pub fn actor(&self) -> Option<Actor> {
        self.actor
    }

    /// Whether privileged affordances (admin edits) should be offered.
    ///
    /// Display hint only; the store still decides.
    pub fn shows_privileged_tools(&self) -> bool {
        self.actor.is_some_and(|actor| actor.role.is_privileged())
    }

    pub fn checked(&self) -> &CheckedSet {
        &self.checked
    }

    pub fn checked_mut(&mut self) -> &mut CheckedSet {
        &mut self.checked
    }

    pub fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        if self.notices.len() == MAX_PENDING_NOTICES {
            self.notices.pop_front();
        }
        self.notices.push_back(Notice {
            level,
            message: message.into(),
        });
    }

    pub fn pending_notices(&self) -> usize {
        self.notices.len()
    }

    /// Takes every pending notice in arrival order.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Actor, NoticeLevel, SessionContext, MAX_PENDING_NOTICES};
    use crate::model::directory::UserRole;
    use uuid::Uuid;

    #[test]
    fn notices_drain_in_order_and_stay_bounded() {
        let mut session = SessionContext::new(None);
        for index in 0..(MAX_PENDING_NOTICES + 3) {
            session.notify(NoticeLevel::Info, format!("n{index}"));
        }
        assert_eq!(session.pending_notices(), MAX_PENDING_NOTICES);

        let drained = session.drain_notices();
        assert_eq!(drained[0].message, "n3");
        assert_eq!(session.pending_notices(), 0);
    }

    #[test]
    fn privileged_tools_follow_actor_role() {
        let admin = SessionContext::with_actor(Actor {
            user_id: Uuid::new_v4(),
            role: UserRole::Admin,
        });
        let crew = SessionContext::with_actor(Actor {
            user_id: Uuid::new_v4(),
            role: UserRole::Crew,
        });
        assert!(admin.shows_privileged_tools());
        assert!(!crew.shows_privileged_tools());
        assert!(!SessionContext::default().shows_privileged_tools());
    }

    #[test]
    fn checked_set_is_owned_by_the_session() {
        let mut session = SessionContext::default();
        session.checked_mut().toggle("group:a");
        assert!(session.checked().contains("group:a"));
    }
}
