//! Organizational directory: groups, vessels, users and roles.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type GroupId = Uuid;
pub type YachtId = Uuid;
pub type UserId = Uuid;

/// Organizational group. Groups nest through `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    /// `None` means top-level group.
    pub parent_id: Option<GroupId>,
    pub name: String,
    /// Epoch ms archive marker.
    pub archived_at: Option<i64>,
}

/// One vessel. Always belongs to exactly one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Yacht {
    pub id: YachtId,
    pub group_id: GroupId,
    pub name: String,
    pub archived_at: Option<i64>,
}

/// Role granted to a console user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Blueprint administrator; may use privileged incident edits.
    Admin,
    Manager,
    Crew,
}

impl UserRole {
    /// Stable storage value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Crew => "crew",
        }
    }

    /// Parses one storage value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "manager" => Some(Self::Manager),
            "crew" => Some(Self::Crew),
            _ => None,
        }
    }

    /// Whether the role unlocks privileged UI affordances.
    ///
    /// This only drives which controls are offered; the store still decides
    /// whether the resulting mutation is allowed.
    pub fn is_privileged(self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Console user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
}

/// Role catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub description: String,
}
