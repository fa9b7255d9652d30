//! Task assignment model with inheritance lineage.
//!
//! # Responsibility
//! - Represent template assignments at group or vessel scope.
//! - Derive lineage (`inherited`, `overridden`, `detached`) from stored
//!   fields without persisting it.
//!
//! # Invariants
//! - Exactly one of group/vessel scope is set; enforced by `AssignmentScope`.
//! - An override row keeps its `parent_assignment_id`.
//! - Group-scope rows have no lineage; they are propagation sources.

use crate::model::blueprint::TemplateId;
use crate::model::directory::{GroupId, YachtId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type AssignmentId = Uuid;

/// Kind of assignment target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Group,
    Yacht,
}

impl ScopeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Yacht => "yacht",
        }
    }
}

/// Concrete assignment target. Group and vessel scope are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AssignmentScope {
    Group(GroupId),
    Yacht(YachtId),
}

impl AssignmentScope {
    /// Builds a scope from nullable storage columns.
    ///
    /// Returns `None` unless exactly one side is present.
    pub fn from_columns(group_id: Option<GroupId>, yacht_id: Option<YachtId>) -> Option<Self> {
        match (group_id, yacht_id) {
            (Some(group_id), None) => Some(Self::Group(group_id)),
            (None, Some(yacht_id)) => Some(Self::Yacht(yacht_id)),
            _ => None,
        }
    }

    pub fn kind(&self) -> ScopeKind {
        match self {
            Self::Group(_) => ScopeKind::Group,
            Self::Yacht(_) => ScopeKind::Yacht,
        }
    }

    pub fn group_id(&self) -> Option<GroupId> {
        match self {
            Self::Group(id) => Some(*id),
            Self::Yacht(_) => None,
        }
    }

    pub fn yacht_id(&self) -> Option<YachtId> {
        match self {
            Self::Group(_) => None,
            Self::Yacht(id) => Some(*id),
        }
    }
}

/// Relationship of a vessel assignment to its propagation source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lineage {
    /// Materialized by group propagation and still tracking it.
    Inherited,
    /// Forked from a group source; immune to further propagation.
    Overridden,
    /// Assigned directly to the vessel with no group ancestor.
    Detached,
}

impl Lineage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inherited => "inherited",
            Self::Overridden => "overridden",
            Self::Detached => "detached",
        }
    }
}

/// Classifies lineage from the three fields that determine it.
///
/// `None` is the group-scope outcome.
pub fn classify_lineage(has_yacht: bool, has_parent: bool, is_override: bool) -> Option<Lineage> {
    match (has_yacht, has_parent, is_override) {
        (false, _, _) => None,
        (true, false, _) => Some(Lineage::Detached),
        (true, true, false) => Some(Lineage::Inherited),
        (true, true, true) => Some(Lineage::Overridden),
    }
}

/// Template assignment at group or vessel scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub id: AssignmentId,
    pub template_id: Option<TemplateId>,
    pub parent_assignment_id: Option<AssignmentId>,
    pub scope: AssignmentScope,
    pub name: String,
    pub description: String,
    pub period: Option<String>,
    /// Opaque structured configuration; always a JSON object.
    pub config: Value,
    pub is_override: bool,
    pub archived_at: Option<i64>,
}

impl TaskAssignment {
    /// Derived lineage; `None` for group-scope rows.
    pub fn lineage(&self) -> Option<Lineage> {
        classify_lineage(
            self.scope.yacht_id().is_some(),
            self.parent_assignment_id.is_some(),
            self.is_override,
        )
    }

    /// Whether an override fork may be created from this row.
    pub fn can_fork(&self) -> bool {
        self.lineage() == Some(Lineage::Inherited) && self.archived_at.is_none()
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    /// Validates structural invariants before the row leaves the decode
    /// boundary.
    pub fn validate(&self) -> Result<(), AssignmentValidationError> {
        if self.name.trim().is_empty() {
            return Err(AssignmentValidationError::BlankName);
        }
        if self.is_override && self.parent_assignment_id.is_none() {
            return Err(AssignmentValidationError::OverrideWithoutParent);
        }
        if self.is_override && self.scope.kind() == ScopeKind::Group {
            return Err(AssignmentValidationError::GroupScopedOverride);
        }
        if self.parent_assignment_id.is_some() && self.scope.kind() == ScopeKind::Group {
            return Err(AssignmentValidationError::GroupScopedParent);
        }
        if !self.config.is_object() {
            return Err(AssignmentValidationError::ConfigNotObject);
        }
        Ok(())
    }
}

/// Structural assignment violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentValidationError {
    BlankName,
    /// Forks must keep provenance.
    OverrideWithoutParent,
    GroupScopedOverride,
    /// Propagation never flows into a group.
    GroupScopedParent,
    ConfigNotObject,
}

impl Display for AssignmentValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "assignment name must not be blank"),
            Self::OverrideWithoutParent => {
                write!(f, "override assignment must keep parent_assignment_id")
            }
            Self::GroupScopedOverride => write!(f, "group-scope assignment cannot be an override"),
            Self::GroupScopedParent => {
                write!(f, "group-scope assignment cannot have a parent assignment")
            }
            Self::ConfigNotObject => write!(f, "assignment config must be a JSON object"),
        }
    }
}

impl Error for AssignmentValidationError {}

#[cfg(test)]
mod tests {
    use super::{
        classify_lineage, AssignmentScope, AssignmentValidationError, Lineage, TaskAssignment,
    };
    use serde_json::json;
    use uuid::Uuid;

    fn vessel_row(parent: Option<Uuid>, is_override: bool) -> TaskAssignment {
        TaskAssignment {
            id: Uuid::new_v4(),
            template_id: Some(Uuid::new_v4()),
            parent_assignment_id: parent,
            scope: AssignmentScope::Yacht(Uuid::new_v4()),
            name: "Bilge pump check".to_string(),
            description: String::new(),
            period: Some("weekly".to_string()),
            config: json!({}),
            is_override,
            archived_at: None,
        }
    }

    #[test]
    fn lineage_covers_four_exclusive_outcomes() {
        let mut outcomes = Vec::new();
        for has_yacht in [false, true] {
            for has_parent in [false, true] {
                for is_override in [false, true] {
                    outcomes.push(classify_lineage(has_yacht, has_parent, is_override));
                }
            }
        }
        assert!(outcomes[..4].iter().all(Option::is_none));
        assert_eq!(outcomes[4], Some(Lineage::Detached));
        assert_eq!(outcomes[5], Some(Lineage::Detached));
        assert_eq!(outcomes[6], Some(Lineage::Inherited));
        assert_eq!(outcomes[7], Some(Lineage::Overridden));
    }

    #[test]
    fn only_active_inherited_rows_can_fork() {
        assert!(vessel_row(Some(Uuid::new_v4()), false).can_fork());
        assert!(!vessel_row(Some(Uuid::new_v4()), true).can_fork());
        assert!(!vessel_row(None, false).can_fork());

        let mut archived = vessel_row(Some(Uuid::new_v4()), false);
        archived.archived_at = Some(1);
        assert!(!archived.can_fork());
    }

    #[test]
    fn scope_requires_exactly_one_column() {
        let id = Uuid::new_v4();
        assert_eq!(
            AssignmentScope::from_columns(Some(id), None),
            Some(AssignmentScope::Group(id))
        );
        assert_eq!(
            AssignmentScope::from_columns(None, Some(id)),
            Some(AssignmentScope::Yacht(id))
        );
        assert_eq!(AssignmentScope::from_columns(Some(id), Some(id)), None);
        assert_eq!(AssignmentScope::from_columns(None, None), None);
    }

    #[test]
    fn validate_rejects_override_without_parent() {
        let row = vessel_row(None, true);
        assert_eq!(
            row.validate(),
            Err(AssignmentValidationError::OverrideWithoutParent)
        );
    }

    #[test]
    fn validate_rejects_non_object_config() {
        let mut row = vessel_row(None, false);
        row.config = json!([1, 2]);
        assert_eq!(row.validate(), Err(AssignmentValidationError::ConfigNotObject));
    }
}
