//! Assignment browsing and override forking.
//!
//! # Responsibility
//! - List assignments attached to one scope or linked to one group source.
//! - Offer override forking only on inherited, active assignments.
//!
//! # Invariants
//! - Fork requests for overridden or detached rows never reach the store.

use crate::model::assignment::{AssignmentId, AssignmentScope, Lineage, TaskAssignment};
use crate::repo::assignment_repo::{AssignmentListQuery, AssignmentRepository};
use crate::repo::{RepoError, RepoResult};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from assignment service operations.
#[derive(Debug)]
pub enum AssignmentServiceError {
    NotFound(AssignmentId),
    /// Forking is offered on active inherited rows only.
    ForkUnavailable {
        assignment_id: AssignmentId,
        lineage: Option<Lineage>,
        archived: bool,
    },
    Repo(RepoError),
}

impl Display for AssignmentServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "assignment not found: {id}"),
            Self::ForkUnavailable {
                assignment_id,
                archived: true,
                ..
            } => write!(f, "assignment {assignment_id} is archived and cannot be forked"),
            Self::ForkUnavailable {
                assignment_id,
                lineage,
                ..
            } => write!(
                f,
                "assignment {assignment_id} is {} and cannot be forked",
                lineage.map_or("group-scoped", Lineage::as_str)
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AssignmentServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AssignmentServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { id, .. } => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Assignment use-case service.
pub struct AssignmentService<R: AssignmentRepository> {
    repo: R,
}

impl<R: AssignmentRepository> AssignmentService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Active assignments attached directly to `scope`.
    pub fn list_for_scope(&self, scope: AssignmentScope) -> RepoResult<Vec<TaskAssignment>> {
        self.repo
            .list_assignments(&AssignmentListQuery::for_scope(scope))
    }

    /// Active vessel rows linked to one group-scope source.
    pub fn list_linked(&self, source_id: AssignmentId) -> RepoResult<Vec<TaskAssignment>> {
        self.repo.list_assignments(&AssignmentListQuery {
            parent_assignment_id: Some(source_id),
            ..AssignmentListQuery::default()
        })
    }

    pub fn get(&self, id: AssignmentId) -> Result<TaskAssignment, AssignmentServiceError> {
        self.repo
            .get_assignment(id)?
            .ok_or(AssignmentServiceError::NotFound(id))
    }

    /// Forks `assignment` into an override row on its vessel.
    pub fn create_override_fork(
        &self,
        assignment: &TaskAssignment,
    ) -> Result<AssignmentId, AssignmentServiceError> {
        let (Some(parent_id), Some(yacht_id)) =
            (assignment.parent_assignment_id, assignment.scope.yacht_id())
        else {
            return Err(fork_unavailable(assignment));
        };
        if !assignment.can_fork() {
            return Err(fork_unavailable(assignment));
        }

        let fork_id = self.repo.create_override_fork(parent_id, yacht_id)?;
        info!(
            "event=assignment_fork module=service status=ok assignment_id={} fork_id={}",
            assignment.id, fork_id
        );
        Ok(fork_id)
    }

    /// Loads `id` and forks it.
    pub fn fork_by_id(&self, id: AssignmentId) -> Result<AssignmentId, AssignmentServiceError> {
        let assignment = self.get(id)?;
        self.create_override_fork(&assignment)
    }
}

fn fork_unavailable(assignment: &TaskAssignment) -> AssignmentServiceError {
    AssignmentServiceError::ForkUnavailable {
        assignment_id: assignment.id,
        lineage: assignment.lineage(),
        archived: assignment.is_archived(),
    }
}
