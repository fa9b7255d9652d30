//! Incident lifecycle use cases.
//!
//! # Responsibility
//! - Drive `pending -> completed` and `pending -> cancelled`.
//! - Apply privileged edits to status, due date and assignment.
//!
//! # Invariants
//! - Completion is stamped with the acting identity and the time of the
//!   request; callers never choose the timestamp.
//! - Terminal incidents are not reopened through the non-privileged path.
//! - Privileged edits are not authorized here; the store decides.

use crate::model::assignment::AssignmentId;
use crate::model::directory::YachtId;
use crate::model::incident::{IncidentId, IncidentStatus, TaskIncident};
use crate::repo::incident_repo::{IncidentListQuery, IncidentRepository};
use crate::repo::{now_epoch_ms, RepoError, RepoResult};
use crate::session::SessionContext;
use chrono::NaiveDate;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from incident lifecycle operations.
#[derive(Debug)]
pub enum IncidentServiceError {
    NotFound(IncidentId),
    /// Completion needs an authenticated actor.
    MissingActor,
    /// Incident already left `pending`.
    AlreadyTerminal {
        id: IncidentId,
        status: IncidentStatus,
    },
    Repo(RepoError),
}

impl Display for IncidentServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "incident not found: {id}"),
            Self::MissingActor => write!(f, "completing an incident requires a signed-in user"),
            Self::AlreadyTerminal { id, status } => {
                write!(f, "incident {id} is already {status}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for IncidentServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for IncidentServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { id, .. } => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Privileged edit. `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminIncidentEdit {
    pub status: Option<IncidentStatus>,
    pub due_date: Option<NaiveDate>,
    pub assignment_id: Option<AssignmentId>,
}

/// Incident lifecycle service.
pub struct IncidentService<R: IncidentRepository> {
    repo: R,
}

impl<R: IncidentRepository> IncidentService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn list(&self, query: &IncidentListQuery) -> RepoResult<Vec<TaskIncident>> {
        self.repo.list_incidents(query)
    }

    pub fn get(&self, id: IncidentId) -> Result<TaskIncident, IncidentServiceError> {
        self.repo
            .get_incident(id)?
            .ok_or(IncidentServiceError::NotFound(id))
    }

    /// Creates one pending incident through the store.
    pub fn create_incident(
        &self,
        assignment_id: AssignmentId,
        yacht_id: YachtId,
        due_date: NaiveDate,
    ) -> Result<TaskIncident, IncidentServiceError> {
        Ok(self
            .repo
            .create_incident(assignment_id, yacht_id, due_date)?)
    }

    /// Completes a pending incident as the session's actor.
    pub fn complete(
        &self,
        session: &SessionContext,
        id: IncidentId,
    ) -> Result<TaskIncident, IncidentServiceError> {
        let actor = session.actor().ok_or(IncidentServiceError::MissingActor)?;
        let mut incident = self.pending(id)?;

        incident.status = IncidentStatus::Completed;
        incident.completed_by = Some(actor.user_id);
        incident.completed_at = Some(now_epoch_ms());
        self.repo.update_incident(&incident)?;

        info!("event=incident_complete module=service status=ok incident_id={id}");
        Ok(incident)
    }

    /// Cancels a pending incident.
    pub fn cancel(&self, id: IncidentId) -> Result<TaskIncident, IncidentServiceError> {
        let mut incident = self.pending(id)?;
        incident.status = IncidentStatus::Cancelled;
        self.repo.update_incident(&incident)?;

        info!("event=incident_cancel module=service status=ok incident_id={id}");
        Ok(incident)
    }

    /// Rewrites status, due date or assignment regardless of current state.
    ///
    /// Moving into `completed` stamps the session actor and the current
    /// time; moving out of it clears the stamp.
    pub fn admin_edit(
        &self,
        session: &SessionContext,
        id: IncidentId,
        edit: &AdminIncidentEdit,
    ) -> Result<TaskIncident, IncidentServiceError> {
        let mut incident = self.get(id)?;

        if let Some(status) = edit.status.filter(|status| *status != incident.status) {
            match status {
                IncidentStatus::Completed => {
                    let actor = session.actor().ok_or(IncidentServiceError::MissingActor)?;
                    incident.completed_by = Some(actor.user_id);
                    incident.completed_at = Some(now_epoch_ms());
                }
                IncidentStatus::Pending | IncidentStatus::Cancelled => {
                    incident.completed_by = None;
                    incident.completed_at = None;
                }
            }
            incident.status = status;
        }
        if let Some(due_date) = edit.due_date {
            incident.due_date = due_date;
        }
        if let Some(assignment_id) = edit.assignment_id {
            incident.assignment_id = assignment_id;
        }
        self.repo.update_incident(&incident)?;

        info!(
            "event=incident_admin_edit module=service status=ok incident_id={} new_status={}",
            id,
            incident.status.as_str()
        );
        Ok(incident)
    }

    fn pending(&self, id: IncidentId) -> Result<TaskIncident, IncidentServiceError> {
        let incident = self.get(id)?;
        if incident.status.is_terminal() {
            return Err(IncidentServiceError::AlreadyTerminal {
                id,
                status: incident.status,
            });
        }
        Ok(incident)
    }
}
