//! Task incident model.
//!
//! # Invariants
//! - `completed_by` and `completed_at` are set iff status is `completed`.
//! - `completed` and `cancelled` are terminal for the non-privileged path.

use crate::model::assignment::AssignmentId;
use crate::model::directory::{UserId, YachtId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type IncidentId = Uuid;

/// Incident lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Pending,
    Completed,
    Cancelled,
}

impl IncidentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl Display for IncidentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One dated occurrence of an assigned task on one vessel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskIncident {
    pub id: IncidentId,
    pub assignment_id: AssignmentId,
    pub yacht_id: YachtId,
    pub due_date: NaiveDate,
    pub status: IncidentStatus,
    pub completed_by: Option<UserId>,
    /// Epoch ms completion stamp.
    pub completed_at: Option<i64>,
    /// Epoch ms creation stamp.
    pub created_at: i64,
}

impl TaskIncident {
    pub fn validate(&self) -> Result<(), IncidentValidationError> {
        let stamped = self.completed_by.is_some() || self.completed_at.is_some();
        match self.status {
            IncidentStatus::Completed
                if self.completed_by.is_none() || self.completed_at.is_none() =>
            {
                Err(IncidentValidationError::MissingCompletionStamp)
            }
            IncidentStatus::Pending | IncidentStatus::Cancelled if stamped => {
                Err(IncidentValidationError::UnexpectedCompletionStamp(self.status))
            }
            _ => Ok(()),
        }
    }
}

/// Incident shape violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncidentValidationError {
    MissingCompletionStamp,
    UnexpectedCompletionStamp(IncidentStatus),
}

impl Display for IncidentValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCompletionStamp => {
                write!(f, "completed incident requires completed_by and completed_at")
            }
            Self::UnexpectedCompletionStamp(status) => {
                write!(f, "{status} incident must not carry a completion stamp")
            }
        }
    }
}

impl Error for IncidentValidationError {}
