use crate::db::DbError;
use crate::model::assignment::AssignmentValidationError;
use crate::model::incident::IncidentValidationError;
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors reported by the fleet store.
#[derive(Debug)]
pub enum RepoError {
    /// Transport or SQLite failure.
    Db(DbError),
    /// Target row does not exist or is archived.
    NotFound { entity: &'static str, id: Uuid },
    /// The store refused the request. The message is shown to the user as-is.
    Rejected(String),
    /// Persisted data cannot be decoded into a valid entity.
    InvalidData(String),
    Assignment(AssignmentValidationError),
    Incident(IncidentValidationError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
}

impl RepoError {
    pub(crate) fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    /// Whether the store itself declined the request.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Rejected(message) => f.write_str(message),
            Self::InvalidData(message) => write!(f, "invalid fleet store data: {message}"),
            Self::Assignment(err) => write!(f, "{err}"),
            Self::Incident(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "fleet store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "fleet store requires table `{table}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Assignment(err) => Some(err),
            Self::Incident(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    /// Constraint failures are the store refusing the write; everything else
    /// is transport.
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(failure, Some(message))
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                Self::Rejected(message)
            }
            other => Self::Db(DbError::Sqlite(other)),
        }
    }
}

impl From<AssignmentValidationError> for RepoError {
    fn from(value: AssignmentValidationError) -> Self {
        Self::Assignment(value)
    }
}

impl From<IncidentValidationError> for RepoError {
    fn from(value: IncidentValidationError) -> Self {
        Self::Incident(value)
    }
}
