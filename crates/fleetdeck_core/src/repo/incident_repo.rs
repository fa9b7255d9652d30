//! Task incident queries and writes.
//!
//! # Invariants
//! - Incidents list by `due_date ASC, id ASC`.
//! - Rows are validated on read and before every write.
//! - An incident's assignment always belongs to the incident's yacht.

use super::rows::{
    date_column, ensure_connection_ready, now_epoch_ms, optional_uuid_column, uuid_column,
    DATE_FORMAT,
};
use super::{RepoError, RepoResult};
use crate::config::{EntityKind, RowLimits};
use crate::model::assignment::AssignmentId;
use crate::model::directory::YachtId;
use crate::model::incident::{IncidentId, IncidentStatus, TaskIncident};
use chrono::NaiveDate;
use log::info;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

const INCIDENT_SELECT_SQL: &str = "SELECT
    id,
    assignment_id,
    yacht_id,
    due_date,
    status,
    completed_by,
    completed_at,
    created_at
FROM task_incidents";

/// Filters for incident listing.
#[derive(Debug, Clone, Default)]
pub struct IncidentListQuery {
    pub assignment_id: Option<AssignmentId>,
    pub yacht_id: Option<YachtId>,
    pub status: Option<IncidentStatus>,
    pub limit: Option<u32>,
}

/// Incident contract consumed by the lifecycle service.
pub trait IncidentRepository {
    fn list_incidents(&self, query: &IncidentListQuery) -> RepoResult<Vec<TaskIncident>>;
    fn get_incident(&self, id: IncidentId) -> RepoResult<Option<TaskIncident>>;
    fn create_incident(
        &self,
        assignment_id: AssignmentId,
        yacht_id: YachtId,
        due_date: NaiveDate,
    ) -> RepoResult<TaskIncident>;
    /// Persists status, stamps, due date and assignment of an existing row.
    fn update_incident(&self, incident: &TaskIncident) -> RepoResult<()>;
}

/// SQLite-backed incident repository.
pub struct SqliteIncidentRepository<'conn> {
    conn: &'conn Connection,
    limits: RowLimits,
}

impl<'conn> SqliteIncidentRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["task_incidents", "task_assignments"])?;
        Ok(Self {
            conn,
            limits: RowLimits::default(),
        })
    }

    pub fn with_limits(mut self, limits: RowLimits) -> Self {
        self.limits = limits;
        self
    }
}

impl IncidentRepository for SqliteIncidentRepository<'_> {
    fn list_incidents(&self, query: &IncidentListQuery) -> RepoResult<Vec<TaskIncident>> {
        let mut sql = format!("{INCIDENT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<SqlValue> = Vec::new();
        if let Some(assignment_id) = query.assignment_id {
            sql.push_str(" AND assignment_id = ?");
            bind_values.push(SqlValue::Text(assignment_id.to_string()));
        }
        if let Some(yacht_id) = query.yacht_id {
            sql.push_str(" AND yacht_id = ?");
            bind_values.push(SqlValue::Text(yacht_id.to_string()));
        }
        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(SqlValue::Text(status.as_str().to_string()));
        }
        sql.push_str(" ORDER BY due_date ASC, id ASC LIMIT ?");
        bind_values.push(SqlValue::Integer(i64::from(
            self.limits.apply(EntityKind::Incidents, query.limit),
        )));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut incidents = Vec::new();
        while let Some(row) = rows.next()? {
            incidents.push(parse_incident_row(row)?);
        }
        Ok(incidents)
    }

    fn get_incident(&self, id: IncidentId) -> RepoResult<Option<TaskIncident>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{INCIDENT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_incident_row(row)?)),
            None => Ok(None),
        }
    }

    fn create_incident(
        &self,
        assignment_id: AssignmentId,
        yacht_id: YachtId,
        due_date: NaiveDate,
    ) -> RepoResult<TaskIncident> {
        self.ensure_active_assignment_of(assignment_id, yacht_id)?;

        let id = Uuid::new_v4();
        let created_at = now_epoch_ms();
        self.conn.execute(
            "INSERT INTO task_incidents (
                id,
                assignment_id,
                yacht_id,
                due_date,
                status,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, 'pending', ?5);",
            params![
                id.to_string(),
                assignment_id.to_string(),
                yacht_id.to_string(),
                due_date.format(DATE_FORMAT).to_string(),
                created_at,
            ],
        )?;

        info!(
            "event=incident_create module=repo status=ok incident_id={id} assignment_id={assignment_id}"
        );
        self.get_incident(id)?
            .ok_or_else(|| RepoError::not_found("incident", id))
    }

    fn update_incident(&self, incident: &TaskIncident) -> RepoResult<()> {
        incident.validate()?;
        let current = self
            .get_incident(incident.id)?
            .ok_or_else(|| RepoError::not_found("incident", incident.id))?;
        if current.assignment_id != incident.assignment_id {
            self.ensure_active_assignment_of(incident.assignment_id, current.yacht_id)?;
        }
        let changed = self.conn.execute(
            "UPDATE task_incidents
             SET assignment_id = ?2,
                 due_date = ?3,
                 status = ?4,
                 completed_by = ?5,
                 completed_at = ?6
             WHERE id = ?1;",
            params![
                incident.id.to_string(),
                incident.assignment_id.to_string(),
                incident.due_date.format(DATE_FORMAT).to_string(),
                incident.status.as_str(),
                incident.completed_by.map(|value| value.to_string()),
                incident.completed_at,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("incident", incident.id));
        }
        Ok(())
    }
}

impl SqliteIncidentRepository<'_> {
    /// Incidents may only point at an active assignment of their own yacht.
    fn ensure_active_assignment_of(
        &self,
        assignment_id: AssignmentId,
        yacht_id: YachtId,
    ) -> RepoResult<()> {
        let scoped: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM task_assignments
                WHERE id = ?1
                  AND yacht_id = ?2
                  AND archived_at IS NULL
            );",
            params![assignment_id.to_string(), yacht_id.to_string()],
            |row| row.get(0),
        )?;
        if scoped != 1 {
            return Err(RepoError::Rejected(format!(
                "assignment {assignment_id} is not an active assignment of yacht {yacht_id}"
            )));
        }
        Ok(())
    }
}

fn parse_incident_row(row: &Row<'_>) -> RepoResult<TaskIncident> {
    let status_text: String = row.get("status")?;
    let status = IncidentStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in task_incidents.status"
        ))
    })?;
    let incident = TaskIncident {
        id: uuid_column(row, "id")?,
        assignment_id: uuid_column(row, "assignment_id")?,
        yacht_id: uuid_column(row, "yacht_id")?,
        due_date: date_column(row, "due_date")?,
        status,
        completed_by: optional_uuid_column(row, "completed_by")?,
        completed_at: row.get("completed_at")?,
        created_at: row.get("created_at")?,
    };
    incident.validate()?;
    Ok(incident)
}
