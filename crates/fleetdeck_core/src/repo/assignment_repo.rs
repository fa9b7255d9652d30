//! Task assignment queries and propagation procedures.
//!
//! # Responsibility
//! - List and fetch assignments at group or vessel scope.
//! - Run the propagation procedures (group, category subtree, vessel) and
//!   override forking, each inside one immediate transaction.
//!
//! # Invariants
//! - At most one active row exists per `(template, group)` and per
//!   `(template, yacht)`.
//! - Propagation flows group -> vessel only.
//! - Overridden rows are never rewritten by any propagation.
//! - Detached rows are untouched by group propagation.
//! - A fork keeps `parent_assignment_id` and archives the inherited row.

use super::directory_repo::user_can_access_group;
use super::rows::{
    bool_column, bool_to_int, ensure_connection_ready, json_object_column, now_epoch_ms,
    optional_uuid_column, parse_uuid, uuid_column,
};
use super::{RepoError, RepoResult};
use crate::config::{EntityKind, RowLimits};
use crate::model::assignment::{AssignmentId, AssignmentScope, Lineage, TaskAssignment};
use crate::model::blueprint::{CategoryId, TemplateId};
use crate::model::directory::{GroupId, UserId, YachtId};
use log::info;
use rusqlite::types::Value as SqlValue;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ASSIGNMENT_SELECT_SQL: &str = "SELECT
    id,
    template_id,
    parent_assignment_id,
    group_id,
    yacht_id,
    name,
    description,
    period,
    config,
    is_override,
    archived_at
FROM task_assignments";

/// Filters for assignment listing. All filters combine with AND.
#[derive(Debug, Clone, Default)]
pub struct AssignmentListQuery {
    pub group_id: Option<GroupId>,
    pub yacht_id: Option<YachtId>,
    pub template_id: Option<TemplateId>,
    pub parent_assignment_id: Option<AssignmentId>,
    pub include_archived: bool,
    pub limit: Option<u32>,
}

impl AssignmentListQuery {
    /// Active assignments attached directly to `scope`.
    pub fn for_scope(scope: AssignmentScope) -> Self {
        Self {
            group_id: scope.group_id(),
            yacht_id: scope.yacht_id(),
            ..Self::default()
        }
    }
}

/// Row counts produced by one propagation procedure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationSummary {
    /// Templates the procedure applied.
    pub templates: u32,
    pub group_rows_created: u32,
    pub group_rows_refreshed: u32,
    pub vessel_rows_created: u32,
    pub vessel_rows_replaced: u32,
    /// Vessel rows left as they were (overridden, detached, or kept).
    pub vessel_rows_kept: u32,
}

impl PropagationSummary {
    fn absorb(&mut self, other: PropagationSummary) {
        self.templates += other.templates;
        self.group_rows_created += other.group_rows_created;
        self.group_rows_refreshed += other.group_rows_refreshed;
        self.vessel_rows_created += other.vessel_rows_created;
        self.vessel_rows_replaced += other.vessel_rows_replaced;
        self.vessel_rows_kept += other.vessel_rows_kept;
    }

    /// Rows written by the procedure.
    pub fn rows_written(&self) -> u32 {
        self.group_rows_created
            + self.group_rows_refreshed
            + self.vessel_rows_created
            + self.vessel_rows_replaced
    }
}

/// Assignment contract consumed by the propagation planner.
///
/// Every mutating call applies fully or fails; failures from the store are
/// reported as [`RepoError::Rejected`] with the store's own message.
pub trait AssignmentRepository {
    fn list_assignments(&self, query: &AssignmentListQuery) -> RepoResult<Vec<TaskAssignment>>;
    fn get_assignment(&self, id: AssignmentId) -> RepoResult<Option<TaskAssignment>>;
    fn assign_template_to_group(
        &self,
        template_id: TemplateId,
        group_id: GroupId,
        override_existing: bool,
    ) -> RepoResult<PropagationSummary>;
    fn assign_category_subtree_to_group(
        &self,
        category_id: CategoryId,
        group_id: GroupId,
        override_existing: bool,
    ) -> RepoResult<PropagationSummary>;
    fn assign_template_to_yacht(
        &self,
        template_id: TemplateId,
        yacht_id: YachtId,
        override_existing: bool,
    ) -> RepoResult<PropagationSummary>;
    /// Forks the inherited row linked to `parent_assignment_id` on `yacht_id`.
    fn create_override_fork(
        &self,
        parent_assignment_id: AssignmentId,
        yacht_id: YachtId,
    ) -> RepoResult<AssignmentId>;
}

/// SQLite-backed assignment repository.
///
/// With an actor attached, mutations are refused unless the actor may access
/// the target group, mirroring the store's row-level policy.
pub struct SqliteAssignmentRepository<'conn> {
    conn: &'conn Connection,
    limits: RowLimits,
    actor: Option<UserId>,
}

impl<'conn> SqliteAssignmentRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &["task_assignments", "task_templates", "fleet_groups", "yachts"],
        )?;
        Ok(Self {
            conn,
            limits: RowLimits::default(),
            actor: None,
        })
    }

    pub fn with_limits(mut self, limits: RowLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Enforces group access for `user_id` on every mutation.
    pub fn with_actor(mut self, user_id: UserId) -> Self {
        self.actor = Some(user_id);
        self
    }

    fn authorize_group(&self, group_id: GroupId) -> RepoResult<()> {
        let Some(user_id) = self.actor else {
            return Ok(());
        };
        if user_can_access_group(self.conn, user_id, group_id)? {
            return Ok(());
        }
        Err(RepoError::Rejected(format!(
            "permission denied: user {user_id} may not modify assignments for group {group_id}"
        )))
    }

    fn begin(&self) -> RepoResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl AssignmentRepository for SqliteAssignmentRepository<'_> {
    fn list_assignments(&self, query: &AssignmentListQuery) -> RepoResult<Vec<TaskAssignment>> {
        let mut sql = format!("{ASSIGNMENT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<SqlValue> = Vec::new();
        if !query.include_archived {
            sql.push_str(" AND archived_at IS NULL");
        }
        let filters = [
            ("group_id", query.group_id),
            ("yacht_id", query.yacht_id),
            ("template_id", query.template_id),
            ("parent_assignment_id", query.parent_assignment_id),
        ];
        for (column, value) in filters {
            if let Some(value) = value {
                sql.push_str(&format!(" AND {column} = ?"));
                bind_values.push(SqlValue::Text(value.to_string()));
            }
        }
        sql.push_str(" ORDER BY name COLLATE NOCASE ASC, id ASC LIMIT ?");
        bind_values.push(SqlValue::Integer(i64::from(
            self.limits.apply(EntityKind::Assignments, query.limit),
        )));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut assignments = Vec::new();
        while let Some(row) = rows.next()? {
            assignments.push(parse_assignment_row(row)?);
        }
        Ok(assignments)
    }

    fn get_assignment(&self, id: AssignmentId) -> RepoResult<Option<TaskAssignment>> {
        load_assignment(self.conn, id)
    }

    fn assign_template_to_group(
        &self,
        template_id: TemplateId,
        group_id: GroupId,
        override_existing: bool,
    ) -> RepoResult<PropagationSummary> {
        ensure_active(self.conn, "fleet_groups", "group", group_id)?;
        self.authorize_group(group_id)?;

        let tx = self.begin()?;
        let summary = propagate_template(&tx, template_id, group_id, override_existing)?;
        tx.commit()?;

        info!(
            "event=assign_template_group module=repo status=ok group_id={} template_id={} override_existing={} rows_written={}",
            group_id,
            template_id,
            override_existing,
            summary.rows_written()
        );
        Ok(summary)
    }

    fn assign_category_subtree_to_group(
        &self,
        category_id: CategoryId,
        group_id: GroupId,
        override_existing: bool,
    ) -> RepoResult<PropagationSummary> {
        ensure_active(self.conn, "global_categories", "category", category_id)?;
        ensure_active(self.conn, "fleet_groups", "group", group_id)?;
        self.authorize_group(group_id)?;

        let tx = self.begin()?;
        let templates = subtree_template_ids(&tx, category_id)?;
        let mut summary = PropagationSummary::default();
        for template_id in templates {
            summary.absorb(propagate_template(
                &tx,
                template_id,
                group_id,
                override_existing,
            )?);
        }
        tx.commit()?;

        info!(
            "event=assign_subtree_group module=repo status=ok group_id={} category_id={} override_existing={} templates={} rows_written={}",
            group_id,
            category_id,
            override_existing,
            summary.templates,
            summary.rows_written()
        );
        Ok(summary)
    }

    fn assign_template_to_yacht(
        &self,
        template_id: TemplateId,
        yacht_id: YachtId,
        override_existing: bool,
    ) -> RepoResult<PropagationSummary> {
        let group_id = active_yacht_group(self.conn, yacht_id)?;
        self.authorize_group(group_id)?;

        let tx = self.begin()?;
        let fields = template_fields(&tx, template_id)?;
        let mut summary = PropagationSummary {
            templates: 1,
            ..PropagationSummary::default()
        };
        match active_vessel_row(&tx, template_id, yacht_id)? {
            None => {
                insert_assignment(
                    &tx,
                    &NewAssignment {
                        template_id,
                        parent_assignment_id: None,
                        scope: AssignmentScope::Yacht(yacht_id),
                        fields: &fields,
                        is_override: false,
                    },
                )?;
                summary.vessel_rows_created += 1;
            }
            Some(existing) if existing.lineage != Lineage::Overridden && override_existing => {
                refresh_fields(&tx, existing.id, &fields, existing.parent_assignment_id)?;
                summary.vessel_rows_replaced += 1;
            }
            Some(_) => summary.vessel_rows_kept += 1,
        }
        tx.commit()?;

        info!(
            "event=assign_template_yacht module=repo status=ok yacht_id={} template_id={} override_existing={} rows_written={}",
            yacht_id,
            template_id,
            override_existing,
            summary.rows_written()
        );
        Ok(summary)
    }

    fn create_override_fork(
        &self,
        parent_assignment_id: AssignmentId,
        yacht_id: YachtId,
    ) -> RepoResult<AssignmentId> {
        let group_id = active_yacht_group(self.conn, yacht_id)?;
        self.authorize_group(group_id)?;

        let tx = self.begin()?;
        let inherited_id: Option<String> = tx
            .query_row(
                "SELECT id
                 FROM task_assignments
                 WHERE parent_assignment_id = ?1
                   AND yacht_id = ?2
                   AND is_override = 0
                   AND archived_at IS NULL
                 ORDER BY created_at ASC, id ASC
                 LIMIT 1;",
                params![parent_assignment_id.to_string(), yacht_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(inherited_id) = inherited_id else {
            return Err(RepoError::not_found(
                "inherited assignment",
                parent_assignment_id,
            ));
        };
        let inherited_id = parse_uuid(&inherited_id, "task_assignments.id")?;

        let fork_id = Uuid::new_v4();
        let now = now_epoch_ms();
        tx.execute(
            "INSERT INTO task_assignments (
                id,
                template_id,
                parent_assignment_id,
                group_id,
                yacht_id,
                name,
                description,
                period,
                config,
                is_override,
                created_at,
                updated_at
            )
            SELECT
                ?1,
                template_id,
                parent_assignment_id,
                NULL,
                yacht_id,
                name,
                description,
                period,
                config,
                1,
                ?3,
                ?3
            FROM task_assignments
            WHERE id = ?2;",
            params![fork_id.to_string(), inherited_id.to_string(), now],
        )?;
        tx.execute(
            "UPDATE task_assignments
             SET archived_at = ?2,
                 updated_at = ?2
             WHERE id = ?1;",
            params![inherited_id.to_string(), now],
        )?;
        tx.commit()?;

        info!(
            "event=create_override_fork module=repo status=ok yacht_id={} parent_assignment_id={} fork_id={}",
            yacht_id, parent_assignment_id, fork_id
        );
        Ok(fork_id)
    }
}

/// Copyable assignment fields taken from a template or a group row.
struct AssignmentFields {
    name: String,
    description: String,
    period: Option<String>,
    config: String,
}

struct NewAssignment<'a> {
    template_id: TemplateId,
    parent_assignment_id: Option<AssignmentId>,
    scope: AssignmentScope,
    fields: &'a AssignmentFields,
    is_override: bool,
}

/// Active vessel row for one template, reduced to what propagation needs.
struct VesselRow {
    id: AssignmentId,
    parent_assignment_id: Option<AssignmentId>,
    lineage: Lineage,
}

/// Upserts the group row for `template_id` and fans it out to every active
/// vessel in the group subtree.
fn propagate_template(
    tx: &Transaction<'_>,
    template_id: TemplateId,
    group_id: GroupId,
    override_existing: bool,
) -> RepoResult<PropagationSummary> {
    let template = template_fields(tx, template_id)?;
    let mut summary = PropagationSummary {
        templates: 1,
        ..PropagationSummary::default()
    };

    let existing_group_row: Option<String> = tx
        .query_row(
            "SELECT id
             FROM task_assignments
             WHERE template_id = ?1
               AND group_id = ?2
               AND archived_at IS NULL
             ORDER BY created_at ASC, id ASC
             LIMIT 1;",
            params![template_id.to_string(), group_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    let group_row_id = match existing_group_row {
        Some(id) => {
            let id = parse_uuid(&id, "task_assignments.id")?;
            if override_existing {
                refresh_fields(tx, id, &template, None)?;
                summary.group_rows_refreshed += 1;
            }
            id
        }
        None => {
            summary.group_rows_created += 1;
            insert_assignment(
                tx,
                &NewAssignment {
                    template_id,
                    parent_assignment_id: None,
                    scope: AssignmentScope::Group(group_id),
                    fields: &template,
                    is_override: false,
                },
            )?
        }
    };
    let source = group_row_fields(tx, group_row_id)?;

    for yacht_id in subtree_yacht_ids(tx, group_id)? {
        match active_vessel_row(tx, template_id, yacht_id)? {
            None => {
                insert_assignment(
                    tx,
                    &NewAssignment {
                        template_id,
                        parent_assignment_id: Some(group_row_id),
                        scope: AssignmentScope::Yacht(yacht_id),
                        fields: &source,
                        is_override: false,
                    },
                )?;
                summary.vessel_rows_created += 1;
            }
            Some(existing) if existing.lineage == Lineage::Inherited && override_existing => {
                refresh_fields(tx, existing.id, &source, Some(group_row_id))?;
                summary.vessel_rows_replaced += 1;
            }
            Some(_) => summary.vessel_rows_kept += 1,
        }
    }
    Ok(summary)
}

fn insert_assignment(tx: &Transaction<'_>, row: &NewAssignment<'_>) -> RepoResult<AssignmentId> {
    let id = Uuid::new_v4();
    let now = now_epoch_ms();
    tx.execute(
        "INSERT INTO task_assignments (
            id,
            template_id,
            parent_assignment_id,
            group_id,
            yacht_id,
            name,
            description,
            period,
            config,
            is_override,
            created_at,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11);",
        params![
            id.to_string(),
            row.template_id.to_string(),
            row.parent_assignment_id.map(|value| value.to_string()),
            row.scope.group_id().map(|value| value.to_string()),
            row.scope.yacht_id().map(|value| value.to_string()),
            row.fields.name.as_str(),
            row.fields.description.as_str(),
            row.fields.period.as_deref(),
            row.fields.config.as_str(),
            bool_to_int(row.is_override),
            now,
        ],
    )?;
    Ok(id)
}

/// Rewrites copyable fields. `parent` relinks vessel rows; `None` keeps the
/// current link.
fn refresh_fields(
    tx: &Transaction<'_>,
    id: AssignmentId,
    fields: &AssignmentFields,
    parent: Option<AssignmentId>,
) -> RepoResult<()> {
    tx.execute(
        "UPDATE task_assignments
         SET name = ?2,
             description = ?3,
             period = ?4,
             config = ?5,
             parent_assignment_id = COALESCE(?6, parent_assignment_id),
             updated_at = ?7
         WHERE id = ?1;",
        params![
            id.to_string(),
            fields.name.as_str(),
            fields.description.as_str(),
            fields.period.as_deref(),
            fields.config.as_str(),
            parent.map(|value| value.to_string()),
            now_epoch_ms(),
        ],
    )?;
    Ok(())
}

fn template_fields(conn: &Connection, template_id: TemplateId) -> RepoResult<AssignmentFields> {
    conn.query_row(
        "SELECT name, description, period
         FROM task_templates
         WHERE id = ?1
           AND archived_at IS NULL;",
        [template_id.to_string()],
        |row| {
            Ok(AssignmentFields {
                name: row.get(0)?,
                description: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                period: row.get(2)?,
                config: "{}".to_string(),
            })
        },
    )
    .optional()?
    .ok_or_else(|| RepoError::not_found("template", template_id))
}

fn group_row_fields(conn: &Connection, id: AssignmentId) -> RepoResult<AssignmentFields> {
    Ok(conn.query_row(
        "SELECT name, description, period, config FROM task_assignments WHERE id = ?1;",
        [id.to_string()],
        |row| {
            Ok(AssignmentFields {
                name: row.get(0)?,
                description: row.get(1)?,
                period: row.get(2)?,
                config: row.get(3)?,
            })
        },
    )?)
}

fn active_vessel_row(
    conn: &Connection,
    template_id: TemplateId,
    yacht_id: YachtId,
) -> RepoResult<Option<VesselRow>> {
    let row = conn
        .query_row(
            "SELECT id, parent_assignment_id, is_override
             FROM task_assignments
             WHERE template_id = ?1
               AND yacht_id = ?2
               AND archived_at IS NULL
             ORDER BY is_override DESC, created_at ASC, id ASC
             LIMIT 1;",
            params![template_id.to_string(), yacht_id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )
        .optional()?;
    let Some((id, parent, is_override)) = row else {
        return Ok(None);
    };

    let parent_assignment_id = parent
        .map(|value| parse_uuid(&value, "task_assignments.parent_assignment_id"))
        .transpose()?;
    let lineage = match (parent_assignment_id.is_some(), is_override != 0) {
        (false, _) => Lineage::Detached,
        (true, false) => Lineage::Inherited,
        (true, true) => Lineage::Overridden,
    };
    Ok(Some(VesselRow {
        id: parse_uuid(&id, "task_assignments.id")?,
        parent_assignment_id,
        lineage,
    }))
}

/// Active vessels in `group_id` and every active descendant group.
fn subtree_yacht_ids(conn: &Connection, group_id: GroupId) -> RepoResult<Vec<YachtId>> {
    let mut stmt = conn.prepare(
        "WITH RECURSIVE subtree(id) AS (
            SELECT ?1
            UNION
            SELECT g.id
            FROM fleet_groups g
            INNER JOIN subtree s ON g.parent_id = s.id
            WHERE g.archived_at IS NULL
        )
        SELECT y.id
        FROM yachts y
        INNER JOIN subtree s ON s.id = y.group_id
        WHERE y.archived_at IS NULL
        ORDER BY y.id ASC;",
    )?;
    let mut rows = stmt.query([group_id.to_string()])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_uuid(&value, "yachts.id")?);
    }
    Ok(ids)
}

/// Active templates under `category_id` and its active descendants.
fn subtree_template_ids(conn: &Connection, category_id: CategoryId) -> RepoResult<Vec<TemplateId>> {
    let mut stmt = conn.prepare(
        "WITH RECURSIVE subtree(id) AS (
            SELECT ?1
            UNION
            SELECT c.id
            FROM global_categories c
            INNER JOIN subtree s ON c.parent_category_id = s.id
            WHERE c.archived_at IS NULL
        )
        SELECT t.id
        FROM task_templates t
        INNER JOIN subtree s ON s.id = t.global_category_id
        WHERE t.archived_at IS NULL
        ORDER BY t.name COLLATE NOCASE ASC, t.id ASC;",
    )?;
    let mut rows = stmt.query([category_id.to_string()])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_uuid(&value, "task_templates.id")?);
    }
    Ok(ids)
}

fn ensure_active(
    conn: &Connection,
    table: &'static str,
    entity: &'static str,
    id: Uuid,
) -> RepoResult<()> {
    let exists: i64 = conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1 AND archived_at IS NULL);"),
        [id.to_string()],
        |row| row.get(0),
    )?;
    if exists != 1 {
        return Err(RepoError::not_found(entity, id));
    }
    Ok(())
}

fn active_yacht_group(conn: &Connection, yacht_id: YachtId) -> RepoResult<GroupId> {
    let group_id: Option<String> = conn
        .query_row(
            "SELECT group_id FROM yachts WHERE id = ?1 AND archived_at IS NULL;",
            [yacht_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match group_id {
        Some(value) => parse_uuid(&value, "yachts.group_id"),
        None => Err(RepoError::not_found("yacht", yacht_id)),
    }
}

pub(crate) fn load_assignment(
    conn: &Connection,
    id: AssignmentId,
) -> RepoResult<Option<TaskAssignment>> {
    let mut stmt = conn.prepare(&format!("{ASSIGNMENT_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    match rows.next()? {
        Some(row) => Ok(Some(parse_assignment_row(row)?)),
        None => Ok(None),
    }
}

fn parse_assignment_row(row: &Row<'_>) -> RepoResult<TaskAssignment> {
    let id = uuid_column(row, "id")?;
    let scope = AssignmentScope::from_columns(
        optional_uuid_column(row, "group_id")?,
        optional_uuid_column(row, "yacht_id")?,
    )
    .ok_or_else(|| {
        RepoError::InvalidData(format!(
            "assignment {id} must have exactly one of group_id and yacht_id"
        ))
    })?;
    let assignment = TaskAssignment {
        id,
        template_id: optional_uuid_column(row, "template_id")?,
        parent_assignment_id: optional_uuid_column(row, "parent_assignment_id")?,
        scope,
        name: row.get("name")?,
        description: row.get("description")?,
        period: row.get("period")?,
        config: json_object_column(row, "config")?,
        is_override: bool_column(row, "is_override")?,
        archived_at: row.get("archived_at")?,
    };
    assignment.validate()?;
    Ok(assignment)
}
