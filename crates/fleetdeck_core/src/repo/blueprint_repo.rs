//! Blueprint queries: global categories and task templates.

use super::rows::{
    ensure_connection_ready, now_epoch_ms, optional_json_column, optional_uuid_column,
    uuid_column,
};
use super::{RepoError, RepoResult};
use crate::config::{EntityKind, RowLimits};
use crate::model::blueprint::{CategoryId, GlobalCategory, TaskTemplate, TemplateId};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde_json::Value;
use uuid::Uuid;

const CATEGORY_SELECT_SQL: &str =
    "SELECT id, parent_category_id, name, archived_at FROM global_categories";
const TEMPLATE_SELECT_SQL: &str = "SELECT
    id,
    global_category_id,
    name,
    description,
    period,
    metadata,
    archived_at
FROM task_templates";

/// Filters for category listing.
#[derive(Debug, Clone, Default)]
pub struct CategoryListQuery {
    pub parent_category_id: Option<CategoryId>,
    pub include_archived: bool,
    pub limit: Option<u32>,
}

/// Filters for template listing.
#[derive(Debug, Clone, Default)]
pub struct TemplateListQuery {
    pub global_category_id: Option<CategoryId>,
    pub include_archived: bool,
    pub limit: Option<u32>,
}

/// Input for seeding one template.
#[derive(Debug, Clone, Default)]
pub struct NewTemplate {
    pub name: String,
    pub description: Option<String>,
    pub period: Option<String>,
    pub metadata: Option<Value>,
}

/// Blueprint read contract.
pub trait BlueprintRepository {
    fn list_categories(&self, query: &CategoryListQuery) -> RepoResult<Vec<GlobalCategory>>;
    fn list_templates(&self, query: &TemplateListQuery) -> RepoResult<Vec<TaskTemplate>>;
    fn get_template(&self, id: TemplateId) -> RepoResult<Option<TaskTemplate>>;
}

/// SQLite-backed blueprint repository.
pub struct SqliteBlueprintRepository<'conn> {
    conn: &'conn Connection,
    limits: RowLimits,
}

impl<'conn> SqliteBlueprintRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["global_categories", "task_templates"])?;
        Ok(Self {
            conn,
            limits: RowLimits::default(),
        })
    }

    pub fn with_limits(mut self, limits: RowLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Inserts one category. Used to seed the reference store.
    pub fn insert_category(
        &self,
        parent_category_id: Option<CategoryId>,
        name: &str,
    ) -> RepoResult<GlobalCategory> {
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO global_categories (id, parent_category_id, name) VALUES (?1, ?2, ?3);",
            params![
                id.to_string(),
                parent_category_id.map(|value| value.to_string()),
                name
            ],
        )?;
        Ok(GlobalCategory {
            id,
            parent_category_id,
            name: name.to_string(),
            archived_at: None,
        })
    }

    /// Marks one category archived.
    pub fn archive_category(&self, id: CategoryId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE global_categories
             SET archived_at = ?2
             WHERE id = ?1
               AND archived_at IS NULL;",
            params![id.to_string(), now_epoch_ms()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("category", id));
        }
        Ok(())
    }

    /// Inserts one template. Used to seed the reference store.
    pub fn insert_template(
        &self,
        global_category_id: CategoryId,
        template: &NewTemplate,
    ) -> RepoResult<TaskTemplate> {
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO task_templates (
                id,
                global_category_id,
                name,
                description,
                period,
                metadata
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                id.to_string(),
                global_category_id.to_string(),
                template.name.as_str(),
                template.description.as_deref(),
                template.period.as_deref(),
                template.metadata.as_ref().map(Value::to_string),
            ],
        )?;
        self.get_template(id)?
            .ok_or_else(|| RepoError::not_found("template", id))
    }
}

impl BlueprintRepository for SqliteBlueprintRepository<'_> {
    fn list_categories(&self, query: &CategoryListQuery) -> RepoResult<Vec<GlobalCategory>> {
        let mut sql = format!("{CATEGORY_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<SqlValue> = Vec::new();
        if !query.include_archived {
            sql.push_str(" AND archived_at IS NULL");
        }
        if let Some(parent_id) = query.parent_category_id {
            sql.push_str(" AND parent_category_id = ?");
            bind_values.push(SqlValue::Text(parent_id.to_string()));
        }
        sql.push_str(" ORDER BY name COLLATE NOCASE ASC, id ASC LIMIT ?");
        bind_values.push(SqlValue::Integer(i64::from(
            self.limits.apply(EntityKind::Categories, query.limit),
        )));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut categories = Vec::new();
        while let Some(row) = rows.next()? {
            categories.push(parse_category_row(row)?);
        }
        Ok(categories)
    }

    fn list_templates(&self, query: &TemplateListQuery) -> RepoResult<Vec<TaskTemplate>> {
        let mut sql = format!("{TEMPLATE_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<SqlValue> = Vec::new();
        if !query.include_archived {
            sql.push_str(" AND archived_at IS NULL");
        }
        if let Some(category_id) = query.global_category_id {
            sql.push_str(" AND global_category_id = ?");
            bind_values.push(SqlValue::Text(category_id.to_string()));
        }
        sql.push_str(" ORDER BY name COLLATE NOCASE ASC, id ASC LIMIT ?");
        bind_values.push(SqlValue::Integer(i64::from(
            self.limits.apply(EntityKind::Templates, query.limit),
        )));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut templates = Vec::new();
        while let Some(row) = rows.next()? {
            templates.push(parse_template_row(row)?);
        }
        Ok(templates)
    }

    fn get_template(&self, id: TemplateId) -> RepoResult<Option<TaskTemplate>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TEMPLATE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_template_row(row)?)),
            None => Ok(None),
        }
    }
}

fn parse_category_row(row: &Row<'_>) -> RepoResult<GlobalCategory> {
    Ok(GlobalCategory {
        id: uuid_column(row, "id")?,
        parent_category_id: optional_uuid_column(row, "parent_category_id")?,
        name: row.get("name")?,
        archived_at: row.get("archived_at")?,
    })
}

pub(crate) fn parse_template_row(row: &Row<'_>) -> RepoResult<TaskTemplate> {
    Ok(TaskTemplate {
        id: uuid_column(row, "id")?,
        global_category_id: uuid_column(row, "global_category_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        period: row.get("period")?,
        metadata: optional_json_column(row, "metadata")?,
        archived_at: row.get("archived_at")?,
    })
}
