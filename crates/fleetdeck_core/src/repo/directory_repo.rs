//! Directory queries: groups, vessels, users, roles and group access.
//!
//! # Invariants
//! - Group and vessel lists order by `name COLLATE NOCASE, id`.
//! - Accessible groups include every descendant of a membership group.

use super::rows::{ensure_connection_ready, optional_uuid_column, uuid_column};
use super::{RepoError, RepoResult};
use crate::config::{EntityKind, RowLimits};
use crate::model::directory::{Group, GroupId, Role, User, UserId, UserRole, Yacht, YachtId};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

const GROUP_SELECT_SQL: &str = "SELECT id, parent_id, name, archived_at FROM fleet_groups";
const YACHT_SELECT_SQL: &str = "SELECT id, group_id, name, archived_at FROM yachts";
const USER_SELECT_SQL: &str = "SELECT id, email, display_name, role FROM users";

/// Filters for group listing.
#[derive(Debug, Clone, Default)]
pub struct GroupListQuery {
    pub parent_id: Option<GroupId>,
    pub include_archived: bool,
    pub limit: Option<u32>,
}

/// Filters for vessel listing.
#[derive(Debug, Clone, Default)]
pub struct YachtListQuery {
    pub group_id: Option<GroupId>,
    pub include_archived: bool,
    pub limit: Option<u32>,
}

/// Directory read contract.
pub trait DirectoryRepository {
    fn list_groups(&self, query: &GroupListQuery) -> RepoResult<Vec<Group>>;
    fn get_group(&self, id: GroupId) -> RepoResult<Option<Group>>;
    fn list_yachts(&self, query: &YachtListQuery) -> RepoResult<Vec<Yacht>>;
    fn get_yacht(&self, id: YachtId) -> RepoResult<Option<Yacht>>;
    fn list_users(&self, limit: Option<u32>) -> RepoResult<Vec<User>>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn list_roles(&self, limit: Option<u32>) -> RepoResult<Vec<Role>>;
    /// Groups the user may act on: memberships plus their descendants.
    fn list_accessible_groups_for_user(&self, user_id: UserId) -> RepoResult<Vec<Group>>;
}

/// SQLite-backed directory repository.
pub struct SqliteDirectoryRepository<'conn> {
    conn: &'conn Connection,
    limits: RowLimits,
}

impl<'conn> SqliteDirectoryRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["fleet_groups", "yachts", "users", "roles", "group_members"])?;
        Ok(Self {
            conn,
            limits: RowLimits::default(),
        })
    }

    pub fn with_limits(mut self, limits: RowLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Inserts one group. Used to seed the reference store.
    pub fn insert_group(&self, parent_id: Option<GroupId>, name: &str) -> RepoResult<Group> {
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO fleet_groups (id, parent_id, name) VALUES (?1, ?2, ?3);",
            params![id.to_string(), parent_id.map(|value| value.to_string()), name],
        )?;
        self.get_group(id)?
            .ok_or_else(|| RepoError::not_found("group", id))
    }

    /// Inserts one vessel. Used to seed the reference store.
    pub fn insert_yacht(&self, group_id: GroupId, name: &str) -> RepoResult<Yacht> {
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO yachts (id, group_id, name) VALUES (?1, ?2, ?3);",
            params![id.to_string(), group_id.to_string(), name],
        )?;
        self.get_yacht(id)?
            .ok_or_else(|| RepoError::not_found("yacht", id))
    }

    /// Inserts one user. Used to seed the reference store.
    pub fn insert_user(&self, email: &str, display_name: &str, role: UserRole) -> RepoResult<User> {
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO users (id, email, display_name, role) VALUES (?1, ?2, ?3, ?4);",
            params![id.to_string(), email, display_name, role.as_str()],
        )?;
        self.get_user(id)?
            .ok_or_else(|| RepoError::not_found("user", id))
    }

    /// Grants `user_id` membership of `group_id`.
    pub fn add_member(&self, user_id: UserId, group_id: GroupId) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO group_members (user_id, group_id) VALUES (?1, ?2);",
            params![user_id.to_string(), group_id.to_string()],
        )?;
        Ok(())
    }

    fn limit(&self, kind: EntityKind, requested: Option<u32>) -> i64 {
        i64::from(self.limits.apply(kind, requested))
    }
}

impl DirectoryRepository for SqliteDirectoryRepository<'_> {
    fn list_groups(&self, query: &GroupListQuery) -> RepoResult<Vec<Group>> {
        let mut sql = format!("{GROUP_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<SqlValue> = Vec::new();
        if !query.include_archived {
            sql.push_str(" AND archived_at IS NULL");
        }
        if let Some(parent_id) = query.parent_id {
            sql.push_str(" AND parent_id = ?");
            bind_values.push(SqlValue::Text(parent_id.to_string()));
        }
        sql.push_str(" ORDER BY name COLLATE NOCASE ASC, id ASC LIMIT ?");
        bind_values.push(SqlValue::Integer(
            self.limit(EntityKind::Groups, query.limit),
        ));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut groups = Vec::new();
        while let Some(row) = rows.next()? {
            groups.push(parse_group_row(row)?);
        }
        Ok(groups)
    }

    fn get_group(&self, id: GroupId) -> RepoResult<Option<Group>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{GROUP_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_group_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_yachts(&self, query: &YachtListQuery) -> RepoResult<Vec<Yacht>> {
        let mut sql = format!("{YACHT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<SqlValue> = Vec::new();
        if !query.include_archived {
            sql.push_str(" AND archived_at IS NULL");
        }
        if let Some(group_id) = query.group_id {
            sql.push_str(" AND group_id = ?");
            bind_values.push(SqlValue::Text(group_id.to_string()));
        }
        sql.push_str(" ORDER BY name COLLATE NOCASE ASC, id ASC LIMIT ?");
        bind_values.push(SqlValue::Integer(
            self.limit(EntityKind::Yachts, query.limit),
        ));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut yachts = Vec::new();
        while let Some(row) = rows.next()? {
            yachts.push(parse_yacht_row(row)?);
        }
        Ok(yachts)
    }

    fn get_yacht(&self, id: YachtId) -> RepoResult<Option<Yacht>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{YACHT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_yacht_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_users(&self, limit: Option<u32>) -> RepoResult<Vec<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "{USER_SELECT_SQL} ORDER BY display_name COLLATE NOCASE ASC, id ASC LIMIT ?1;"
        ))?;
        let mut rows = stmt.query([self.limit(EntityKind::Users, limit)])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_user_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_roles(&self, limit: Option<u32>) -> RepoResult<Vec<Role>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, description FROM roles ORDER BY name ASC LIMIT ?1;")?;
        let mut rows = stmt.query([self.limit(EntityKind::Roles, limit)])?;
        let mut roles = Vec::new();
        while let Some(row) = rows.next()? {
            roles.push(Role {
                name: row.get("name")?,
                description: row.get("description")?,
            });
        }
        Ok(roles)
    }

    fn list_accessible_groups_for_user(&self, user_id: UserId) -> RepoResult<Vec<Group>> {
        let mut stmt = self.conn.prepare(
            "WITH RECURSIVE accessible(id) AS (
                SELECT group_id FROM group_members WHERE user_id = ?1
                UNION
                SELECT g.id
                FROM fleet_groups g
                INNER JOIN accessible a ON g.parent_id = a.id
            )
            SELECT
                g.id AS id,
                g.parent_id AS parent_id,
                g.name AS name,
                g.archived_at AS archived_at
            FROM fleet_groups g
            INNER JOIN accessible a ON a.id = g.id
            WHERE g.archived_at IS NULL
            ORDER BY g.name COLLATE NOCASE ASC, g.id ASC
            LIMIT ?2;",
        )?;
        let mut rows = stmt.query(params![
            user_id.to_string(),
            self.limit(EntityKind::Groups, None)
        ])?;
        let mut groups = Vec::new();
        while let Some(row) = rows.next()? {
            groups.push(parse_group_row(row)?);
        }
        Ok(groups)
    }
}

/// Whether `user_id` may mutate rows scoped to `group_id`: admins always,
/// others through membership of the group or one of its ancestors.
pub(crate) fn user_can_access_group(
    conn: &Connection,
    user_id: UserId,
    group_id: GroupId,
) -> RepoResult<bool> {
    let role: Option<String> = conn
        .query_row(
            "SELECT role FROM users WHERE id = ?1;",
            [user_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match role.as_deref().map(UserRole::parse) {
        None => return Ok(false),
        Some(None) => {
            return Err(RepoError::InvalidData(
                "invalid role in users.role".to_string(),
            ))
        }
        Some(Some(role)) if role.is_privileged() => return Ok(true),
        Some(Some(_)) => {}
    }

    let allowed: i64 = conn.query_row(
        "WITH RECURSIVE ancestors(id) AS (
            SELECT ?2
            UNION
            SELECT g.parent_id
            FROM fleet_groups g
            INNER JOIN ancestors a ON g.id = a.id
            WHERE g.parent_id IS NOT NULL
        )
        SELECT EXISTS(
            SELECT 1
            FROM group_members m
            INNER JOIN ancestors a ON a.id = m.group_id
            WHERE m.user_id = ?1
        );",
        params![user_id.to_string(), group_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(allowed == 1)
}

fn parse_group_row(row: &Row<'_>) -> RepoResult<Group> {
    Ok(Group {
        id: uuid_column(row, "id")?,
        parent_id: optional_uuid_column(row, "parent_id")?,
        name: row.get("name")?,
        archived_at: row.get("archived_at")?,
    })
}

fn parse_yacht_row(row: &Row<'_>) -> RepoResult<Yacht> {
    Ok(Yacht {
        id: uuid_column(row, "id")?,
        group_id: uuid_column(row, "group_id")?,
        name: row.get("name")?,
        archived_at: row.get("archived_at")?,
    })
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let role_text: String = row.get("role")?;
    let role = UserRole::parse(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid role `{role_text}` in users.role"))
    })?;
    Ok(User {
        id: uuid_column(row, "id")?,
        email: row.get("email")?,
        display_name: row.get("display_name")?,
        role,
    })
}
