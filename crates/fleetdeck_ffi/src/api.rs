//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level functions to Dart via FRB.
//! - Translate core errors into plain response envelopes.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Store refusals are returned with the store's literal message.
//! - Ids cross the boundary as UUID strings; tree nodes carry prefixed keys.

use fleetdeck_core::db::open_db;
use fleetdeck_core::model::directory::UserRole;
use fleetdeck_core::repo::directory_repo::{DirectoryRepository, SqliteDirectoryRepository};
use fleetdeck_core::repo::incident_repo::SqliteIncidentRepository;
use fleetdeck_core::service::assignment_service::AssignmentService;
use fleetdeck_core::service::blueprint_service::fetch_blueprint_tree;
use fleetdeck_core::service::directory_service::fetch_directory_tree;
use fleetdeck_core::service::incident_service::IncidentService;
use fleetdeck_core::service::snapshot_loader::{PartialTree, SnapshotError};
use fleetdeck_core::tree::TreeKey;
use fleetdeck_core::{
    core_version as core_version_inner, decode_structured_payload,
    init_logging as init_logging_inner, ping as ping_inner, Actor, AssignmentRepository,
    AssignmentScope, Confirmation, ConsoleConfig, PropagationSelection, PropagationService,
    PropagationSummary, RepoResult, ScopeTarget, SessionContext, SqliteAssignmentRepository,
};
use log::warn;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::OnceLock;
use uuid::Uuid;

const DB_FILE_NAME: &str = "fleetdeck.sqlite3";
static DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static CONSOLE_CONFIG: OnceLock<ConsoleConfig> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Reconfiguration attempts with different level or directory return error.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// One display row of a tree screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRowItem {
    /// Prefixed key, e.g. `group:<uuid>`.
    pub node_id: String,
    /// `group|yacht|category|template`.
    pub kind: String,
    pub label: String,
    pub depth: u32,
    pub has_children: bool,
}

/// Tree screen response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeResponse {
    pub ok: bool,
    pub rows: Vec<TreeRowItem>,
    /// Fetches that had not answered when the tree was built.
    pub pending: Vec<String>,
    pub message: String,
}

impl TreeResponse {
    fn from_partial(partial: PartialTree) -> Self {
        let rows = partial
            .tree
            .rows()
            .iter()
            .map(|row| TreeRowItem {
                node_id: row.id.clone(),
                kind: node_kind(&row.id).to_string(),
                label: row.label.clone(),
                depth: u32::try_from(row.depth).unwrap_or(u32::MAX),
                has_children: row.has_children,
            })
            .collect::<Vec<_>>();
        let message = if partial.is_complete() {
            format!("Loaded {} row(s).", rows.len())
        } else {
            format!(
                "Loaded {} row(s); still waiting on {}.",
                rows.len(),
                partial.pending.join(", ")
            )
        };
        Self {
            ok: true,
            rows,
            pending: partial.pending.iter().map(|name| name.to_string()).collect(),
            message,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            rows: Vec::new(),
            pending: Vec::new(),
            message: message.into(),
        }
    }
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub ok: bool,
    /// Id of the created or updated record.
    pub id: Option<String>,
    pub message: String,
}

impl ActionResponse {
    fn success(message: impl Into<String>, id: Option<String>) -> Self {
        Self {
            ok: true,
            id,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id: None,
            message: message.into(),
        }
    }
}

/// Propagation response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationResponse {
    pub ok: bool,
    pub rows_written: u32,
    pub rows_kept: u32,
    pub message: String,
}

impl PropagationResponse {
    fn from_summary(summary: PropagationSummary) -> Self {
        Self {
            ok: true,
            rows_written: summary.rows_written(),
            rows_kept: summary.vessel_rows_kept,
            message: format!(
                "Applied {} template(s); {} row(s) written, {} kept.",
                summary.templates,
                summary.rows_written(),
                summary.vessel_rows_kept
            ),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            rows_written: 0,
            rows_kept: 0,
            message: message.into(),
        }
    }
}

/// Confirmation shown before a propagation is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationResponse {
    pub ok: bool,
    pub scope_label: String,
    /// `1` for a single template; absent for a category subtree.
    pub template_count: Option<u32>,
    /// `1` for a vessel scope; absent for a group scope.
    pub affected_vessels: Option<u32>,
    /// Rows already attached to the scope for the selected template.
    pub existing_matches: Option<u32>,
    /// Whether `override_existing` would replace rows visible to this scope.
    pub override_conflict: bool,
    pub message: String,
}

impl ConfirmationResponse {
    fn from_confirmation(confirmation: Confirmation) -> Self {
        Self {
            ok: true,
            override_conflict: confirmation.has_override_conflict(),
            message: format!("Apply to {}?", confirmation.scope_label),
            scope_label: confirmation.scope_label,
            template_count: confirmation.template_count,
            affected_vessels: confirmation.affected_vessels,
            existing_matches: confirmation.existing_matches,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            scope_label: String::new(),
            template_count: None,
            affected_vessels: None,
            existing_matches: None,
            override_conflict: false,
            message: message.into(),
        }
    }
}

/// Directory tree: groups with vessels as leaves.
///
/// # FFI contract
/// - Sync call, DB-backed; waits at most the configured fetch window.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn directory_tree(include_archived: bool) -> TreeResponse {
    tree_response(
        "directory_tree",
        fetch_directory_tree(&resolve_db_path(), console_config(), include_archived),
    )
}

/// Blueprint tree: categories with templates as leaves.
#[flutter_rust_bridge::frb(sync)]
pub fn blueprint_tree(include_archived: bool) -> TreeResponse {
    tree_response(
        "blueprint_tree",
        fetch_blueprint_tree(&resolve_db_path(), console_config(), include_archived),
    )
}

/// Propagates one template into a group or vessel scope.
///
/// Input semantics:
/// - `scope_node_id`: directory tree key, `group:<uuid>` or `yacht:<uuid>`.
/// - `acting_user_id`: the store refuses scopes this user cannot access.
///
/// # FFI contract
/// - Sync call, DB-backed, all-or-nothing.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn assign_template(
    scope_node_id: String,
    template_id: String,
    acting_user_id: String,
    override_existing: bool,
) -> PropagationResponse {
    let scope = match parse_scope(&scope_node_id) {
        Ok(scope) => scope,
        Err(message) => return PropagationResponse::failure(message),
    };
    let template_id = match parse_id("template_id", &template_id) {
        Ok(id) => id,
        Err(message) => return PropagationResponse::failure(message),
    };
    let user_id = match parse_id("acting_user_id", &acting_user_id) {
        Ok(id) => id,
        Err(message) => return PropagationResponse::failure(message),
    };

    let result = with_assignment_repo(user_id, |repo| match scope {
        AssignmentScope::Group(group_id) => {
            repo.assign_template_to_group(template_id, group_id, override_existing)
        }
        AssignmentScope::Yacht(yacht_id) => {
            repo.assign_template_to_yacht(template_id, yacht_id, override_existing)
        }
    });
    match result {
        Ok(summary) => PropagationResponse::from_summary(summary),
        Err(message) => PropagationResponse::failure(message),
    }
}

/// Propagates every active template below a category into a group.
#[flutter_rust_bridge::frb(sync)]
pub fn assign_category_subtree(
    group_id: String,
    category_id: String,
    acting_user_id: String,
    override_existing: bool,
) -> PropagationResponse {
    let ids = parse_id("group_id", &group_id).and_then(|group_id| {
        let category_id = parse_id("category_id", &category_id)?;
        let user_id = parse_id("acting_user_id", &acting_user_id)?;
        Ok((group_id, category_id, user_id))
    });
    let (group_id, category_id, user_id) = match ids {
        Ok(ids) => ids,
        Err(message) => return PropagationResponse::failure(message),
    };

    match with_assignment_repo(user_id, |repo| {
        repo.assign_category_subtree_to_group(category_id, group_id, override_existing)
    }) {
        Ok(summary) => PropagationResponse::from_summary(summary),
        Err(message) => PropagationResponse::failure(message),
    }
}

/// Builds the confirmation for propagating a template or category subtree
/// into a scope, without writing anything.
///
/// Input semantics:
/// - `scope_node_id`: `group:<uuid>` or `yacht:<uuid>`.
/// - `selection_node_id`: `template:<uuid>` or `category:<uuid>`; a category
///   under a yacht scope is refused.
///
/// # FFI contract
/// - Sync call, read-only.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn preview_assignment(scope_node_id: String, selection_node_id: String) -> ConfirmationResponse {
    let scope = match parse_scope(&scope_node_id) {
        Ok(scope) => scope,
        Err(message) => return ConfirmationResponse::failure(message),
    };
    let selection = match TreeKey::parse(selection_node_id.trim()) {
        Some(TreeKey::Template(id)) => PropagationSelection::Template(id),
        Some(TreeKey::Category(id)) => PropagationSelection::Subtree(id),
        _ => {
            return ConfirmationResponse::failure(format!(
                "selection must be a template or category node, got `{}`",
                selection_node_id.trim()
            ))
        }
    };

    let result = with_connection(|conn| {
        let label = scope_label(conn, scope)?;
        let repo = SqliteAssignmentRepository::try_new(conn)
            .map_err(|err| format!("assignment repo init failed: {err}"))?
            .with_limits(console_config().row_limits);
        let mut planner = PropagationService::new(repo);
        planner
            .choose_scope(ScopeTarget { scope, label })
            .map_err(|err| err.to_string())?;
        planner
            .choose_selection(selection)
            .map_err(|err| err.to_string())?;
        planner.start().cloned().map_err(|err| err.to_string())
    });
    match result {
        Ok(confirmation) => ConfirmationResponse::from_confirmation(confirmation),
        Err(message) => ConfirmationResponse::failure(message),
    }
}

/// Forks an inherited vessel assignment into an override.
#[flutter_rust_bridge::frb(sync)]
pub fn fork_assignment(assignment_id: String, acting_user_id: String) -> ActionResponse {
    let ids = parse_id("assignment_id", &assignment_id).and_then(|assignment_id| {
        Ok((assignment_id, parse_id("acting_user_id", &acting_user_id)?))
    });
    let (assignment_id, user_id) = match ids {
        Ok(ids) => ids,
        Err(message) => return ActionResponse::failure(message),
    };

    let result = with_connection(|conn| {
        let repo = SqliteAssignmentRepository::try_new(conn)
            .map_err(|err| format!("assignment repo init failed: {err}"))?
            .with_limits(console_config().row_limits)
            .with_actor(user_id);
        AssignmentService::new(repo)
            .fork_by_id(assignment_id)
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(fork_id) => ActionResponse::success("Override created.", Some(fork_id.to_string())),
        Err(message) => ActionResponse::failure(message),
    }
}

/// Completes a pending incident as `acting_user_id`.
///
/// # FFI contract
/// - The completion time is taken from the core clock, never from Dart.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn complete_incident(incident_id: String, acting_user_id: String) -> ActionResponse {
    let ids = parse_id("incident_id", &incident_id).and_then(|incident_id| {
        Ok((incident_id, parse_id("acting_user_id", &acting_user_id)?))
    });
    let (incident_id, user_id) = match ids {
        Ok(ids) => ids,
        Err(message) => return ActionResponse::failure(message),
    };

    let result = with_connection(|conn| {
        let session = SessionContext::new(load_actor(conn, user_id)?);
        let repo = SqliteIncidentRepository::try_new(conn)
            .map_err(|err| format!("incident repo init failed: {err}"))?;
        IncidentService::new(repo)
            .complete(&session, incident_id)
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(incident) => {
            ActionResponse::success("Incident completed.", Some(incident.id.to_string()))
        }
        Err(message) => ActionResponse::failure(message),
    }
}

/// Cancels a pending incident.
#[flutter_rust_bridge::frb(sync)]
pub fn cancel_incident(incident_id: String) -> ActionResponse {
    let incident_id = match parse_id("incident_id", &incident_id) {
        Ok(id) => id,
        Err(message) => return ActionResponse::failure(message),
    };

    let result = with_connection(|conn| {
        let repo = SqliteIncidentRepository::try_new(conn)
            .map_err(|err| format!("incident repo init failed: {err}"))?;
        IncidentService::new(repo)
            .cancel(incident_id)
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(incident) => {
            ActionResponse::success("Incident cancelled.", Some(incident.id.to_string()))
        }
        Err(message) => ActionResponse::failure(message),
    }
}

/// Checks a free-text JSON field before submission.
///
/// Input semantics:
/// - `field`: `config|metadata`; anything else is reported as `payload`.
/// - Blank `raw` is accepted as an empty object.
#[flutter_rust_bridge::frb(sync)]
pub fn validate_structured_payload(field: String, raw: String) -> ActionResponse {
    let field = match field.trim() {
        "config" => "config",
        "metadata" => "metadata",
        _ => "payload",
    };
    match decode_structured_payload(field, &raw) {
        Ok(_) => ActionResponse::success("Valid.", None),
        Err(err) => ActionResponse::failure(err.to_string()),
    }
}

/// Whether `role` unlocks privileged incident tools.
#[flutter_rust_bridge::frb(sync)]
pub fn role_shows_privileged_tools(role: String) -> bool {
    UserRole::parse(role.trim()).is_some_and(UserRole::is_privileged)
}

fn tree_response(
    operation: &'static str,
    result: Result<PartialTree, SnapshotError>,
) -> TreeResponse {
    match result {
        Ok(partial) => {
            if !partial.is_complete() {
                warn!(
                    "event=tree_partial module=ffi status=ok operation={operation} pending={}",
                    partial.pending.len()
                );
            }
            TreeResponse::from_partial(partial)
        }
        Err(err) => TreeResponse::failure(format!("{operation} failed: {err}")),
    }
}

fn node_kind(node_id: &str) -> &'static str {
    match TreeKey::parse(node_id) {
        Some(TreeKey::Group(_)) => "group",
        Some(TreeKey::Yacht(_)) => "yacht",
        Some(TreeKey::Category(_)) => "category",
        Some(TreeKey::Template(_)) => "template",
        None => "unknown",
    }
}

fn parse_scope(node_id: &str) -> Result<AssignmentScope, String> {
    match TreeKey::parse(node_id.trim()) {
        Some(TreeKey::Group(id)) => Ok(AssignmentScope::Group(id)),
        Some(TreeKey::Yacht(id)) => Ok(AssignmentScope::Yacht(id)),
        _ => Err(format!(
            "scope must be a group or yacht node, got `{}`",
            node_id.trim()
        )),
    }
}

fn parse_id(field: &str, raw: &str) -> Result<Uuid, String> {
    Uuid::parse_str(raw.trim()).map_err(|_| format!("{field} must be a UUID"))
}

fn scope_label(conn: &Connection, scope: AssignmentScope) -> Result<String, String> {
    let repo = SqliteDirectoryRepository::try_new(conn)
        .map_err(|err| format!("directory repo init failed: {err}"))?;
    let (name, key) = match scope {
        AssignmentScope::Group(id) => (
            repo.get_group(id)
                .map_err(|err| err.to_string())?
                .map(|group| group.name),
            TreeKey::Group(id),
        ),
        AssignmentScope::Yacht(id) => (
            repo.get_yacht(id)
                .map_err(|err| err.to_string())?
                .map(|yacht| yacht.name),
            TreeKey::Yacht(id),
        ),
    };
    name.ok_or_else(|| format!("scope not found: {}", key.node_id()))
}

fn load_actor(conn: &Connection, user_id: Uuid) -> Result<Option<Actor>, String> {
    let repo = SqliteDirectoryRepository::try_new(conn)
        .map_err(|err| format!("directory repo init failed: {err}"))?;
    let user = repo.get_user(user_id).map_err(|err| err.to_string())?;
    Ok(user.map(|user| Actor {
        user_id: user.id,
        role: user.role,
    }))
}

fn with_assignment_repo<T>(
    user_id: Uuid,
    f: impl FnOnce(&SqliteAssignmentRepository<'_>) -> RepoResult<T>,
) -> Result<T, String> {
    with_connection(|conn| {
        let repo = SqliteAssignmentRepository::try_new(conn)
            .map_err(|err| format!("assignment repo init failed: {err}"))?
            .with_limits(console_config().row_limits)
            .with_actor(user_id);
        f(&repo).map_err(|err| err.to_string())
    })
}

fn with_connection<T>(f: impl FnOnce(&Connection) -> Result<T, String>) -> Result<T, String> {
    let conn =
        open_db(resolve_db_path()).map_err(|err| format!("fleet store open failed: {err}"))?;
    f(&conn)
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var("FLEETDECK_DB_PATH") {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DB_FILE_NAME)
        })
        .clone()
}

/// Console configuration from `FLEETDECK_CONFIG_PATH`, falling back to
/// defaults when unset or unreadable.
fn console_config() -> &'static ConsoleConfig {
    CONSOLE_CONFIG.get_or_init(|| {
        let Ok(raw) = std::env::var("FLEETDECK_CONFIG_PATH") else {
            return ConsoleConfig::default();
        };
        ConsoleConfig::load(raw.trim()).unwrap_or_else(|err| {
            warn!("event=config_load module=ffi status=error error={err}");
            ConsoleConfig::default()
        })
    })
}
