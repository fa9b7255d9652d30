//! Core domain logic for the FleetDeck operations console.
//! This crate is the single source of truth for tree, propagation and
//! incident invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod session;
pub mod tree;

pub use config::{ConfigError, ConsoleConfig, EntityKind, RowLimits};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LogLevel,
    LogSettings,
};
pub use model::assignment::{
    classify_lineage, AssignmentId, AssignmentScope, AssignmentValidationError, Lineage,
    ScopeKind, TaskAssignment,
};
pub use model::incident::{IncidentId, IncidentStatus, TaskIncident};
pub use model::payload::{decode_optional_payload, decode_structured_payload, PayloadError};
pub use repo::assignment_repo::{
    AssignmentListQuery, AssignmentRepository, PropagationSummary, SqliteAssignmentRepository,
};
pub use repo::{RepoError, RepoResult};
pub use service::propagation_service::{
    Confirmation, PlannerError, PlannerPhase, PropagationSelection, PropagationService,
    ScopeTarget,
};
pub use session::{Actor, Notice, NoticeLevel, SessionContext};
pub use tree::{TreeError, TreeSnapshot};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
