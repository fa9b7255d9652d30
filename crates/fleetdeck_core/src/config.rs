//! Console configuration.
//!
//! # Responsibility
//! - Hold the bounded fetch wait and per-entity row caps used by screens and
//!   repositories.
//! - Decode configuration from JSON with defaults for missing fields.
//!
//! # Invariants
//! - Row caps and the fetch wait are always non-zero after validation.

use crate::logging::{default_log_level, LogLevel};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;

const DEFAULT_FETCH_WAIT_MS: u64 = 8_000;

/// Entity families served by the store's read queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Groups,
    Yachts,
    Categories,
    Templates,
    Assignments,
    Incidents,
    Users,
    Roles,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Groups => "groups",
            Self::Yachts => "yachts",
            Self::Categories => "categories",
            Self::Templates => "templates",
            Self::Assignments => "assignments",
            Self::Incidents => "incidents",
            Self::Users => "users",
            Self::Roles => "roles",
        }
    }
}

/// Upper bound on rows returned by one read query, per entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RowLimits {
    pub groups: u32,
    pub yachts: u32,
    pub categories: u32,
    pub templates: u32,
    pub assignments: u32,
    pub incidents: u32,
    pub users: u32,
    pub roles: u32,
}

impl Default for RowLimits {
    fn default() -> Self {
        Self {
            groups: 1_000,
            yachts: 1_000,
            categories: 1_000,
            templates: 5_000,
            assignments: 10_000,
            incidents: 10_000,
            users: 1_000,
            roles: 1_000,
        }
    }
}

impl RowLimits {
    pub fn cap(&self, kind: EntityKind) -> u32 {
        match kind {
            EntityKind::Groups => self.groups,
            EntityKind::Yachts => self.yachts,
            EntityKind::Categories => self.categories,
            EntityKind::Templates => self.templates,
            EntityKind::Assignments => self.assignments,
            EntityKind::Incidents => self.incidents,
            EntityKind::Users => self.users,
            EntityKind::Roles => self.roles,
        }
    }

    /// Effective limit for one query: the cap when absent, zero or larger.
    pub fn apply(&self, kind: EntityKind, requested: Option<u32>) -> u32 {
        let cap = self.cap(kind);
        match requested {
            Some(value) if value > 0 && value < cap => value,
            _ => cap,
        }
    }

    fn first_zero(&self) -> Option<EntityKind> {
        [
            EntityKind::Groups,
            EntityKind::Yachts,
            EntityKind::Categories,
            EntityKind::Templates,
            EntityKind::Assignments,
            EntityKind::Incidents,
            EntityKind::Users,
            EntityKind::Roles,
        ]
        .into_iter()
        .find(|kind| self.cap(*kind) == 0)
    }
}

/// Top-level console configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsoleConfig {
    pub log_level: String,
    /// How long a screen waits for its concurrent fetches before rendering
    /// best-effort.
    pub fetch_wait_ms: u64,
    pub row_limits: RowLimits,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            fetch_wait_ms: DEFAULT_FETCH_WAIT_MS,
            row_limits: RowLimits::default(),
        }
    }
}

impl ConsoleConfig {
    /// Parses and validates JSON configuration.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    pub fn fetch_wait(&self) -> Duration {
        Duration::from_millis(self.fetch_wait_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        LogLevel::parse(&self.log_level).map_err(ConfigError::Invalid)?;
        if self.fetch_wait_ms == 0 {
            return Err(ConfigError::Invalid(
                "fetch_wait_ms must be greater than zero".to_string(),
            ));
        }
        if let Some(kind) = self.row_limits.first_zero() {
            return Err(ConfigError::Invalid(format!(
                "row_limits.{} must be greater than zero",
                kind.as_str()
            )));
        }
        Ok(())
    }
}

/// Configuration load failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Io { path: String, message: String },
    Parse(String),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "failed to read config `{path}`: {message}"),
            Self::Parse(message) => write!(f, "invalid config JSON: {message}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ConsoleConfig, EntityKind, RowLimits};
    use std::io::Write;

    #[test]
    fn missing_fields_take_defaults() {
        let config =
            ConsoleConfig::from_json_str(r#"{"row_limits": {"templates": 200}}"#).expect("parse");
        assert_eq!(config.fetch_wait_ms, 8_000);
        assert_eq!(config.row_limits.templates, 200);
        assert_eq!(config.row_limits.assignments, 10_000);
    }

    #[test]
    fn apply_clamps_to_cap() {
        let limits = RowLimits::default();
        assert_eq!(limits.apply(EntityKind::Groups, None), 1_000);
        assert_eq!(limits.apply(EntityKind::Groups, Some(0)), 1_000);
        assert_eq!(limits.apply(EntityKind::Groups, Some(50)), 50);
        assert_eq!(limits.apply(EntityKind::Groups, Some(50_000)), 1_000);
    }

    #[test]
    fn zero_values_are_rejected() {
        let err = ConsoleConfig::from_json_str(r#"{"row_limits": {"roles": 0}}"#)
            .expect_err("zero cap must fail");
        assert_eq!(
            err,
            ConfigError::Invalid("row_limits.roles must be greater than zero".to_string())
        );
        assert!(ConsoleConfig::from_json_str(r#"{"fetch_wait_ms": 0}"#).is_err());
    }

    #[test]
    fn unsupported_log_level_is_rejected() {
        let err = ConsoleConfig::from_json_str(r#"{"log_level": "chatty"}"#)
            .expect_err("unknown level must fail");
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(ConsoleConfig::from_json_str(r#"{"log_level": "WARN"}"#).is_ok());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = ConsoleConfig::from_json_str(r#"{"fetch_wait": 10}"#)
            .expect_err("unknown field must fail");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"fetch_wait_ms": 250}}"#).expect("write config");
        let config = ConsoleConfig::load(file.path()).expect("load");
        assert_eq!(config.fetch_wait().as_millis(), 250);
    }
}
