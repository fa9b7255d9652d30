//! Typed fleet entities decoded from the external store.
//!
//! # Responsibility
//! - Define canonical records for directory, blueprint, assignment and
//!   incident data.
//! - Keep derived classifications (lineage, terminal status) as pure
//!   functions of stored fields.
//!
//! # Invariants
//! - Every entity is identified by a stable UUID.
//! - Archival is a timestamp marker, never a hard delete.

pub mod assignment;
pub mod blueprint;
pub mod directory;
pub mod incident;
pub mod payload;
