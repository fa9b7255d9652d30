//! Store contracts and the SQLite reference store.
//!
//! # Responsibility
//! - Express the external data service contract as repository traits: read
//!   queries with equality filters and bounded row limits, plus the named
//!   propagation / fork / incident procedures.
//! - Decode rows into typed entities at the boundary.
//!
//! # Invariants
//! - Every procedure is all-or-nothing (one immediate transaction).
//! - Store refusals surface as `RepoError::Rejected` with the store's
//!   literal message.
//! - Read paths reject invalid persisted state instead of masking it.

pub mod assignment_repo;
pub mod blueprint_repo;
pub mod directory_repo;
mod error;
pub mod incident_repo;
mod rows;

pub use error::{RepoError, RepoResult};
pub(crate) use rows::now_epoch_ms;
