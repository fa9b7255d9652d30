//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into screen-level use cases.
//! - Keep UI/FFI layers decoupled from storage details.

pub mod assignment_service;
pub mod blueprint_service;
pub mod directory_service;
pub mod incident_service;
pub mod propagation_service;
pub mod request_guard;
pub mod snapshot_loader;
