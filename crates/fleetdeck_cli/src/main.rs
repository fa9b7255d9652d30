//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `fleetdeck_core` linkage.
//! - Exercise one propagation against an in-memory store and print the
//!   resulting directory tree.
//! - Keep output deterministic apart from generated ids.

use fleetdeck_core::db::open_db_in_memory;
use fleetdeck_core::repo::blueprint_repo::{NewTemplate, SqliteBlueprintRepository};
use fleetdeck_core::repo::directory_repo::SqliteDirectoryRepository;
use fleetdeck_core::service::directory_service::DirectoryService;
use fleetdeck_core::{decode_optional_payload, AssignmentRepository, SqliteAssignmentRepository};
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("fleetdeck_core ping={}", fleetdeck_core::ping());
    println!("fleetdeck_core version={}", fleetdeck_core::core_version());

    match probe_propagation() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("fleetdeck_core probe=error error={err}");
            ExitCode::FAILURE
        }
    }
}

fn probe_propagation() -> Result<(), Box<dyn Error>> {
    let conn = open_db_in_memory()?;

    let directory = SqliteDirectoryRepository::try_new(&conn)?;
    let riviera = directory.insert_group(None, "Riviera")?;
    let antibes = directory.insert_group(Some(riviera.id), "Antibes")?;
    directory.insert_yacht(riviera.id, "Aurora")?;
    directory.insert_yacht(antibes.id, "Bella")?;

    let blueprints = SqliteBlueprintRepository::try_new(&conn)?;
    let engine = blueprints.insert_category(None, "Engine")?;
    let template = blueprints.insert_template(
        engine.id,
        &NewTemplate {
            name: "Impeller swap".to_string(),
            period: Some("yearly".to_string()),
            metadata: decode_optional_payload("metadata", Some(r#"{"hours": 500}"#))?,
            ..NewTemplate::default()
        },
    )?;

    let summary = SqliteAssignmentRepository::try_new(&conn)?.assign_template_to_group(
        template.id,
        riviera.id,
        false,
    )?;
    println!(
        "fleetdeck_core probe=propagation rows_written={}",
        summary.rows_written()
    );

    let tree = DirectoryService::new(directory).directory_tree(false)?;
    for row in tree.rows() {
        println!("{}{}", "  ".repeat(row.depth), row.label);
    }
    Ok(())
}
