//! Ordered schema scripts for the fleet store.
//!
//! # Invariants
//! - Versions increase by one, starting at 1.
//! - A batch of pending scripts commits together or not at all.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: [Migration; 3] = [
    Migration {
        version: 1,
        name: "directory",
        sql: include_str!("0001_directory.sql"),
    },
    Migration {
        version: 2,
        name: "blueprints",
        sql: include_str!("0002_blueprints.sql"),
    },
    Migration {
        version: 3,
        name: "assignments",
        sql: include_str!("0003_assignments.sql"),
    },
];

/// Schema version of a connection relative to this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaStatus {
    pub current: u32,
    pub latest: u32,
}

impl SchemaStatus {
    pub fn is_current(&self) -> bool {
        self.current == self.latest
    }

    fn pending(&self) -> impl Iterator<Item = &'static Migration> + '_ {
        MIGRATIONS
            .iter()
            .filter(move |migration| migration.version > self.current)
    }
}

/// Newest schema version this build can write.
pub fn latest_version() -> u32 {
    MIGRATIONS.len() as u32
}

/// Reads `PRAGMA user_version` and pairs it with [`latest_version`].
pub fn schema_status(conn: &Connection) -> rusqlite::Result<SchemaStatus> {
    let current = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(SchemaStatus {
        current,
        latest: latest_version(),
    })
}

/// Runs every script newer than the connection's schema.
///
/// # Errors
/// - `DbError::SchemaTooNew` when the file is ahead of this build.
/// - `DbError::Migration` naming the first script that failed.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let status = schema_status(conn)?;
    if status.current > status.latest {
        return Err(DbError::SchemaTooNew {
            found: status.current,
            supported: status.latest,
        });
    }
    if status.is_current() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in status.pending() {
        tx.execute_batch(migration.sql)
            .and_then(|()| tx.pragma_update(None, "user_version", migration.version))
            .map_err(|source| DbError::Migration {
                version: migration.version,
                name: migration.name,
                source,
            })?;
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;
    Ok(())
}
