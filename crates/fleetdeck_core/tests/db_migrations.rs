use fleetdeck_core::db::migrations::latest_version;
use fleetdeck_core::db::{open_db, open_db_in_memory, schema_status, DbError};
use fleetdeck_core::repo::directory_repo::SqliteDirectoryRepository;
use fleetdeck_core::RepoError;
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in [
        "roles",
        "users",
        "fleet_groups",
        "group_members",
        "yachts",
        "global_categories",
        "task_templates",
        "task_assignments",
        "task_incidents",
    ] {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn roles_are_seeded() {
    let conn = open_db_in_memory().unwrap();
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM roles WHERE name IN ('admin', 'manager', 'crew');",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 3);
}

#[test]
fn assignment_scope_check_rejects_rows_with_both_scopes() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO fleet_groups (id, name) VALUES ('g1', 'Fleet');
         INSERT INTO yachts (id, group_id, name) VALUES ('y1', 'g1', 'Aurora');",
    )
    .unwrap();

    let result = conn.execute(
        "INSERT INTO task_assignments (id, group_id, yacht_id, name)
         VALUES ('a1', 'g1', 'y1', 'Hull check');",
        [],
    );
    assert!(result.is_err());
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fleetdeck.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "task_assignments");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::SchemaTooNew { found, supported } => {
            assert_eq!(found, 999);
            assert_eq!(supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn repositories_refuse_unmigrated_connections() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteDirectoryRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

fn schema_version(conn: &Connection) -> u32 {
    let status = schema_status(conn).unwrap();
    assert_eq!(status.latest, latest_version());
    status.current
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
