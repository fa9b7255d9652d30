//! Shared row decoding and connection checks for SQLite repositories.

use super::{RepoError, RepoResult};
use crate::db::schema_status;
use chrono::NaiveDate;
use rusqlite::{Connection, Row};
use serde_json::Value;
use uuid::Uuid;

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn uuid_column(row: &Row<'_>, column: &'static str) -> RepoResult<Uuid> {
    let text: String = row.get(column)?;
    parse_uuid(&text, column)
}

pub(crate) fn optional_uuid_column(row: &Row<'_>, column: &'static str) -> RepoResult<Option<Uuid>> {
    row.get::<_, Option<String>>(column)?
        .map(|value| parse_uuid(&value, column))
        .transpose()
}

pub(crate) fn bool_column(row: &Row<'_>, column: &'static str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn json_object_column(row: &Row<'_>, column: &'static str) -> RepoResult<Value> {
    let text: String = row.get(column)?;
    parse_json_object(&text, column)
}

pub(crate) fn optional_json_column(row: &Row<'_>, column: &'static str) -> RepoResult<Option<Value>> {
    row.get::<_, Option<String>>(column)?
        .map(|text| parse_json_object(&text, column))
        .transpose()
}

fn parse_json_object(text: &str, column: &'static str) -> RepoResult<Value> {
    let value: Value = serde_json::from_str(text)
        .map_err(|err| RepoError::InvalidData(format!("invalid JSON in {column}: {err}")))?;
    if !value.is_object() {
        return Err(RepoError::InvalidData(format!(
            "expected JSON object in {column}"
        )));
    }
    Ok(value)
}

pub(crate) fn date_column(row: &Row<'_>, column: &'static str) -> RepoResult<NaiveDate> {
    let text: String = row.get(column)?;
    NaiveDate::parse_from_str(&text, DATE_FORMAT)
        .map_err(|_| RepoError::InvalidData(format!("invalid date `{text}` in {column}")))
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

/// Current time as epoch milliseconds.
pub(crate) fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Verifies migrations ran and the tables a repository relies on exist.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    tables: &[&'static str],
) -> RepoResult<()> {
    let status = schema_status(conn)?;
    if !status.is_current() {
        return Err(RepoError::UninitializedConnection {
            expected_version: status.latest,
            actual_version: status.current,
        });
    }

    for &table in tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}
