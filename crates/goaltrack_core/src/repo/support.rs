//! Shared SQLite helpers for repository implementations.

use crate::db::migrations::{latest_version, schema_version};
use crate::repo::goal_repo::{RepoError, RepoResult};
use chrono::{DateTime, SecondsFormat, SubsecRound, TimeZone, Utc};
use rusqlite::Connection;
use uuid::Uuid;

/// Rejects connections that were not opened through `db::open_db*`.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    tables: &[&'static str],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in tables {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

/// Drops sub-microsecond precision that `format_timestamp` cannot store.
pub(crate) fn to_storage_precision<Tz: TimeZone>(value: DateTime<Tz>) -> DateTime<Tz> {
    value.trunc_subsecs(6)
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
pub(crate) fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str, column: &'static str) -> RepoResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| RepoError::InvalidData(format!("invalid timestamp `{value}` in {column}")))
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::{format_timestamp, parse_timestamp};
    use chrono::{TimeZone, Utc};

    #[test]
    fn timestamps_are_fixed_width_and_parse_back() {
        let early = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 11, 2, 3, 4, 5).unwrap();
        let early_text = format_timestamp(early);
        let late_text = format_timestamp(late);
        assert_eq!(early_text.len(), late_text.len());
        assert!(early_text < late_text);
        assert_eq!(parse_timestamp(&early_text, "t").unwrap(), early);
    }

    #[test]
    fn parse_timestamp_accepts_offsets_and_rejects_garbage() {
        let parsed = parse_timestamp("2024-03-10T01:30:00+02:00", "t").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 9, 23, 30, 0).unwrap());
        assert!(parse_timestamp("yesterday", "t").is_err());
    }
}
