use crate::history::HistoryTable;
use crate::models::{Entry, Parameter};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::{collections::BTreeMap, path::Path};
use tracing::debug;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS parameters (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    key     TEXT NOT NULL UNIQUE,
    label   TEXT NOT NULL,
    active  INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS entries (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    date    TEXT NOT NULL UNIQUE,
    comment TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS entry_values (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id     INTEGER NOT NULL REFERENCES entries(id) ON DELETE CASCADE,
    parameter_id INTEGER NOT NULL REFERENCES parameters(id) ON DELETE CASCADE,
    value        REAL NOT NULL,
    UNIQUE (entry_id, parameter_id)
);
"#;

pub fn open(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    init_schema(&conn)?;
    debug!("opened diary store at {}", path.display());
    Ok(conn)
}

pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA_SQL)
}

fn parameter_from_row(row: &Row<'_>) -> rusqlite::Result<Parameter> {
    Ok(Parameter {
        id: row.get(0)?,
        key: row.get(1)?,
        label: row.get(2)?,
        active: row.get(3)?,
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Entry> {
    Ok(Entry {
        id: row.get(0)?,
        date: row.get(1)?,
        comment: row.get(2)?,
    })
}

pub fn list_parameters(conn: &Connection, active_only: bool) -> rusqlite::Result<Vec<Parameter>> {
    let sql = if active_only {
        "SELECT id, key, label, active FROM parameters WHERE active = 1 ORDER BY id"
    } else {
        "SELECT id, key, label, active FROM parameters ORDER BY id"
    };
    let mut stmt = conn.prepare(sql)?;
    let parameters = stmt
        .query_map([], parameter_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(parameters)
}

pub fn count_parameters(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM parameters", [], |row| row.get(0))
}

pub fn find_parameter(conn: &Connection, key: &str) -> rusqlite::Result<Option<Parameter>> {
    conn.query_row(
        "SELECT id, key, label, active FROM parameters WHERE key = ?1",
        params![key],
        parameter_from_row,
    )
    .optional()
}

pub fn find_parameter_by_label(conn: &Connection, label: &str) -> rusqlite::Result<Option<Parameter>> {
    conn.query_row(
        "SELECT id, key, label, active FROM parameters WHERE label = ?1 ORDER BY id LIMIT 1",
        params![label],
        parameter_from_row,
    )
    .optional()
}

pub fn insert_parameter(
    conn: &Connection,
    key: &str,
    label: &str,
    active: bool,
) -> rusqlite::Result<Parameter> {
    conn.execute(
        "INSERT INTO parameters (key, label, active) VALUES (?1, ?2, ?3)",
        params![key, label, active],
    )?;
    Ok(Parameter {
        id: conn.last_insert_rowid(),
        key: key.to_string(),
        label: label.to_string(),
        active,
    })
}

/// Applies the given changes and returns the updated parameter, or `None`
/// when no parameter has that key.
pub fn update_parameter(
    conn: &Connection,
    key: &str,
    label: Option<&str>,
    active: Option<bool>,
) -> rusqlite::Result<Option<Parameter>> {
    let Some(current) = find_parameter(conn, key)? else {
        return Ok(None);
    };
    let label = label.unwrap_or(&current.label);
    let active = active.unwrap_or(current.active);
    conn.execute(
        "UPDATE parameters SET label = ?1, active = ?2 WHERE id = ?3",
        params![label, active, current.id],
    )?;
    Ok(Some(Parameter {
        label: label.to_string(),
        active,
        ..current
    }))
}

pub fn get_or_create_entry(conn: &Connection, date: NaiveDate) -> rusqlite::Result<Entry> {
    conn.execute(
        "INSERT INTO entries (date) VALUES (?1) ON CONFLICT(date) DO NOTHING",
        params![date],
    )?;
    conn.query_row(
        "SELECT id, date, comment FROM entries WHERE date = ?1",
        params![date],
        entry_from_row,
    )
}

pub fn set_comment(conn: &Connection, date: NaiveDate, comment: &str) -> rusqlite::Result<Entry> {
    let entry = get_or_create_entry(conn, date)?;
    conn.execute(
        "UPDATE entries SET comment = ?1 WHERE id = ?2",
        params![comment, entry.id],
    )?;
    Ok(Entry {
        comment: comment.to_string(),
        ..entry
    })
}

/// Recorded values of an entry, keyed by parameter key. Inactive parameters
/// are left out.
pub fn entry_values(conn: &Connection, entry_id: i64) -> rusqlite::Result<BTreeMap<String, f64>> {
    let mut stmt = conn.prepare(
        "SELECT p.key, v.value
         FROM entry_values v
         JOIN parameters p ON p.id = v.parameter_id
         WHERE v.entry_id = ?1 AND p.active = 1",
    )?;
    let values = stmt
        .query_map(params![entry_id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)))?
        .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
    Ok(values)
}

pub fn value_exists(conn: &Connection, entry_id: i64, parameter_id: i64) -> rusqlite::Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM entry_values WHERE entry_id = ?1 AND parameter_id = ?2",
            params![entry_id, parameter_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn upsert_value(
    conn: &Connection,
    entry_id: i64,
    parameter_id: i64,
    value: f64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO entry_values (entry_id, parameter_id, value) VALUES (?1, ?2, ?3)
         ON CONFLICT(entry_id, parameter_id) DO UPDATE SET value = excluded.value",
        params![entry_id, parameter_id, value],
    )?;
    Ok(())
}

pub fn delete_value(conn: &Connection, entry_id: i64, parameter_id: i64) -> rusqlite::Result<bool> {
    let removed = conn.execute(
        "DELETE FROM entry_values WHERE entry_id = ?1 AND parameter_id = ?2",
        params![entry_id, parameter_id],
    )?;
    Ok(removed > 0)
}

/// Stores `value` for the parameter on `date`, or removes the recorded value
/// when `value` is `None`.
pub fn save_value(
    conn: &Connection,
    date: NaiveDate,
    parameter: &Parameter,
    value: Option<f64>,
) -> rusqlite::Result<()> {
    let entry = get_or_create_entry(conn, date)?;
    match value {
        Some(value) => upsert_value(conn, entry.id, parameter.id, value),
        None => delete_value(conn, entry.id, parameter.id).map(|_| ()),
    }
}

pub fn load_history(conn: &Connection) -> rusqlite::Result<HistoryTable> {
    let mut dates_stmt = conn.prepare("SELECT date FROM entries ORDER BY date")?;
    let dates = dates_stmt
        .query_map([], |row| row.get::<_, NaiveDate>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut values_stmt = conn.prepare(
        "SELECT e.date, p.key, v.value
         FROM entry_values v
         JOIN entries e ON e.id = v.entry_id
         JOIN parameters p ON p.id = v.parameter_id
         WHERE p.active = 1
         ORDER BY e.date",
    )?;
    let records = values_stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, NaiveDate>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(HistoryTable::from_records(dates, records))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    #[test]
    fn entry_is_created_once_per_date() {
        let conn = open_in_memory().unwrap();
        let first = get_or_create_entry(&conn, day(1)).unwrap();
        let again = get_or_create_entry(&conn, day(1)).unwrap();
        let other = get_or_create_entry(&conn, day(2)).unwrap();

        assert_eq!(first, again);
        assert_ne!(first.id, other.id);
        assert_eq!(first.comment, "");
    }

    #[test]
    fn saving_none_removes_existing_value() {
        let conn = open_in_memory().unwrap();
        let mood = insert_parameter(&conn, "mood", "Mood", true).unwrap();

        save_value(&conn, day(3), &mood, Some(4.0)).unwrap();
        save_value(&conn, day(3), &mood, Some(5.0)).unwrap();
        let entry = get_or_create_entry(&conn, day(3)).unwrap();
        assert_eq!(entry_values(&conn, entry.id).unwrap().get("mood"), Some(&5.0));

        save_value(&conn, day(3), &mood, None).unwrap();
        assert!(entry_values(&conn, entry.id).unwrap().is_empty());
        assert!(!value_exists(&conn, entry.id, mood.id).unwrap());
    }

    #[test]
    fn inactive_parameters_are_hidden_from_history_and_values() {
        let conn = open_in_memory().unwrap();
        let mood = insert_parameter(&conn, "mood", "Mood", true).unwrap();
        let pain = insert_parameter(&conn, "pain", "Pain", true).unwrap();
        save_value(&conn, day(1), &mood, Some(3.0)).unwrap();
        save_value(&conn, day(1), &pain, Some(2.0)).unwrap();

        update_parameter(&conn, "pain", None, Some(false)).unwrap();

        let history = load_history(&conn).unwrap();
        assert_eq!(history.columns(), ["mood".to_string()]);
        let entry = get_or_create_entry(&conn, day(1)).unwrap();
        assert!(!entry_values(&conn, entry.id).unwrap().contains_key("pain"));
        let active: Vec<String> = list_parameters(&conn, true)
            .unwrap()
            .into_iter()
            .map(|p| p.key)
            .collect();
        assert_eq!(active, vec!["mood".to_string()]);
        assert_eq!(list_parameters(&conn, false).unwrap().len(), 2);
    }

    #[test]
    fn comment_is_stored_on_entry() {
        let conn = open_in_memory().unwrap();
        set_comment(&conn, day(7), "slept badly").unwrap();
        let entry = get_or_create_entry(&conn, day(7)).unwrap();
        assert_eq!(entry.comment, "slept badly");
    }

    #[test]
    fn update_of_unknown_parameter_returns_none() {
        let conn = open_in_memory().unwrap();
        assert_eq!(update_parameter(&conn, "ghost", Some("Ghost"), None).unwrap(), None);
    }

    #[test]
    fn history_includes_entries_without_values() {
        let conn = open_in_memory().unwrap();
        let mood = insert_parameter(&conn, "mood", "Mood", true).unwrap();
        get_or_create_entry(&conn, day(1)).unwrap();
        save_value(&conn, day(2), &mood, Some(1.0)).unwrap();

        let history = load_history(&conn).unwrap();
        assert_eq!(history.len(), 2);
        let column = history.column_index("mood").unwrap();
        assert_eq!(history.value(0, column), 0.0);
        assert_eq!(history.value(1, column), 1.0);
    }
}
