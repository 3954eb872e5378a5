//! Shared SQLite helpers for the per-server stores.
//!
//! Every store file carries a `store_meta` row naming its schema so a gear
//! store can never be opened on top of a ranking store, or the reverse.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{AppError, Result};

const META_TABLE: &str = "store_meta";

/// Open (creating if needed) a store file tagged with `schema`.
pub(crate) fn open_tagged(path: &Path, schema: &str) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {META_TABLE} (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )"
        ),
        [],
    )?;

    let found: Option<String> = conn
        .query_row(
            &format!("SELECT value FROM {META_TABLE} WHERE key = 'schema'"),
            [],
            |row| row.get(0),
        )
        .optional()?;

    match found {
        Some(found) if found == schema => Ok(conn),
        Some(found) => Err(AppError::SchemaMismatch {
            path: path.to_path_buf(),
            expected: schema.to_string(),
            found,
        }),
        None => {
            let foreign_tables: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT IN (?1, 'sqlite_sequence')",
                params![META_TABLE],
                |row| row.get(0),
            )?;
            if foreign_tables > 0 {
                return Err(AppError::SchemaMismatch {
                    path: path.to_path_buf(),
                    expected: schema.to_string(),
                    found: "untagged".to_string(),
                });
            }
            conn.execute(
                &format!("INSERT INTO {META_TABLE} (key, value) VALUES ('schema', ?1)"),
                params![schema],
            )?;
            Ok(conn)
        }
    }
}

/// Names of the store's data tables.
pub(crate) fn data_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT IN (?1, 'sqlite_sequence') ORDER BY name",
    )?;
    let names = stmt
        .query_map(params![META_TABLE], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(names)
}

/// Quote an SQL identifier.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Store file of a server inside `dir`.
pub(crate) fn store_path(dir: &Path, server: &str) -> std::path::PathBuf {
    dir.join(format!("{server}.db"))
}
