//! SQLite gear store.
//!
//! One database per server (`{gear_dir}/{server}.db`) holding the latest
//! gear snapshot of each player.

use std::path::PathBuf;

use chrono::Utc;
use rusqlite::{Connection, params};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::PlayerRef;
use crate::storage::sqlite::{open_tagged, store_path};
use crate::storage::{GearStore, GearWriter};

const SCHEMA: &str = "gear";

/// Gear stores rooted at a directory.
#[derive(Debug, Clone)]
pub struct SqliteGearStore {
    dir: PathBuf,
}

impl SqliteGearStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, server: &str) -> PathBuf {
        store_path(&self.dir, server)
    }
}

impl GearStore for SqliteGearStore {
    fn open_or_create(&self, server: &str) -> Result<Box<dyn GearWriter>> {
        let conn = open_tagged(&self.path(server), SCHEMA)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS gear (
                name TEXT PRIMARY KEY,
                snapshot TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Box::new(GearDb {
            conn,
            server: server.to_string(),
        }))
    }
}

/// Open gear database of one server.
pub struct GearDb {
    conn: Connection,
    server: String,
}

impl GearWriter for GearDb {
    fn upsert(&mut self, player: &PlayerRef, snapshot: &Value) -> Result<()> {
        if player.server != self.server {
            return Err(AppError::persistence(
                &self.server,
                format!("player {player} belongs to another server"),
            ));
        }

        self.conn.execute(
            "INSERT INTO gear (name, snapshot, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET
                snapshot = excluded.snapshot,
                updated_at = excluded.updated_at",
            params![
                player.name,
                serde_json::to_string(snapshot)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{RankingStore, SqliteRankingStore};
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_upsert_replaces_snapshot() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteGearStore::new(tmp.path());
        let player = PlayerRef::new("Safiyah", "Alpha");

        let mut db = store.open_or_create("Alpha").unwrap();
        db.upsert(&player, &json!({"head": 1})).unwrap();
        db.upsert(&player, &json!({"head": 2})).unwrap();

        let conn = Connection::open(store.path("Alpha")).unwrap();
        let (count, snapshot): (i64, String) = conn
            .query_row("SELECT COUNT(*), MAX(snapshot) FROM gear", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(snapshot, r#"{"head":2}"#);
    }

    #[test]
    fn test_rejects_player_of_other_server() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteGearStore::new(tmp.path());
        let mut db = store.open_or_create("Alpha").unwrap();

        assert!(db.upsert(&PlayerRef::new("X", "Beta"), &json!({})).is_err());
    }

    #[test]
    fn test_never_reuses_ranking_store() {
        let tmp = TempDir::new().unwrap();
        SqliteRankingStore::new(tmp.path())
            .open_or_create("Alpha")
            .unwrap();

        let result = SqliteGearStore::new(tmp.path()).open_or_create("Alpha");
        assert!(matches!(result, Err(AppError::SchemaMismatch { .. })));
    }
}
