//! SQLite ranking store.
//!
//! One database per server (`{top_dir}/{server}.db`), one table per
//! `(boss, mode)` table name. Rows keep their extracted metrics in columns
//! and the full row as JSON.
//!
//! Every row carries the id of the report it came from. Writing a report
//! again replaces its rows, so a report retried on a later batch is never
//! counted twice.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, params};

use crate::error::Result;
use crate::models::AggregatedBatch;
use crate::storage::sqlite::{data_tables, open_tagged, quote_ident, store_path};
use crate::storage::{RankingStore, RankingWriter};

const SCHEMA: &str = "top";

/// Ranking stores rooted at a directory.
#[derive(Debug, Clone)]
pub struct SqliteRankingStore {
    dir: PathBuf,
}

impl SqliteRankingStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, server: &str) -> PathBuf {
        store_path(&self.dir, server)
    }
}

impl RankingStore for SqliteRankingStore {
    fn open_or_create(&self, server: &str) -> Result<Box<dyn RankingWriter>> {
        let path = self.path(server);
        let conn = open_tagged(&path, SCHEMA)?;
        Ok(Box::new(RankingDb { conn, path }))
    }
}

/// Open ranking database of one server.
pub struct RankingDb {
    conn: Connection,
    path: PathBuf,
}

impl RankingDb {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn create_table(conn: &Connection, table: &str) -> Result<()> {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    report_id TEXT NOT NULL,
                    player TEXT,
                    u REAL,
                    d REAL,
                    t REAL,
                    data TEXT NOT NULL
                )",
                quote_ident(table)
            ),
            [],
        )?;
        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} (report_id)",
                quote_ident(&format!("{table}__report_id")),
                quote_ident(table)
            ),
            [],
        )?;
        Ok(())
    }
}

impl RankingWriter for RankingDb {
    fn bulk_insert(&mut self, batch: &AggregatedBatch) -> Result<usize> {
        let tx = self.conn.transaction()?;

        let mut replaced = 0;
        for table in data_tables(&tx)? {
            let mut stmt = tx.prepare(&format!(
                "DELETE FROM {} WHERE report_id = ?1",
                quote_ident(&table)
            ))?;
            for report in batch.reports() {
                replaced += stmt.execute(params![report.as_str()])?;
            }
        }

        for (table, _) in batch.tables() {
            Self::create_table(&tx, table)?;
        }

        let mut inserted = 0;
        for (table, report, row) in batch.entries() {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT INTO {} (report_id, player, u, d, t, data) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                quote_ident(table)
            ))?;
            stmt.execute(params![
                report.as_str(),
                row.player_name(),
                row.metric("u"),
                row.metric("d"),
                row.metric("t"),
                serde_json::to_string(row)?,
            ])?;
            inserted += 1;
        }

        tx.commit()?;
        if replaced > 0 {
            log::info!("Replaced {} earlier rows in {}", replaced, self.path.display());
        }
        log::debug!("Inserted {} rows into {}", inserted, self.path.display());
        Ok(inserted)
    }
}
