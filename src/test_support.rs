//! In-memory collaborators shared by the pipeline tests.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::config::Directories;
use crate::error::{AppError, Result};
use crate::models::{PathsConfig, PipelineConfig, PlayerRef, ReportId, TopData, TopRow};
use crate::services::{Compressor, GearParser, TopParser};
use crate::storage::{LocalStorage, RankingStore, RankingWriter, SqliteRankingStore};

pub const DEFAULT_SERVER: &str = "Unknown";

pub fn report(name: &str) -> ReportId {
    ReportId::parse(name, DEFAULT_SERVER).unwrap()
}

pub fn test_storage(tmp: &TempDir) -> LocalStorage {
    let dirs = Directories::resolve(tmp.path(), &PathsConfig::default());
    dirs.init().unwrap();
    LocalStorage::new(dirs, &PipelineConfig::default())
}

pub fn row(value: Value) -> TopRow {
    serde_json::from_value(value).unwrap()
}

pub fn player_row(name: &str) -> TopRow {
    row(json!({"player": name, "u": 100, "d": 2500.5, "t": 40}))
}

/// Top data with one valid row per listed player.
pub fn sample_top(tables: &[(&str, &str, &[&str])]) -> TopData {
    let mut data = TopData::default();
    for (boss, mode, players) in tables {
        data.0
            .entry(boss.to_string())
            .or_default()
            .insert(mode.to_string(), players.iter().map(|p| player_row(p)).collect());
    }
    data
}

/// Write a pending raw log for each report.
pub fn seed_pending(storage: &LocalStorage, reports: &[&ReportId]) {
    std::fs::create_dir_all(&storage.dirs().pending).unwrap();
    for id in reports {
        std::fs::write(storage.pending_text(id), format!("raw log of {id}")).unwrap();
    }
}

#[derive(Default)]
pub struct FakeTopParser {
    tops: HashMap<String, TopData>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakeTopParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &ReportId, data: TopData) -> Self {
        self.tops.insert(id.to_string(), data);
        self
    }

    pub fn calls(&self, id: &ReportId) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(id.as_str())
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl TopParser for FakeTopParser {
    async fn parse(&self, report: &ReportId) -> Result<TopData> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(report.to_string())
            .or_default() += 1;
        self.tops
            .get(report.as_str())
            .cloned()
            .ok_or_else(|| AppError::parse(report.as_str(), "no such report"))
    }
}

#[derive(Default)]
pub struct FakeGearParser {
    failing: BTreeSet<String>,
    calls: Mutex<Vec<PlayerRef>>,
}

impl FakeGearParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<PlayerRef> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

#[async_trait]
impl GearParser for FakeGearParser {
    async fn parse(&self, player: &PlayerRef) -> Result<Value> {
        self.calls.lock().unwrap().push(player.clone());
        if self.failing.contains(&player.name) {
            return Err(AppError::gear_parse(player.to_string(), "profile not found"));
        }
        Ok(json!({"name": player.name, "items": [1, 2, 3]}))
    }
}

/// Writes the archive unless the source's file name is marked as failing.
#[derive(Default)]
pub struct FakeCompressor {
    failing: BTreeSet<String>,
    unavailable: bool,
    calls: Mutex<usize>,
}

impl FakeCompressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, id: &ReportId) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Compressor for FakeCompressor {
    async fn ensure_available(&self) -> Result<()> {
        if self.unavailable {
            return Err(AppError::process("7z", "not found"));
        }
        Ok(())
    }

    async fn compress(&self, source: &Path, dest: &Path) -> Result<i32> {
        *self.calls.lock().unwrap() += 1;
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        if self.failing.contains(stem) {
            return Ok(2);
        }
        std::fs::write(dest, std::fs::read(source)?)?;
        Ok(0)
    }
}

/// SQLite rankings that refuse to open one server's store.
pub struct FailingRankingStore {
    inner: SqliteRankingStore,
    failing: String,
}

impl FailingRankingStore {
    pub fn new(inner: SqliteRankingStore, failing: &str) -> Self {
        Self {
            inner,
            failing: failing.to_string(),
        }
    }
}

impl RankingStore for FailingRankingStore {
    fn open_or_create(&self, server: &str) -> Result<Box<dyn RankingWriter>> {
        if server == self.failing {
            return Err(AppError::persistence(server, "database is locked"));
        }
        self.inner.open_or_create(server)
    }
}
