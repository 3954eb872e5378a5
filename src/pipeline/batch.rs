// src/pipeline/batch.rs

//! Batch coordinator.
//!
//! A batch walks a fixed sequence of stages. Every stage finishes for all
//! reports before the next one starts, and reports that fail top building
//! or aggregation are dropped from the stages that need their data.
//! Archiving and cleanup still cover every discovered report.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Directories;
use crate::error::Result;
use crate::models::{AggregatedBatch, Config, ErrorSet, ReportId};
use crate::services::{
    CommandGearParser, CommandTopParser, Compressor, GearParser, SevenZip, TopParser,
};
use crate::storage::{GearStore, LocalStorage, RankingStore, SqliteGearStore, SqliteRankingStore};
use crate::utils::{log, worker_count};

use super::aggregate::{aggregate, group_by_server, persist, remove_errors};
use super::archive::{ArchiveSummary, Archiver, archive_all};
use super::cleanup::remove_timezone_hints;
use super::discover::discover;
use super::gear::{GearSummary, build_gear, collect_players};
use super::top::{TopBuilder, build_all};

/// Batch stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BatchStage {
    Discover,
    BuildTop,
    AggregateAndPersist,
    BuildGear,
    Archive,
    Cleanup,
    Done,
}

impl BatchStage {
    /// Number of working stages (everything but `Done`).
    pub const COUNT: usize = 6;

    pub fn next(self) -> Self {
        match self {
            Self::Discover => Self::BuildTop,
            Self::BuildTop => Self::AggregateAndPersist,
            Self::AggregateAndPersist => Self::BuildGear,
            Self::BuildGear => Self::Archive,
            Self::Archive => Self::Cleanup,
            Self::Cleanup | Self::Done => Self::Done,
        }
    }

    fn number(self) -> usize {
        self as usize + 1
    }

    fn label(self) -> &'static str {
        match self {
            Self::Discover => "Discover pending reports",
            Self::BuildTop => "Build report tops",
            Self::AggregateAndPersist => "Aggregate and save rankings",
            Self::BuildGear => "Build player gear",
            Self::Archive => "Archive raw logs",
            Self::Cleanup => "Remove timezone hints",
            Self::Done => "Done",
        }
    }
}

impl fmt::Display for BatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Counts of what a batch did.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub discovered: usize,
    pub top_errors: ErrorSet,
    pub aggregate_errors: ErrorSet,
    pub rows_saved: usize,
    pub failed_servers: Vec<String>,
    pub gear: GearSummary,
    pub archive: ArchiveSummary,
    pub timezone_removed: usize,
    pub stages: Vec<BatchStage>,
}

impl BatchOutcome {
    pub fn log_summary(&self) {
        log::summary(
            "Batch",
            &[
                ("Discovered", self.discovered.to_string()),
                ("Top errors", self.top_errors.len().to_string()),
                ("Aggregate errors", self.aggregate_errors.len().to_string()),
                ("Rows saved", self.rows_saved.to_string()),
                ("Failed servers", self.failed_servers.join(", ")),
                (
                    "Gear saved",
                    format!("{}/{}", self.gear.saved, self.gear.players),
                ),
                ("Archived", self.archive.archived.to_string()),
                ("Archive failures", self.archive.failed.to_string()),
            ],
        );
    }
}

/// External tools and stores a batch drives.
#[derive(Clone)]
pub struct Collaborators {
    pub top_parser: Arc<dyn TopParser>,
    pub gear_parser: Arc<dyn GearParser>,
    pub compressor: Arc<dyn Compressor>,
    pub rankings: Arc<dyn RankingStore>,
    pub gear: Arc<dyn GearStore>,
}

impl Collaborators {
    /// Command-line parsers, 7-Zip and SQLite stores, as configured.
    ///
    /// Parser commands run from `workdir`.
    pub fn from_config(config: &Config, dirs: &Directories, workdir: &Path) -> Self {
        let workdir = Some(workdir.to_path_buf());
        Self {
            top_parser: Arc::new(CommandTopParser::new(
                config.parsers.top_command.clone(),
                workdir.clone(),
            )),
            gear_parser: Arc::new(CommandGearParser::new(
                config.parsers.gear_command.clone(),
                workdir,
            )),
            compressor: Arc::new(SevenZip::new(&config.archive.program)),
            rankings: Arc::new(SqliteRankingStore::new(&dirs.top)),
            gear: Arc::new(SqliteGearStore::new(&dirs.gear)),
        }
    }
}

/// Runs ingestion batches over one data directory.
#[derive(Clone)]
pub struct BatchCoordinator {
    storage: LocalStorage,
    default_server: String,
    workers: usize,
    tools: Collaborators,
}

impl BatchCoordinator {
    pub fn new(
        storage: LocalStorage,
        default_server: impl Into<String>,
        workers: usize,
        tools: Collaborators,
    ) -> Self {
        Self {
            storage,
            default_server: default_server.into(),
            workers: workers.max(1),
            tools,
        }
    }

    /// Build a coordinator with the configured adapters.
    pub fn from_config(config: &Config, dirs: Directories, data_dir: &Path, debug: bool) -> Self {
        let tools = Collaborators::from_config(config, &dirs, data_dir);
        let storage = LocalStorage::new(dirs, &config.pipeline);
        Self::new(
            storage,
            &config.pipeline.default_server,
            worker_count(config.pipeline.workers, debug),
            tools,
        )
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    pub fn default_server(&self) -> &str {
        &self.default_server
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn tools(&self) -> &Collaborators {
        &self.tools
    }

    pub fn top_builder(&self) -> TopBuilder {
        TopBuilder::new(self.storage.clone(), Arc::clone(&self.tools.top_parser))
    }

    pub fn archiver(&self) -> Archiver {
        Archiver::new(
            self.storage.clone(),
            Arc::clone(&self.tools.compressor),
            &self.default_server,
        )
    }

    /// Run one batch over the pending intake.
    pub async fn run(&self) -> Result<BatchOutcome> {
        self.storage.dirs().init()?;

        let mut outcome = BatchOutcome::default();
        let mut discovered: Vec<ReportId> = Vec::new();
        let mut active: Vec<ReportId> = Vec::new();
        let mut batches: BTreeMap<String, AggregatedBatch> = BTreeMap::new();

        let mut stage = BatchStage::Discover;
        while stage != BatchStage::Done {
            let start = Instant::now();
            log::step(stage.number(), BatchStage::COUNT, stage.label());

            match stage {
                BatchStage::Discover => {
                    discovered = discover(&self.storage, &self.default_server).await?;
                    outcome.discovered = discovered.len();
                    outcome.stages.push(stage);
                    if discovered.is_empty() {
                        log::info("No pending reports");
                        break;
                    }
                    log::info(&format!("{} pending reports", discovered.len()));
                    active = discovered.clone();
                }
                BatchStage::BuildTop => {
                    let errors = build_all(&self.top_builder(), &active, self.workers, false).await;
                    remove_errors(&mut active, &errors);
                    outcome.top_errors = errors;
                    outcome.stages.push(stage);
                }
                BatchStage::AggregateAndPersist => {
                    for (server, reports) in group_by_server(&active) {
                        let (batch, errors) = aggregate(&self.storage, &server, &reports).await;
                        match persist(&self.tools.rankings, &server, &batch).await {
                            Ok(saved) => outcome.rows_saved += saved,
                            Err(e) => {
                                log::error(&format!("Rankings not saved | {server} | {e}"));
                                outcome.failed_servers.push(server.clone());
                            }
                        }
                        outcome.aggregate_errors.extend(errors);
                        batches.insert(server, batch);
                    }
                    remove_errors(&mut active, &outcome.aggregate_errors);
                    outcome.stages.push(stage);
                }
                BatchStage::BuildGear => {
                    for (server, _) in group_by_server(&active) {
                        let players = batches
                            .get(&server)
                            .map(|batch| collect_players(batch, &server))
                            .unwrap_or_default();
                        match build_gear(
                            &self.tools.gear,
                            self.tools.gear_parser.as_ref(),
                            &server,
                            &players,
                        )
                        .await
                        {
                            Ok(summary) => {
                                outcome.gear.players += summary.players;
                                outcome.gear.saved += summary.saved;
                                outcome.gear.failed += summary.failed;
                            }
                            Err(e) => log::error(&format!("Gear skipped | {server} | {e}")),
                        }
                    }
                    outcome.stages.push(stage);
                }
                BatchStage::Archive => {
                    outcome.archive = archive_all(&self.archiver(), &discovered, self.workers).await;
                    outcome.stages.push(stage);
                }
                BatchStage::Cleanup => {
                    outcome.timezone_removed =
                        remove_timezone_hints(&self.storage, &discovered).await;
                    outcome.stages.push(stage);
                }
                BatchStage::Done => {}
            }

            log::info(&format!("{} | {}", log::elapsed(start), stage));
            stage = stage.next();
        }

        Ok(outcome)
    }
}

/// Run a batch, logging instead of returning any error.
pub async fn run_batch_logged(coordinator: &BatchCoordinator) -> Option<BatchOutcome> {
    let start = Instant::now();
    match coordinator.run().await {
        Ok(outcome) => {
            outcome.log_summary();
            log::info(&format!("{} | Batch finished", log::elapsed(start)));
            Some(outcome)
        }
        Err(e) => {
            log::error(&format!("batch failed: {e}"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        DEFAULT_SERVER, FailingRankingStore, FakeCompressor, FakeGearParser, FakeTopParser,
        report, row, sample_top, seed_pending, test_storage,
    };
    use crate::models::{PlayerRef, table_name};
    use serde_json::json;
    use tempfile::TempDir;

    struct Harness {
        _tmp: TempDir,
        coordinator: BatchCoordinator,
        gear_parser: Arc<FakeGearParser>,
        rankings: SqliteRankingStore,
    }

    fn harness(tmp: TempDir, top_parser: FakeTopParser) -> Harness {
        harness_with(tmp, top_parser, FakeCompressor::new(), None)
    }

    fn harness_with(
        tmp: TempDir,
        top_parser: FakeTopParser,
        compressor: FakeCompressor,
        locked_rankings: Option<&str>,
    ) -> Harness {
        let storage = test_storage(&tmp);
        let rankings = SqliteRankingStore::new(&storage.dirs().top);
        let ranking_tool: Arc<dyn RankingStore> = match locked_rankings {
            Some(server) => Arc::new(FailingRankingStore::new(rankings.clone(), server)),
            None => Arc::new(rankings.clone()),
        };
        let gear_parser = Arc::new(FakeGearParser::new());
        let tools = Collaborators {
            top_parser: Arc::new(top_parser),
            gear_parser: gear_parser.clone(),
            compressor: Arc::new(compressor),
            rankings: ranking_tool,
            gear: Arc::new(SqliteGearStore::new(&storage.dirs().gear)),
        };
        Harness {
            coordinator: BatchCoordinator::new(storage, DEFAULT_SERVER, 2, tools),
            _tmp: tmp,
            gear_parser,
            rankings,
        }
    }

    fn ranking_players(store: &SqliteRankingStore, server: &str, table: &str) -> Vec<String> {
        let conn = rusqlite::Connection::open(store.path(server)).unwrap();
        let mut stmt = conn
            .prepare(&format!("SELECT player FROM \"{table}\" ORDER BY id"))
            .unwrap();
        stmt.query_map([], |r| r.get(0))
            .unwrap()
            .map(|p| p.unwrap())
            .collect()
    }

    #[test]
    fn test_stages_only_move_forward() {
        let mut stage = BatchStage::Discover;
        let mut seen = vec![stage];
        while stage != BatchStage::Done {
            let next = stage.next();
            assert!(next > stage);
            stage = next;
            seen.push(stage);
        }
        assert_eq!(seen.len(), BatchStage::COUNT + 1);
    }

    #[tokio::test]
    async fn test_empty_intake_goes_straight_to_done() {
        let h = harness(TempDir::new().unwrap(), FakeTopParser::new());

        let outcome = h.coordinator.run().await.unwrap();
        assert_eq!(outcome.discovered, 0);
        assert_eq!(outcome.stages, vec![BatchStage::Discover]);
    }

    #[tokio::test]
    async fn test_invalid_report_is_excluded_but_archived() {
        let a = report("24-01-02--20-00--A--Alpha");
        let b = report("24-01-02--21-00--B--Alpha");
        let c = report("24-01-02--22-00--C--Alpha");

        let mut b_top = sample_top(&[("Boss1", "normal", &["P3"]), ("Boss2", "normal", &["P5"])]);
        b_top
            .0
            .get_mut("Boss1")
            .unwrap()
            .get_mut("normal")
            .unwrap()
            .push(row(json!({"player": "P6", "d": 10, "t": 5})));

        let parser = FakeTopParser::new()
            .with(&a, sample_top(&[("Boss1", "normal", &["P1", "P2"])]))
            .with(&b, b_top)
            .with(&c, sample_top(&[("Boss1", "normal", &["P2", "P4"])]));
        let h = harness(TempDir::new().unwrap(), parser);
        let storage = h.coordinator.storage().clone();
        seed_pending(&storage, &[&a, &b, &c]);
        std::fs::write(storage.timezone_hint(&b), "+03:00").unwrap();

        let outcome = h.coordinator.run().await.unwrap();

        assert!(outcome.top_errors.is_empty());
        assert_eq!(outcome.aggregate_errors, ErrorSet::from([b.clone()]));
        assert_eq!(outcome.rows_saved, 4);

        let table = table_name("Boss1", "normal");
        assert_eq!(
            ranking_players(&h.rankings, "Alpha", &table),
            vec!["P1", "P2", "P2", "P4"]
        );

        assert_eq!(
            h.gear_parser.calls(),
            vec![
                PlayerRef::new("P1", "Alpha"),
                PlayerRef::new("P2", "Alpha"),
                PlayerRef::new("P4", "Alpha"),
            ]
        );

        for id in [&a, &b, &c] {
            assert!(!storage.pending_text(id).exists());
            assert!(storage.archive_path(id).exists());
        }
        assert!(!storage.timezone_hint(&b).exists());
        assert_eq!(outcome.stages.last(), Some(&BatchStage::Cleanup));
    }

    #[tokio::test]
    async fn test_top_failure_still_archives() {
        let ok = report("24-01-02--20-00--A--Beta");
        let broken = report("24-01-02--21-00--B--Beta");
        let parser = FakeTopParser::new().with(&ok, sample_top(&[("Boss1", "hard", &["Q"])]));
        let h = harness(TempDir::new().unwrap(), parser);
        let storage = h.coordinator.storage().clone();
        seed_pending(&storage, &[&ok, &broken]);

        let outcome = h.coordinator.run().await.unwrap();

        assert_eq!(outcome.top_errors, ErrorSet::from([broken.clone()]));
        assert_eq!(outcome.archive.archived, 2);
        assert!(!storage.pending_text(&broken).exists());
        assert!(storage.archive_path(&broken).exists());
        assert_eq!(
            h.gear_parser.calls(),
            vec![PlayerRef::new("Q", "Beta")]
        );
    }

    #[tokio::test]
    async fn test_servers_are_stored_separately() {
        let alpha = report("24-01-02--20-00--A--Alpha");
        let beta = report("24-01-02--20-00--A--Beta");
        let parser = FakeTopParser::new()
            .with(&alpha, sample_top(&[("Boss1", "normal", &["X"])]))
            .with(&beta, sample_top(&[("Boss1", "normal", &["Y"])]));
        let h = harness(TempDir::new().unwrap(), parser);
        seed_pending(h.coordinator.storage(), &[&alpha, &beta]);

        h.coordinator.run().await.unwrap();

        let table = table_name("Boss1", "normal");
        assert_eq!(ranking_players(&h.rankings, "Alpha", &table), vec!["X"]);
        assert_eq!(ranking_players(&h.rankings, "Beta", &table), vec!["Y"]);
    }

    #[tokio::test]
    async fn test_unarchived_report_is_not_ranked_twice() {
        let a = report("24-01-02--20-00--A--Alpha");
        let parser = FakeTopParser::new().with(&a, sample_top(&[("Boss1", "normal", &["P1"])]));
        let h = harness_with(
            TempDir::new().unwrap(),
            parser,
            FakeCompressor::new().failing(&a),
            None,
        );
        let storage = h.coordinator.storage().clone();
        seed_pending(&storage, &[&a]);

        for _ in 0..3 {
            let outcome = h.coordinator.run().await.unwrap();
            assert_eq!(outcome.archive.failed, 1);
            assert_eq!(outcome.rows_saved, 1);
        }

        let table = table_name("Boss1", "normal");
        assert_eq!(ranking_players(&h.rankings, "Alpha", &table), vec!["P1"]);
        assert!(storage.pending_text(&a).exists());
    }

    #[tokio::test]
    async fn test_ranking_failure_is_isolated_to_its_server() {
        let alpha = report("24-01-02--20-00--A--Alpha");
        let beta = report("24-01-02--20-00--A--Beta");
        let parser = FakeTopParser::new()
            .with(&alpha, sample_top(&[("Boss1", "normal", &["X"])]))
            .with(&beta, sample_top(&[("Boss1", "normal", &["Y"])]));
        let h = harness_with(
            TempDir::new().unwrap(),
            parser,
            FakeCompressor::new(),
            Some("Alpha"),
        );
        seed_pending(h.coordinator.storage(), &[&alpha, &beta]);

        let outcome = h.coordinator.run().await.unwrap();

        assert_eq!(outcome.failed_servers, vec!["Alpha".to_string()]);
        assert_eq!(outcome.rows_saved, 1);
        assert!(!h.rankings.path("Alpha").exists());
        let table = table_name("Boss1", "normal");
        assert_eq!(ranking_players(&h.rankings, "Beta", &table), vec!["Y"]);
        assert_eq!(
            h.gear_parser.calls(),
            vec![PlayerRef::new("X", "Alpha"), PlayerRef::new("Y", "Beta")]
        );
        assert_eq!(outcome.gear.saved, 2);
    }
}
