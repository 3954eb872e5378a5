// src/pipeline/archive.rs

//! Raw log archiving.
//!
//! Compresses each pending raw log into the archive directory and removes the
//! pending copy once the archive is confirmed on disk.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};

use crate::error::{AppError, Result};
use crate::models::ReportId;
use crate::services::Compressor;
use crate::storage::LocalStorage;
use crate::utils::log;

/// What archiving one report did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Archived { removed_duplicate: bool },
    NothingPending,
    Failed,
}

/// Totals of an archive stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub archived: usize,
    pub skipped: usize,
    pub failed: usize,
    pub duplicates_removed: usize,
}

impl ArchiveSummary {
    fn record(&mut self, outcome: ArchiveOutcome) {
        match outcome {
            ArchiveOutcome::Archived { removed_duplicate } => {
                self.archived += 1;
                if removed_duplicate {
                    self.duplicates_removed += 1;
                }
            }
            ArchiveOutcome::NothingPending => self.skipped += 1,
            ArchiveOutcome::Failed => self.failed += 1,
        }
    }
}

#[derive(Clone)]
pub struct Archiver {
    storage: LocalStorage,
    compressor: Arc<dyn Compressor>,
    default_server: String,
}

impl Archiver {
    pub fn new(
        storage: LocalStorage,
        compressor: Arc<dyn Compressor>,
        default_server: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            compressor,
            default_server: default_server.into(),
        }
    }

    /// Archive one report. Failures are logged and leave the pending file.
    pub async fn archive(&self, report: &ReportId) -> ArchiveOutcome {
        let start = Instant::now();
        match self.try_archive(report).await {
            Ok(outcome) => {
                if outcome != ArchiveOutcome::NothingPending {
                    log::debug(&log::report_line(start, report.as_str(), "Archived"));
                }
                outcome
            }
            Err(e) => {
                log::error(&log::report_line(start, report.as_str(), &e.to_string()));
                ArchiveOutcome::Failed
            }
        }
    }

    pub async fn try_archive(&self, report: &ReportId) -> Result<ArchiveOutcome> {
        let pending = self.storage.pending_text(report);
        if !tokio::fs::try_exists(&pending).await? {
            return Ok(ArchiveOutcome::NothingPending);
        }

        let dest = self.storage.archive_path(report);
        let code = self.compressor.compress(&pending, &dest).await?;
        if code != 0 || !tokio::fs::try_exists(&dest).await? {
            return Err(AppError::Archive {
                report: report.to_string(),
                code,
            });
        }

        self.storage.remove_file(&pending).await?;
        let removed_duplicate = self.remove_default_server_copy(report).await?;
        Ok(ArchiveOutcome::Archived { removed_duplicate })
    }

    /// Remove the archive stored under the default server alias, if any.
    async fn remove_default_server_copy(&self, report: &ReportId) -> Result<bool> {
        if report.server() == self.default_server {
            return Ok(false);
        }
        let alias = report.with_server(&self.default_server);
        let removed = self
            .storage
            .remove_file(&self.storage.archive_path(&alias))
            .await?;
        if removed {
            log::info(&format!("Removed duplicate archive {alias}"));
        }
        Ok(removed)
    }
}

/// Archive every report on a pool of `workers` concurrent tasks.
///
/// The compressor is checked once first; when it is unavailable nothing is
/// archived and every pending file stays for the next batch.
pub async fn archive_all(archiver: &Archiver, reports: &[ReportId], workers: usize) -> ArchiveSummary {
    let mut summary = ArchiveSummary::default();
    if reports.is_empty() {
        return summary;
    }

    if let Err(e) = archiver.compressor.ensure_available().await {
        log::error(&format!("Compressor unavailable, archiving skipped: {e}"));
        summary.failed = reports.len();
        return summary;
    }

    let outcomes: Vec<ArchiveOutcome> = stream::iter(reports)
        .map(|report| archiver.archive(report))
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    for outcome in outcomes {
        summary.record(outcome);
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{DEFAULT_SERVER, FakeCompressor, report, seed_pending, test_storage};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_archive_removes_pending() {
        let tmp = TempDir::new().unwrap();
        let storage = test_storage(&tmp);
        let id = report("24-01-02--20-00--A--Alpha");
        seed_pending(&storage, &[&id]);

        let archiver = Archiver::new(storage.clone(), Arc::new(FakeCompressor::new()), DEFAULT_SERVER);
        assert_eq!(
            archiver.archive(&id).await,
            ArchiveOutcome::Archived {
                removed_duplicate: false
            }
        );
        assert!(!storage.pending_text(&id).exists());
        assert!(storage.archive_path(&id).exists());

        assert_eq!(archiver.archive(&id).await, ArchiveOutcome::NothingPending);
    }

    #[tokio::test]
    async fn test_failed_compression_keeps_pending() {
        let tmp = TempDir::new().unwrap();
        let storage = test_storage(&tmp);
        let id = report("24-01-02--20-00--A--Alpha");
        seed_pending(&storage, &[&id]);

        let compressor = Arc::new(FakeCompressor::new().failing(&id));
        let archiver = Archiver::new(storage.clone(), compressor, DEFAULT_SERVER);
        assert!(matches!(
            archiver.try_archive(&id).await,
            Err(AppError::Archive { code: 2, .. })
        ));
        assert!(storage.pending_text(&id).exists());
    }

    #[tokio::test]
    async fn test_removes_default_server_duplicate() {
        let tmp = TempDir::new().unwrap();
        let storage = test_storage(&tmp);
        let id = report("24-01-02--20-00--A--Alpha");
        let alias = id.with_server(DEFAULT_SERVER);
        seed_pending(&storage, &[&id]);
        std::fs::write(storage.archive_path(&alias), "old").unwrap();

        let archiver = Archiver::new(storage.clone(), Arc::new(FakeCompressor::new()), DEFAULT_SERVER);
        assert_eq!(
            archiver.archive(&id).await,
            ArchiveOutcome::Archived {
                removed_duplicate: true
            }
        );
        assert!(!storage.archive_path(&alias).exists());
        assert!(storage.archive_path(&id).exists());
    }

    #[tokio::test]
    async fn test_unavailable_compressor_skips_stage() {
        let tmp = TempDir::new().unwrap();
        let storage = test_storage(&tmp);
        let id = report("24-01-02--20-00--A--Alpha");
        seed_pending(&storage, &[&id]);

        let compressor = Arc::new(FakeCompressor::unavailable());
        let archiver = Archiver::new(storage.clone(), compressor.clone(), DEFAULT_SERVER);
        let summary = archive_all(&archiver, &[id.clone()], 2).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(compressor.calls(), 0);
        assert!(storage.pending_text(&id).exists());
    }
}
