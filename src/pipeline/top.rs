// src/pipeline/top.rs

//! Per-report top building.
//!
//! Each report is built independently: the builder reads and writes only
//! that report's files, so any number of builds can run concurrently.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};

use crate::error::Result;
use crate::models::{ErrorSet, ReportId};
use crate::services::TopParser;
use crate::storage::LocalStorage;
use crate::utils::log;

/// Result of a successful build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    /// The parser ran and the artifact was written
    Built,
    /// The artifact already existed; nothing was parsed
    AlreadyBuilt,
}

/// Builds the ranking artifact of one report.
#[derive(Clone)]
pub struct TopBuilder {
    storage: LocalStorage,
    parser: Arc<dyn TopParser>,
}

impl TopBuilder {
    pub fn new(storage: LocalStorage, parser: Arc<dyn TopParser>) -> Self {
        Self { storage, parser }
    }

    /// Build a report's top artifact unless it already exists.
    ///
    /// Failures are logged and reported as `false`.
    pub async fn build(&self, report: &ReportId) -> bool {
        let start = Instant::now();
        match self.try_build(report).await {
            Ok(status) => {
                if status == BuildStatus::Built {
                    log::debug(&log::report_line(start, report.as_str(), "Built top"));
                }
                true
            }
            Err(e) => {
                log::error(&log::report_line(
                    start,
                    report.as_str(),
                    &format!("Top failed: {e}"),
                ));
                false
            }
        }
    }

    /// Discard any existing artifact, then build.
    pub async fn rebuild(&self, report: &ReportId) -> bool {
        if let Err(e) = self.storage.remove_file(&self.storage.top_artifact(report)).await {
            log::error(&format!("Cannot remove old top of {report}: {e}"));
            return false;
        }
        self.build(report).await
    }

    pub async fn try_build(&self, report: &ReportId) -> Result<BuildStatus> {
        let artifact = self.storage.top_artifact(report);
        if tokio::fs::try_exists(&artifact).await? {
            return Ok(BuildStatus::AlreadyBuilt);
        }

        let data = self.parser.parse(report).await?;
        self.storage.save_top(report, &data).await?;
        Ok(BuildStatus::Built)
    }
}

/// Build every report on a pool of `workers` concurrent tasks.
///
/// Returns the reports whose build failed once all builds have finished.
pub async fn build_all(
    builder: &TopBuilder,
    reports: &[ReportId],
    workers: usize,
    force: bool,
) -> ErrorSet {
    stream::iter(reports)
        .map(|report| async move {
            let done = if force {
                builder.rebuild(report).await
            } else {
                builder.build(report).await
            };
            (report, done)
        })
        .buffer_unordered(workers.max(1))
        .filter_map(|(report, done)| async move { (!done).then(|| report.clone()) })
        .collect()
        .await
}
