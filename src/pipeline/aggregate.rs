// src/pipeline/aggregate.rs

//! Per-server aggregation of report tops and ranking persistence.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{AppError, Result};
use crate::models::{AggregatedBatch, ErrorSet, ReportId, TopData, TopRow};
use crate::storage::{LocalStorage, RankingStore};
use crate::utils::log;

/// Group reports by server.
///
/// Groups are ordered by server name; reports keep their input order.
pub fn group_by_server(reports: &[ReportId]) -> Vec<(String, Vec<ReportId>)> {
    let mut groups: BTreeMap<String, Vec<ReportId>> = BTreeMap::new();
    for report in reports {
        groups
            .entry(report.server().to_string())
            .or_default()
            .push(report.clone());
    }
    groups.into_iter().collect()
}

/// A row that failed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidRow {
    pub table: String,
    pub field: &'static str,
    pub row: TopRow,
}

/// Find the first invalid row of a report's top data.
pub fn first_invalid_row(data: &TopData) -> Option<InvalidRow> {
    data.tables().find_map(|(table, rows)| {
        rows.iter().find_map(|row| {
            row.invalid_field().map(|field| InvalidRow {
                table: table.clone(),
                field,
                row: row.clone(),
            })
        })
    })
}

/// Accumulates the rows of one server's valid reports.
///
/// A report is merged whole or not at all.
#[derive(Debug)]
pub struct Aggregator {
    server: String,
    batch: AggregatedBatch,
    errors: ErrorSet,
}

impl Aggregator {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            batch: AggregatedBatch::new(),
            errors: ErrorSet::new(),
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// Merge a report's rows, or mark the report failed if any row is invalid.
    pub fn add(&mut self, report: &ReportId, data: &TopData) -> bool {
        if let Some(invalid) = first_invalid_row(data) {
            log::error(&format!(
                "{} | top_has_errors | {} | invalid {} | {}",
                report, invalid.table, invalid.field, invalid.row
            ));
            self.errors.insert(report.clone());
            return false;
        }

        self.batch.add_report(report, data);
        true
    }

    pub fn reject(&mut self, report: &ReportId, reason: &str) {
        log::error(&format!("{} | {}", report, reason));
        self.errors.insert(report.clone());
    }

    pub fn finish(self) -> (AggregatedBatch, ErrorSet) {
        (self.batch, self.errors)
    }
}

/// Load and merge the tops of one server's reports, in order.
pub async fn aggregate(
    storage: &LocalStorage,
    server: &str,
    reports: &[ReportId],
) -> (AggregatedBatch, ErrorSet) {
    let mut aggregator = Aggregator::new(server);
    for report in reports {
        match storage.load_top(report).await {
            Ok(Some(data)) => {
                aggregator.add(report, &data);
            }
            Ok(None) => aggregator.reject(report, "top artifact is missing"),
            Err(e) => aggregator.reject(report, &format!("cannot read top: {e}")),
        }
    }
    aggregator.finish()
}

/// Write a server's batch to its ranking store.
///
/// The SQLite write runs on the blocking pool. An empty batch writes nothing.
pub async fn persist(
    store: &Arc<dyn RankingStore>,
    server: &str,
    batch: &AggregatedBatch,
) -> Result<usize> {
    if batch.is_empty() {
        return Ok(0);
    }

    let start = Instant::now();
    let store = Arc::clone(store);
    let owned_server = server.to_string();
    let owned_batch = batch.clone();
    let saved = tokio::task::spawn_blocking(move || {
        store
            .open_or_create(&owned_server)
            .and_then(|mut writer| writer.bulk_insert(&owned_batch))
    })
    .await
    .map_err(|e| AppError::persistence(server, e))?
    .map_err(|e| AppError::persistence(server, e))?;

    log::info(&format!(
        "{} | Saved top | {} | {} rows in {} tables",
        log::elapsed(start),
        server,
        saved,
        batch.table_count()
    ));
    Ok(saved)
}

/// Drop failed reports from the working list.
pub fn remove_errors(reports: &mut Vec<ReportId>, errors: &ErrorSet) {
    if errors.is_empty() {
        return;
    }
    reports.retain(|report| {
        let failed = errors.contains(report);
        if failed {
            log::warn(&format!("Removed {report}"));
        }
        !failed
    });
    log::info(&format!("{} reports remaining", reports.len()));
}
