// src/pipeline/discover.rs

//! Pending report discovery.

use crate::error::{AppError, Result};
use crate::models::ReportId;
use crate::storage::LocalStorage;
use crate::utils::log;

/// List the reports that have a pending raw-text file.
///
/// A missing intake directory is not an error: there is nothing to do this
/// cycle. Names outside the report naming pattern are kept as opaque ids on
/// the default server so they still get archived.
pub async fn discover(storage: &LocalStorage, default_server: &str) -> Result<Vec<ReportId>> {
    let pending_dir = &storage.dirs().pending;
    let mut entries = match tokio::fs::read_dir(pending_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(AppError::Io(e)),
    };

    let mut reports = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(storage.raw_extension()) {
            continue;
        }
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };

        let id = ReportId::parse_lenient(stem, default_server);
        if !id.is_structured() {
            log::warn(&format!(
                "{} | unrecognised report name, filed under {}",
                id, default_server
            ));
        }
        reports.push(id);
    }

    reports.sort();
    reports.dedup();
    Ok(reports)
}
