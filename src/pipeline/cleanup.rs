// src/pipeline/cleanup.rs

use crate::models::ReportId;
use crate::storage::LocalStorage;
use crate::utils::log;

/// Remove the timezone sidecar of every report. Returns how many existed.
pub async fn remove_timezone_hints(storage: &LocalStorage, reports: &[ReportId]) -> usize {
    let mut removed = 0;
    for report in reports {
        match storage.remove_file(&storage.timezone_hint(report)).await {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(e) => log::warn(&format!("{report} | cannot remove timezone hint: {e}")),
        }
    }
    removed
}
