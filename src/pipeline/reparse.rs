// src/pipeline/reparse.rs

//! Re-run top and gear building over already ingested reports.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use crate::error::{AppError, Result};
use crate::models::{ErrorSet, PlayerRef, ReportId};
use crate::storage::{ARCHIVE_EXTENSION, LocalStorage};
use crate::utils::log;

use super::aggregate::{aggregate, group_by_server, persist, remove_errors};
use super::batch::BatchCoordinator;
use super::gear::{build_gear, collect_from_top};
use super::top::build_all;

/// Where report ids are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReparseSource {
    /// Raw uploads (`*.txt`, `*.7z` and sub-directories)
    Uploaded,
    /// Report directories that already hold a top artifact
    Logs,
    #[default]
    Both,
}

impl FromStr for ReparseSource {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "uploaded" => Ok(Self::Uploaded),
            "logs" => Ok(Self::Logs),
            "both" => Ok(Self::Both),
            other => Err(AppError::validation(format!(
                "unknown reparse source '{other}' (expected uploaded, logs or both)"
            ))),
        }
    }
}

impl fmt::Display for ReparseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uploaded => "uploaded",
            Self::Logs => "logs",
            Self::Both => "both",
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReparseOptions {
    pub source: ReparseSource,
    /// Only these servers; empty means all
    pub servers: Vec<String>,
    pub limit: Option<usize>,
    pub only_top: bool,
    pub only_gear: bool,
    /// Rebuild tops that already exist
    pub force: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ReparseSummary {
    pub selected: Vec<ReportId>,
    pub errors: ErrorSet,
    pub rows_saved: usize,
    pub players_saved: usize,
    pub players_failed: usize,
}

async fn dir_entries(dir: &Path) -> Result<Vec<(String, bool)>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(AppError::Io(e)),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if let Some(name) = entry.file_name().to_str() {
            names.push((name.to_string(), entry.file_type().await?.is_dir()));
        }
    }
    names.sort();
    Ok(names)
}

/// Report names found in the uploads directory.
pub async fn uploaded_names(storage: &LocalStorage) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for (name, is_dir) in dir_entries(&storage.dirs().uploaded).await? {
        if is_dir {
            names.push(name);
            continue;
        }
        let path = Path::new(&name);
        let ext = path.extension().and_then(|e| e.to_str());
        if ext == Some(storage.raw_extension()) || ext == Some(ARCHIVE_EXTENSION) {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
    }
    Ok(names)
}

/// Report names whose log directory holds a top artifact.
pub async fn logs_names(storage: &LocalStorage) -> Result<Vec<String>> {
    let logs = &storage.dirs().logs;
    let mut names = Vec::new();
    for (name, is_dir) in dir_entries(logs).await? {
        if is_dir && tokio::fs::try_exists(logs.join(&name).join(storage.top_file_name())).await? {
            names.push(name);
        }
    }
    Ok(names)
}

/// Resolve and filter the reports to reparse.
///
/// Ids keep source order (uploaded first) with duplicates dropped.
pub async fn resolve_reports(
    storage: &LocalStorage,
    default_server: &str,
    options: &ReparseOptions,
) -> Result<Vec<ReportId>> {
    let mut names = Vec::new();
    if matches!(options.source, ReparseSource::Uploaded | ReparseSource::Both) {
        names.extend(uploaded_names(storage).await?);
    }
    if matches!(options.source, ReparseSource::Logs | ReparseSource::Both) {
        names.extend(logs_names(storage).await?);
    }

    let mut seen = HashSet::new();
    let mut reports = Vec::new();
    for name in names {
        if !seen.insert(name.clone()) {
            continue;
        }
        reports.push(ReportId::parse_lenient(&name, default_server));
    }

    if !options.servers.is_empty() {
        reports.retain(|id| options.servers.iter().any(|s| s == id.server()));
    }
    if let Some(limit) = options.limit {
        reports.truncate(limit);
    }
    Ok(reports)
}

/// Rebuild tops, rankings and gear for existing reports.
pub async fn run_reparse(
    coordinator: &BatchCoordinator,
    options: &ReparseOptions,
) -> Result<ReparseSummary> {
    if options.only_top && options.only_gear {
        return Err(AppError::validation(
            "--only-top and --only-gear cannot be combined",
        ));
    }

    let storage = coordinator.storage();
    storage.dirs().init()?;

    let selected = resolve_reports(storage, coordinator.default_server(), options).await?;
    log::info(&format!(
        "Reparse | source {} | {} reports",
        options.source,
        selected.len()
    ));

    let mut summary = ReparseSummary {
        selected: selected.clone(),
        ..ReparseSummary::default()
    };

    if options.dry_run {
        for id in selected.iter().take(10) {
            log::sub_item(id.as_str());
        }
        return Ok(summary);
    }

    let tools = coordinator.tools();
    for (server, mut reports) in group_by_server(&selected) {
        let start = Instant::now();
        log::header(&format!("{server} ({} reports)", reports.len()));

        if !options.only_gear {
            let errors = build_all(
                &coordinator.top_builder(),
                &reports,
                coordinator.workers(),
                options.force,
            )
            .await;
            remove_errors(&mut reports, &errors);
            summary.errors.extend(errors);

            let (batch, errors) = aggregate(storage, &server, &reports).await;
            remove_errors(&mut reports, &errors);
            summary.errors.extend(errors);

            match persist(&tools.rankings, &server, &batch).await {
                Ok(saved) => summary.rows_saved += saved,
                Err(e) => log::error(&format!("Rankings not saved | {server} | {e}")),
            }
        }

        if !options.only_top {
            let players = players_of_reports(storage, &server, &reports).await;
            match build_gear(
                &tools.gear,
                tools.gear_parser.as_ref(),
                &server,
                &players,
            )
            .await
            {
                Ok(gear) => {
                    summary.players_saved += gear.saved;
                    summary.players_failed += gear.failed;
                }
                Err(e) => log::error(&format!("Gear skipped | {server} | {e}")),
            }
        }

        log::info(&format!("{} | {} done", log::elapsed(start), server));
    }

    Ok(summary)
}

async fn players_of_reports(
    storage: &LocalStorage,
    server: &str,
    reports: &[ReportId],
) -> BTreeSet<PlayerRef> {
    let mut players = BTreeSet::new();
    for report in reports {
        match storage.load_top(report).await {
            Ok(Some(data)) => players.extend(collect_from_top(&data, server)),
            Ok(None) => log::warn(&format!("{report} | no top artifact")),
            Err(e) => log::warn(&format!("{report} | cannot read top: {e}")),
        }
    }
    players
}
