//! logs-auto CLI
//!
//! Local entry point for ingestion batches and operator tooling.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use logs_auto::{
    config::load_all,
    error::Result,
    pipeline::{self, BatchCoordinator, ReparseOptions, ReparseSource},
    storage::ARCHIVE_EXTENSION,
};

/// logs-auto - Raid log ingestion pipeline
#[derive(Parser, Debug)]
#[command(
    name = "logs-auto",
    version,
    about = "Raid log ingestion and ranking pipeline"
)]
struct Cli {
    /// Data directory holding config.toml and the upload/log trees
    #[arg(short, long, default_value = ".")]
    data_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process every pending report once
    Run {
        /// Use a single worker
        #[arg(long)]
        debug: bool,
    },

    /// Rebuild tops, rankings and gear of ingested reports
    Reparse {
        /// Where to read report ids from: uploaded, logs or both
        #[arg(long, default_value_t = ReparseSource::Both)]
        source: ReparseSource,

        /// Only reports of this server (repeatable)
        #[arg(long = "server")]
        servers: Vec<String>,

        /// Process at most this many reports
        #[arg(long)]
        limit: Option<usize>,

        /// Skip gear generation
        #[arg(long, conflicts_with = "only_gear")]
        only_top: bool,

        /// Skip top building and ranking writes
        #[arg(long)]
        only_gear: bool,

        /// Rebuild tops that already exist
        #[arg(long)]
        force: bool,

        /// List the selected reports without processing them
        #[arg(long)]
        dry_run: bool,

        /// Use a single worker
        #[arg(long)]
        debug: bool,
    },

    /// Validate configuration and the compressor
    Validate,

    /// Show pending and stored counts
    Info,
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn count_entries(dir: &Path, extension: &str) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .filter(|entry| {
                    entry.path().extension().and_then(|ext| ext.to_str()) == Some(extension)
                })
                .count()
        })
        .unwrap_or(0)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = load_all(&cli.data_dir);
    let level = loaded
        .as_ref()
        .map(|(config, _)| config.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.verbose, &level);

    if let Command::Validate = cli.command {
        return pipeline::run_validate(&cli.data_dir).await;
    }

    let (config, dirs) = loaded.inspect_err(|e| log::error!("{}", e))?;
    log::info!("Loaded configuration from {}", cli.data_dir.display());

    match cli.command {
        Command::Run { debug } => {
            let coordinator = BatchCoordinator::from_config(&config, dirs, &cli.data_dir, debug);
            log::info!("Running batch with {} workers", coordinator.workers());
            pipeline::run_batch_logged(&coordinator).await;
        }

        Command::Reparse {
            source,
            servers,
            limit,
            only_top,
            only_gear,
            force,
            dry_run,
            debug,
        } => {
            let coordinator = BatchCoordinator::from_config(&config, dirs, &cli.data_dir, debug);
            let options = ReparseOptions {
                source,
                servers,
                limit,
                only_top,
                only_gear,
                force,
                dry_run,
            };
            let summary = pipeline::run_reparse(&coordinator, &options).await?;
            log::info!(
                "Reparse complete: {} reports, {} failed, {} rows, {} players",
                summary.selected.len(),
                summary.errors.len(),
                summary.rows_saved,
                summary.players_saved
            );
        }

        Command::Validate => {}

        Command::Info => {
            log::info!("Data directory: {}", cli.data_dir.display());
            log::info!(
                "Pending reports: {}",
                count_entries(&dirs.pending, &config.pipeline.raw_extension)
            );
            log::info!("Archives: {}", count_entries(&dirs.archives, ARCHIVE_EXTENSION));
            log::info!("Ranking stores: {}", count_entries(&dirs.top, "db"));
            log::info!("Gear stores: {}", count_entries(&dirs.gear, "db"));
        }
    }

    log::info!("Done!");

    Ok(())
}
