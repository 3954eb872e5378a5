// src/pipeline/validate.rs

use std::path::Path;

use crate::config::load_all;
use crate::error::Result;
use crate::services::{Compressor, SevenZip};
use crate::utils::{log, worker_count};

/// Validate the configuration of a data directory and check the compressor.
pub async fn run_validate(data_dir: &Path) -> Result<()> {
    log::header("Validating configuration");

    let (config, dirs) = match load_all(data_dir) {
        Ok(loaded) => loaded,
        Err(e) => {
            log::error(&format!("Configuration is invalid: {e}"));
            return Err(e);
        }
    };

    log::info("Configuration is valid");
    log::sub_item(&format!("Default server: {}", config.pipeline.default_server));
    log::sub_item(&format!(
        "Workers: {}",
        worker_count(config.pipeline.workers, false)
    ));
    log::sub_item(&format!("Pending: {}", dirs.pending.display()));
    log::sub_item(&format!("Rankings: {}", dirs.top.display()));
    log::sub_item(&format!("Gear: {}", dirs.gear.display()));
    log::sub_item(&format!("Top parser: {}", config.parsers.top_command.join(" ")));
    log::sub_item(&format!("Gear parser: {}", config.parsers.gear_command.join(" ")));

    match SevenZip::new(&config.archive.program).ensure_available().await {
        Ok(()) => log::info(&format!("Compressor '{}' is available", config.archive.program)),
        Err(e) => {
            log::error(&format!("Compressor is unavailable: {e}"));
            return Err(e);
        }
    }

    Ok(())
}
