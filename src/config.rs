// src/config.rs

//! Configuration loading utilities.
//!
//! Loads `config.toml` from the data directory and resolves the directory
//! layout the pipeline works in.

use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::{Config, PathsConfig};
use crate::utils::log;

/// Name of the configuration file inside the data directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Resolved directory layout.
///
/// Relative entries of [`PathsConfig`] are joined onto the data directory,
/// absolute ones are used as-is.
#[derive(Debug, Clone)]
pub struct Directories {
    pub pending: PathBuf,
    pub uploaded: PathBuf,
    pub logs: PathBuf,
    pub archives: PathBuf,
    pub top: PathBuf,
    pub gear: PathBuf,
}

impl Directories {
    /// Resolve the configured layout against `base`.
    pub fn resolve(base: &Path, paths: &PathsConfig) -> Self {
        Self {
            pending: base.join(&paths.pending_dir),
            uploaded: base.join(&paths.uploaded_dir),
            logs: base.join(&paths.logs_dir),
            archives: base.join(&paths.archives_dir),
            top: base.join(&paths.top_dir),
            gear: base.join(&paths.gear_dir),
        }
    }

    /// Create the output directories.
    ///
    /// The intake directories are owned by the uploader and are never created
    /// here; a missing intake directory means there is nothing to do.
    pub fn init(&self) -> Result<()> {
        for dir in [&self.logs, &self.archives, &self.top, &self.gear] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file is missing or unreadable.
pub fn load_config(path: &Path) -> Result<Config> {
    Config::load(path).or_else(|e| {
        log::warn(&format!(
            "Failed to load config from {path:?}: {e}. Using default configuration."
        ));
        Ok(Config::default())
    })
}

/// Load and validate the configuration of a data directory.
pub fn load_all(data_dir: &Path) -> Result<(Config, Directories)> {
    let config = load_config(&data_dir.join(CONFIG_FILE))?;
    config
        .validate()
        .map_err(|e| AppError::config(format!("Invalid configuration: {e}")))?;

    let dirs = Directories::resolve(data_dir, &config.paths);
    Ok((config, dirs))
}
