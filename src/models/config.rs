//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Directory layout, relative to the data directory
    #[serde(default)]
    pub paths: PathsConfig,

    /// Batch behavior settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Raw log compression settings
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// External parser commands
    #[serde(default)]
    pub parsers: ParsersConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let server = self.pipeline.default_server.trim();
        if server.is_empty() {
            return Err(AppError::validation("pipeline.default_server is empty"));
        }
        if server.contains("--") || server.contains('/') || server.contains('\\') {
            return Err(AppError::validation(
                "pipeline.default_server must not contain '--' or path separators",
            ));
        }
        if self.pipeline.workers == Some(0) {
            return Err(AppError::validation("pipeline.workers must be > 0"));
        }
        if self.pipeline.raw_extension.is_empty() {
            return Err(AppError::validation("pipeline.raw_extension is empty"));
        }
        if self.pipeline.top_file_name.trim().is_empty() {
            return Err(AppError::validation("pipeline.top_file_name is empty"));
        }
        if self.archive.program.trim().is_empty() {
            return Err(AppError::validation("archive.program is empty"));
        }
        check_template("parsers.top_command", &self.parsers.top_command, "{report_id}")?;
        check_template("parsers.gear_command", &self.parsers.gear_command, "{name}")?;
        Ok(())
    }
}

fn check_template(field: &str, template: &[String], placeholder: &str) -> Result<()> {
    if template.is_empty() || template[0].trim().is_empty() {
        return Err(AppError::validation(format!("{field} is empty")));
    }
    if !template.iter().any(|arg| arg.contains(placeholder)) {
        return Err(AppError::validation(format!(
            "{field} must reference {placeholder}"
        )));
    }
    Ok(())
}

/// Directory layout relative to the data directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Intake directory holding `{report_id}.txt` files awaiting processing
    #[serde(default = "defaults::pending_dir")]
    pub pending_dir: String,

    /// Directory of every uploaded report, scanned by `reparse`
    #[serde(default = "defaults::uploaded_dir")]
    pub uploaded_dir: String,

    /// Per-report artifact directory (`{logs_dir}/{report_id}/top.json`)
    #[serde(default = "defaults::logs_dir")]
    pub logs_dir: String,

    /// Compressed raw logs
    #[serde(default = "defaults::archives_dir")]
    pub archives_dir: String,

    /// Per-server ranking databases
    #[serde(default = "defaults::top_dir")]
    pub top_dir: String,

    /// Per-server gear databases
    #[serde(default = "defaults::gear_dir")]
    pub gear_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            pending_dir: defaults::pending_dir(),
            uploaded_dir: defaults::uploaded_dir(),
            logs_dir: defaults::logs_dir(),
            archives_dir: defaults::archives_dir(),
            top_dir: defaults::top_dir(),
            gear_dir: defaults::gear_dir(),
        }
    }
}

/// Batch behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Server name used for reports without one, and as the dedup alias
    #[serde(default = "defaults::default_server")]
    pub default_server: String,

    /// Worker pool size; unset means available parallelism minus one
    #[serde(default)]
    pub workers: Option<usize>,

    /// Extension of pending raw-text files
    #[serde(default = "defaults::raw_extension")]
    pub raw_extension: String,

    /// Extension of the per-report timezone sidecar removed at cleanup
    #[serde(default = "defaults::timezone_extension")]
    pub timezone_extension: String,

    /// File name of the per-report ranking artifact
    #[serde(default = "defaults::top_file_name")]
    pub top_file_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_server: defaults::default_server(),
            workers: None,
            raw_extension: defaults::raw_extension(),
            timezone_extension: defaults::timezone_extension(),
            top_file_name: defaults::top_file_name(),
        }
    }
}

/// Raw log compression settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// 7-Zip compatible executable
    #[serde(default = "defaults::archive_program")]
    pub program: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            program: defaults::archive_program(),
        }
    }
}

/// External parser command templates.
///
/// Each template is a program followed by its arguments. Placeholders are
/// substituted per invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsersConfig {
    /// Prints a report's nested top JSON; supports `{report_id}`
    #[serde(default = "defaults::top_command")]
    pub top_command: Vec<String>,

    /// Prints a player's gear snapshot JSON; supports `{name}` and `{server}`
    #[serde(default = "defaults::gear_command")]
    pub gear_command: Vec<String>,
}

impl Default for ParsersConfig {
    fn default() -> Self {
        Self {
            top_command: defaults::top_command(),
            gear_command: defaults::gear_command(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Path defaults
    pub fn pending_dir() -> String {
        "uploads/pending_archive".into()
    }
    pub fn uploaded_dir() -> String {
        "uploads/uploaded".into()
    }
    pub fn logs_dir() -> String {
        "LogsDir".into()
    }
    pub fn archives_dir() -> String {
        "LogsRaw".into()
    }
    pub fn top_dir() -> String {
        "top".into()
    }
    pub fn gear_dir() -> String {
        "gear".into()
    }

    // Pipeline defaults
    pub fn default_server() -> String {
        "Unknown".into()
    }
    pub fn raw_extension() -> String {
        "txt".into()
    }
    pub fn timezone_extension() -> String {
        "timezone".into()
    }
    pub fn top_file_name() -> String {
        "top.json".into()
    }

    pub fn archive_program() -> String {
        "7z".into()
    }

    // Parser defaults
    pub fn top_command() -> Vec<String> {
        vec!["python3".into(), "logs_top.py".into(), "{report_id}".into()]
    }
    pub fn gear_command() -> Vec<String> {
        vec![
            "python3".into(),
            "parser_profile.py".into(),
            "{name}".into(),
            "{server}".into(),
        ]
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
