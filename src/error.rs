// src/error.rs

//! Unified error handling for the ingestion pipeline.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// SQLite operation failed
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Report name does not follow the naming convention
    #[error("Invalid report name '{name}': {message}")]
    ReportName { name: String, message: String },

    /// External top parser failed for a report
    #[error("Parse error for {report}: {message}")]
    Parse { report: String, message: String },

    /// Ranking or gear store could not be opened or written
    #[error("Persistence error for server {server}: {message}")]
    Persistence { server: String, message: String },

    /// Store file exists but carries another schema
    #[error("Store {path:?} has schema '{found}', expected '{expected}'")]
    SchemaMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    /// External gear parser failed for a player
    #[error("Gear parse error for {player}: {message}")]
    GearParse { player: String, message: String },

    /// Compressor returned a non-zero code or produced no archive
    #[error("Archive error for {report}: exit code {code}")]
    Archive { report: String, code: i32 },

    /// External process could not be run
    #[error("Process error running '{program}': {message}")]
    Process { program: String, message: String },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a report name error.
    pub fn report_name(name: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::ReportName {
            name: name.into(),
            message: message.to_string(),
        }
    }

    /// Create a top parse error for a report.
    pub fn parse(report: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Parse {
            report: report.into(),
            message: message.to_string(),
        }
    }

    /// Create a persistence error with server context.
    pub fn persistence(server: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Persistence {
            server: server.into(),
            message: message.to_string(),
        }
    }

    /// Create a gear parse error for a player.
    pub fn gear_parse(player: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::GearParse {
            player: player.into(),
            message: message.to_string(),
        }
    }

    /// Create a process error.
    pub fn process(program: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Process {
            program: program.into(),
            message: message.to_string(),
        }
    }
}
