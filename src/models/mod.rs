// src/models/mod.rs

//! Domain models for the ingestion pipeline.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod report;
mod top;

// Re-export all public types
pub use config::{
    ArchiveConfig, Config, LoggingConfig, ParsersConfig, PathsConfig, PipelineConfig,
};
pub use report::{ReportId, ReportNameInfo};
pub use top::{
    AggregatedBatch, PLAYER_FIELDS, PlayerRef, REQUIRED_FIELDS, TopData, TopRow, table_name,
};

use std::collections::BTreeSet;

/// Reports excluded from the remaining stages of a batch.
pub type ErrorSet = BTreeSet<ReportId>;
