//! Pipeline entry points.
//!
//! - `run_batch_logged` / `BatchCoordinator::run`: Ingest the pending intake
//! - `run_reparse`: Rebuild tops, rankings and gear of ingested reports
//! - `run_validate`: Check configuration and external tools

pub mod aggregate;
pub mod archive;
pub mod batch;
pub mod cleanup;
pub mod discover;
pub mod gear;
pub mod reparse;
pub mod top;
pub mod validate;

pub use batch::{BatchCoordinator, BatchOutcome, BatchStage, Collaborators, run_batch_logged};
pub use reparse::{ReparseOptions, ReparseSource, ReparseSummary, run_reparse};
pub use validate::run_validate;
