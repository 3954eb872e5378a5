//! Log-text parser adapter.
//!
//! Turns a report's raw text into its nested top data. The parser itself is
//! an external program; this crate only runs it and reads its JSON output.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{ReportId, TopData};
use crate::services::process::{exit_code, run_capture, stderr_tail};
use crate::utils::render_template;

/// Produces top data for one report.
#[async_trait]
pub trait TopParser: Send + Sync {
    async fn parse(&self, report: &ReportId) -> Result<TopData>;
}

/// Runs a command template and reads the top JSON from its stdout.
///
/// Supported placeholders: `{report_id}`, `{server}`.
#[derive(Debug, Clone)]
pub struct CommandTopParser {
    template: Vec<String>,
    workdir: Option<PathBuf>,
}

impl CommandTopParser {
    pub fn new(template: Vec<String>, workdir: Option<PathBuf>) -> Self {
        Self { template, workdir }
    }
}

#[async_trait]
impl TopParser for CommandTopParser {
    async fn parse(&self, report: &ReportId) -> Result<TopData> {
        let args = render_template(
            &self.template,
            &[("report_id", report.as_str()), ("server", report.server())],
        );
        let output = run_capture(&args, self.workdir.as_deref()).await?;

        if !output.status.success() {
            return Err(AppError::parse(
                report.as_str(),
                format!(
                    "parser exited with {}: {}",
                    exit_code(&output),
                    stderr_tail(&output)
                ),
            ));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| AppError::parse(report.as_str(), format!("invalid top JSON: {e}")))
    }
}
