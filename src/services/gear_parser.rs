//! Gear parser adapter.
//!
//! Produces a player's equipment snapshot. The snapshot is opaque JSON to
//! this crate; the gear store persists it as-is.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::PlayerRef;
use crate::services::process::{exit_code, run_capture, stderr_tail};
use crate::utils::render_template;

/// Produces a gear snapshot for one player.
#[async_trait]
pub trait GearParser: Send + Sync {
    async fn parse(&self, player: &PlayerRef) -> Result<Value>;
}

/// Runs a command template and reads the snapshot JSON object from stdout.
///
/// Supported placeholders: `{name}`, `{server}`.
#[derive(Debug, Clone)]
pub struct CommandGearParser {
    template: Vec<String>,
    workdir: Option<PathBuf>,
}

impl CommandGearParser {
    pub fn new(template: Vec<String>, workdir: Option<PathBuf>) -> Self {
        Self { template, workdir }
    }
}

#[async_trait]
impl GearParser for CommandGearParser {
    async fn parse(&self, player: &PlayerRef) -> Result<Value> {
        let args = render_template(
            &self.template,
            &[("name", player.name.as_str()), ("server", player.server.as_str())],
        );
        let output = run_capture(&args, self.workdir.as_deref()).await?;

        if !output.status.success() {
            return Err(AppError::gear_parse(
                player.to_string(),
                format!(
                    "parser exited with {}: {}",
                    exit_code(&output),
                    stderr_tail(&output)
                ),
            ));
        }

        match serde_json::from_slice::<Value>(&output.stdout) {
            Ok(snapshot @ Value::Object(_)) => Ok(snapshot),
            Ok(other) => Err(AppError::gear_parse(
                player.to_string(),
                format!("expected a JSON object, got {other}"),
            )),
            Err(e) => Err(AppError::gear_parse(
                player.to_string(),
                format!("invalid gear JSON: {e}"),
            )),
        }
    }
}
