//! Subprocess invocation shared by the external tool adapters.

use std::path::Path;
use std::process::{Output, Stdio};

use tokio::process::Command;

use crate::error::{AppError, Result};

/// Run `args[0]` with the remaining arguments and capture its output.
pub(crate) async fn run_capture(args: &[String], workdir: Option<&Path>) -> Result<Output> {
    let (program, rest) = args
        .split_first()
        .ok_or_else(|| AppError::config("empty command template"))?;

    let mut command = Command::new(program);
    command
        .args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = workdir {
        command.current_dir(dir);
    }

    command
        .output()
        .await
        .map_err(|e| AppError::process(program, e))
}

/// Last non-empty stderr line, for error messages.
pub(crate) fn stderr_tail(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("")
        .trim()
        .to_string()
}

/// Exit code of a finished process; `-1` when killed by a signal.
pub(crate) fn exit_code(output: &Output) -> i32 {
    output.status.code().unwrap_or(-1)
}
