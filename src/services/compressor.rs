//! Raw log compressor adapter.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{AppError, Result};

/// Compresses one file into a single-file archive.
#[async_trait]
pub trait Compressor: Send + Sync {
    /// Check the compressor can be run at all.
    async fn ensure_available(&self) -> Result<()> {
        Ok(())
    }

    /// Compress `source` into `dest`, returning the tool's exit code.
    ///
    /// `0` means the archive was written.
    async fn compress(&self, source: &Path, dest: &Path) -> Result<i32>;
}

/// 7-Zip command line compressor.
#[derive(Debug, Clone)]
pub struct SevenZip {
    program: String,
}

impl SevenZip {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SevenZip {
    fn default() -> Self {
        Self::new("7z")
    }
}

#[async_trait]
impl Compressor for SevenZip {
    async fn ensure_available(&self) -> Result<()> {
        Command::new(&self.program)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|_| ())
            .map_err(|e| AppError::process(&self.program, e))
    }

    async fn compress(&self, source: &Path, dest: &Path) -> Result<i32> {
        let status = Command::new(&self.program)
            .arg("a")
            .arg("-y")
            .arg(dest)
            .arg(source)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| AppError::process(&self.program, e))?;

        Ok(status.code().unwrap_or(-1))
    }
}
