//! Local filesystem layout of per-report files.
//!
//! ## Storage Layout
//!
//! ```text
//! {data_dir}/
//! ├── uploads/pending_archive/
//! │   ├── {report_id}.txt        # Raw log text awaiting processing
//! │   └── {report_id}.timezone   # Upload-time sidecar, removed at cleanup
//! ├── LogsDir/{report_id}/
//! │   └── top.json               # Ranking artifact written by the top builder
//! └── LogsRaw/
//!     └── {report_id}.7z         # Compressed raw log
//! ```
//!
//! Each report's files are written by exactly one task of a batch, so no
//! locking is needed. JSON artifacts are written atomically.

use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::config::Directories;
use crate::error::{AppError, Result};
use crate::models::{PipelineConfig, ReportId, TopData};

/// Extension of compressed raw logs.
pub const ARCHIVE_EXTENSION: &str = "7z";

/// Local filesystem storage of per-report files.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    dirs: Directories,
    raw_extension: String,
    timezone_extension: String,
    top_file_name: String,
}

impl LocalStorage {
    /// Create a LocalStorage over the given directory layout.
    pub fn new(dirs: Directories, pipeline: &PipelineConfig) -> Self {
        Self {
            dirs,
            raw_extension: pipeline.raw_extension.clone(),
            timezone_extension: pipeline.timezone_extension.clone(),
            top_file_name: pipeline.top_file_name.clone(),
        }
    }

    pub fn dirs(&self) -> &Directories {
        &self.dirs
    }

    pub fn raw_extension(&self) -> &str {
        &self.raw_extension
    }

    pub fn top_file_name(&self) -> &str {
        &self.top_file_name
    }

    /// Pending raw-text file of a report.
    pub fn pending_text(&self, id: &ReportId) -> PathBuf {
        self.dirs
            .pending
            .join(format!("{}.{}", id, self.raw_extension))
    }

    /// Timezone sidecar of a pending report.
    pub fn timezone_hint(&self, id: &ReportId) -> PathBuf {
        self.dirs
            .pending
            .join(format!("{}.{}", id, self.timezone_extension))
    }

    /// Ranking artifact of a report.
    pub fn top_artifact(&self, id: &ReportId) -> PathBuf {
        self.dirs.logs.join(id.as_str()).join(&self.top_file_name)
    }

    /// Compressed raw log of a report.
    pub fn archive_path(&self, id: &ReportId) -> PathBuf {
        self.dirs
            .archives
            .join(format!("{}.{}", id, ARCHIVE_EXTENSION))
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    pub async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.ensure_dir(path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Write JSON data.
    pub async fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.write_bytes(path, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    pub async fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    pub async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match self.read_bytes(path).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Remove a file, returning whether it existed.
    pub async fn remove_file(&self, path: &Path) -> Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Load a report's ranking artifact, if built.
    pub async fn load_top(&self, id: &ReportId) -> Result<Option<TopData>> {
        self.read_json(&self.top_artifact(id)).await
    }

    /// Persist a report's ranking artifact.
    pub async fn save_top(&self, id: &ReportId, data: &TopData) -> Result<()> {
        self.write_json(&self.top_artifact(id), data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PathsConfig;
    use serde_json::json;
    use tempfile::TempDir;

    fn storage(tmp: &TempDir) -> LocalStorage {
        let dirs = Directories::resolve(tmp.path(), &PathsConfig::default());
        LocalStorage::new(dirs, &PipelineConfig::default())
    }

    fn report() -> ReportId {
        ReportId::parse("24-01-02--20-00--Author--Alpha", "Unknown").unwrap()
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp);
        let path = tmp.path().join("nested/test.txt");

        storage.write_bytes(&path, b"hello").await.unwrap();
        let data = storage.read_bytes(&path).await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp);

        let data = storage.read_bytes(&tmp.path().join("nope.txt")).await.unwrap();
        assert!(data.is_none());
        assert!(!storage.remove_file(&tmp.path().join("nope.txt")).await.unwrap());
    }

    #[tokio::test]
    async fn test_top_round_trip() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp);
        let id = report();
        let data: TopData =
            serde_json::from_value(json!({"Boss1": {"normal": [{"u": 1, "d": 2, "t": 3, "n": "A"}]}}))
                .unwrap();

        assert!(storage.load_top(&id).await.unwrap().is_none());
        storage.save_top(&id, &data).await.unwrap();

        assert_eq!(storage.load_top(&id).await.unwrap(), Some(data));
        assert_eq!(
            storage.top_artifact(&id),
            tmp.path().join("LogsDir/24-01-02--20-00--Author--Alpha/top.json")
        );
    }

    #[test]
    fn test_report_paths() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp);
        let id = report();

        assert_eq!(
            storage.pending_text(&id),
            tmp.path()
                .join("uploads/pending_archive/24-01-02--20-00--Author--Alpha.txt")
        );
        assert_eq!(
            storage.timezone_hint(&id),
            tmp.path()
                .join("uploads/pending_archive/24-01-02--20-00--Author--Alpha.timezone")
        );
        assert_eq!(
            storage.archive_path(&id),
            tmp.path().join("LogsRaw/24-01-02--20-00--Author--Alpha.7z")
        );
    }
}
