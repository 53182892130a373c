//! JSON log of successfully ingested files

use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::storage::{read_json, write_json_atomic};
use crate::types::UploadLogEntry;

/// Upload log persisted as a JSON array
pub struct UploadLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl UploadLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries; a file that is not valid JSON reads as empty
    pub async fn list(&self) -> Result<Vec<UploadLogEntry>> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    /// Append one entry
    pub async fn append(&self, entry: UploadLogEntry) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        entries.push(entry);
        write_json_atomic(&self.path, &entries).await
    }

    /// Remove every entry for a filename, returning how many were removed
    pub async fn remove_by_filename(&self, filename: &str) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        let before = entries.len();
        entries.retain(|e| e.filename != filename);
        let removed = before - entries.len();
        if removed > 0 {
            write_json_atomic(&self.path, &entries).await?;
        }
        Ok(removed)
    }

    /// Drop every entry, returning how many there were
    pub async fn clear(&self) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let removed = self.load().await?.len();
        write_json_atomic(&self.path, &Vec::<UploadLogEntry>::new()).await?;
        Ok(removed)
    }

    async fn load(&self) -> Result<Vec<UploadLogEntry>> {
        match read_json::<Vec<UploadLogEntry>>(&self.path).await {
            Ok(entries) => Ok(entries.unwrap_or_default()),
            Err(Error::Json(e)) => {
                tracing::warn!("Upload log {} is not valid JSON, starting over: {}", self.path.display(), e);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}
