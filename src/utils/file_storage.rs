//! JSON file storage

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::traits::*;
use crate::types::*;

/// Keeps the snapshot as a pretty-printed JSON document on disk
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStorage {
    async fn load(&self) -> LedgerResult<Option<Snapshot>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LedgerError::Storage(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        if contents.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&contents).map(Some).map_err(|e| {
            LedgerError::Storage(format!(
                "Failed to parse snapshot {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    async fn save(&mut self, snapshot: &Snapshot) -> LedgerResult<()> {
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| LedgerError::Storage(format!("Failed to serialize snapshot: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                LedgerError::Storage(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        // Replaced through a staging file and a rename
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json).await.map_err(|e| {
            LedgerError::Storage(format!("Failed to write {}: {}", staging.display(), e))
        })?;
        fs::rename(&staging, &self.path).await.map_err(|e| {
            LedgerError::Storage(format!("Failed to replace {}: {}", self.path.display(), e))
        })?;

        Ok(())
    }
}
