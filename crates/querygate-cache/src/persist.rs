//! Snapshot persistence
//!
//! The file holds a versioned envelope with a SHA-256 checksum of the
//! snapshot JSON. Writes go to a sibling temp file that is renamed into
//! place, so readers see either the old file or the new one.

use crate::error::SchemaError;
use querygate_core::SchemaSnapshot;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Current on-disk format version
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSnapshot {
    version: u32,
    checksum: String,
    snapshot: SchemaSnapshot,
}

fn checksum(snapshot: &SchemaSnapshot) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(snapshot)?;
    Ok(hex::encode(Sha256::digest(&json)))
}

/// Location of the persisted snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    /// Create a handle for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn corrupt(&self, reason: impl Into<String>) -> SchemaError {
        SchemaError::Corrupt {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn persist_error(&self, reason: impl Into<String>) -> SchemaError {
        SchemaError::Persist {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    /// Read the persisted snapshot
    ///
    /// Returns `Ok(None)` when no file exists. Unreadable, malformed,
    /// mismatched or empty snapshots are reported as [`SchemaError::Corrupt`].
    pub async fn read(&self) -> Result<Option<SchemaSnapshot>, SchemaError> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.corrupt(e.to_string())),
        };

        let persisted: PersistedSnapshot = serde_json::from_slice(&contents)
            .map_err(|e| self.corrupt(e.to_string()))?;

        if persisted.version != FORMAT_VERSION {
            return Err(self.corrupt(format!(
                "unsupported format version {} (expected {})",
                persisted.version, FORMAT_VERSION
            )));
        }

        let actual = checksum(&persisted.snapshot).map_err(|e| self.corrupt(e.to_string()))?;
        if actual != persisted.checksum {
            return Err(self.corrupt("checksum mismatch"));
        }

        if persisted.snapshot.is_empty() {
            return Err(self.corrupt("snapshot has no tables"));
        }

        Ok(Some(persisted.snapshot))
    }

    /// Write the snapshot atomically
    ///
    /// The write runs on a blocking task: once started it completes even if
    /// the awaiting future is dropped.
    pub async fn write(&self, snapshot: &SchemaSnapshot) -> Result<(), SchemaError> {
        self.write_holding(snapshot, ()).await
    }

    /// Write the snapshot atomically, keeping `held` alive until the file is
    /// in place
    ///
    /// `held` is dropped by the blocking task after the rename, so a lock
    /// guard passed here keeps other writers out even when the awaiting
    /// future is dropped mid-write.
    pub async fn write_holding<H>(&self, snapshot: &SchemaSnapshot, held: H) -> Result<(), SchemaError>
    where
        H: Send + 'static,
    {
        let persisted = PersistedSnapshot {
            version: FORMAT_VERSION,
            checksum: checksum(snapshot).map_err(|e| self.persist_error(e.to_string()))?,
            snapshot: snapshot.clone(),
        };
        let json = serde_json::to_vec_pretty(&persisted)
            .map_err(|e| self.persist_error(e.to_string()))?;

        let path = self.path.clone();
        let temp = self.temp_path();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let _held = held;
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(&temp, &json)?;
            std::fs::rename(&temp, &path)
        })
        .await
        .map_err(|e| self.persist_error(e.to_string()))?
        .map_err(|e| self.persist_error(e.to_string()))
    }

    /// Delete the persisted snapshot, if any
    pub async fn remove(&self) -> Result<(), SchemaError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.persist_error(e.to_string())),
        }
    }
}
