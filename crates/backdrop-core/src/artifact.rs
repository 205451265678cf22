use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::PathsConfig;
use crate::error::Result;
use crate::fsutil::atomic_write;

/// Metadata of the image currently occupying the slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
}

impl ArtifactInfo {
    /// Modification time as fractional seconds since the Unix epoch.
    pub fn modified_epoch_secs(&self) -> f64 {
        self.modified.timestamp_millis() as f64 / 1000.0
    }
}

/// The single "current image" location.
///
/// Probing always stats the file; nothing is cached between calls. Writes go
/// through [`ArtifactSlot::replace`], which is all-or-nothing.
#[derive(Debug, Clone)]
pub struct ArtifactSlot {
    path: PathBuf,
}

impl ArtifactSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(paths: &PathsConfig) -> Self {
        Self::new(paths.artifact_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Defined only while the artifact exists.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.info().map(|i| i.modified)
    }

    pub fn info(&self) -> Option<ArtifactInfo> {
        let meta = std::fs::metadata(&self.path).ok()?;
        if !meta.is_file() {
            return None;
        }
        let modified = meta.modified().ok()?;
        Some(ArtifactInfo {
            path: self.path.clone(),
            size_bytes: meta.len(),
            modified: DateTime::<Utc>::from(modified),
        })
    }

    /// Atomically replace the slot contents. Returns the number of bytes written.
    pub fn replace(&self, bytes: &[u8]) -> Result<u64> {
        atomic_write(&self.path, bytes)?;
        Ok(bytes.len() as u64)
    }
}
