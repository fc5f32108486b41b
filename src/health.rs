//! Liveness marker written after every completed cycle

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Side channel consumed by an external liveness watcher
pub trait HealthSignal: Send + Sync {
    fn beat(&self, at: DateTime<Utc>) -> std::io::Result<()>;
}

/// Overwrites a file with the RFC 3339 time of the last completed cycle
#[derive(Debug, Clone)]
pub struct FileHealthPing {
    path: PathBuf,
}

impl FileHealthPing {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HealthSignal for FileHealthPing {
    fn beat(&self, at: DateTime<Utc>) -> std::io::Result<()> {
        std::fs::write(&self.path, at.to_rfc3339())
    }
}
