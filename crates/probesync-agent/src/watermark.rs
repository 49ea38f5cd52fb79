//! Watermark store
//!
//! Persists the single progress marker: the highest `last_seen` value
//! of any record confirmed delivered. The pipeline loads it once at
//! the start of a run and saves it at most once per delivered batch.
//!
//! Crash safety comes from write-then-rename: an interrupted save can
//! never leave a watermark higher than one actually confirmed
//! delivered. The value is clamped monotonically non-decreasing.

use crate::error::{AgentError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// On-disk watermark format: the scalar plus a human-readable
/// timestamp of the last update.
#[derive(Debug, Serialize, Deserialize)]
struct WatermarkFile {
    last_seen: i64,
    updated: DateTime<Utc>,
}

/// File-backed watermark store with atomic replace semantics.
#[derive(Debug, Clone)]
pub struct WatermarkStore {
    path: PathBuf,
}

impl WatermarkStore {
    /// Create a store backed by the given file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the persistence artifact
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted watermark, or 0 when no prior state exists.
    ///
    /// A present-but-unreadable file is a fatal error: continuing with
    /// a guessed watermark risks silent data loss.
    pub fn load(&self) -> Result<i64> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(AgentError::watermark(format!(
                    "cannot read {}: {}",
                    self.path.display(),
                    e
                )))
            },
        };

        let file: WatermarkFile = serde_json::from_str(&content).map_err(|e| {
            AgentError::watermark(format!("corrupt file {}: {}", self.path.display(), e))
        })?;

        Ok(file.last_seen)
    }

    /// Persist a new watermark value.
    ///
    /// Values at or below the currently persisted watermark are
    /// ignored, keeping the marker monotonically non-decreasing.
    pub fn save(&self, last_seen: i64) -> Result<()> {
        let current = self.load()?;
        if last_seen <= current {
            debug!(
                last_seen,
                current, "watermark save ignored, value not above current"
            );
            return Ok(());
        }

        let file = WatermarkFile {
            last_seen,
            updated: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&file)?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, content).map_err(|e| {
            AgentError::watermark(format!("cannot write {}: {}", tmp_path.display(), e))
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            AgentError::watermark(format!("cannot replace {}: {}", self.path.display(), e))
        })?;

        debug!(last_seen, path = %self.path.display(), "watermark advanced");
        Ok(())
    }
}
