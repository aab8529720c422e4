//! Coordinator configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading or saving a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tuning knobs for the commit protocol.
///
/// All of these are liveness knobs; safety never depends on them. The
/// defaults suit a catalog with a handful of writers on a filesystem-like
/// backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitConfig {
    /// How many versions below the current one stay in `tracker/` before
    /// the archiver migrates them
    pub max_saved_versions: u64,

    /// Archive size above which GC switches from one deletion per call to
    /// batched deletions
    pub max_archive_size: usize,

    /// Deletions per GC call in batch mode
    pub archive_batch_size: usize,

    /// Staleness threshold for adjudicating abandoned attempts, in
    /// backend-clock milliseconds
    pub pre_commit_ttl_ms: i64,

    /// Lifetime of an archive tombstone before GC deletes the commit
    /// workspace it points at, in backend-clock milliseconds
    pub clean_ttl_ms: i64,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            max_saved_versions: 2,
            max_archive_size: 100,
            archive_batch_size: 20,
            pre_commit_ttl_ms: 30_000,
            clean_ttl_ms: 600_000,
        }
    }
}

impl CommitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_saved_versions(mut self, count: u64) -> Self {
        self.max_saved_versions = count;
        self
    }

    pub fn with_max_archive_size(mut self, count: usize) -> Self {
        self.max_archive_size = count;
        self
    }

    pub fn with_archive_batch_size(mut self, count: usize) -> Self {
        self.archive_batch_size = count;
        self
    }

    pub fn with_pre_commit_ttl_ms(mut self, millis: i64) -> Self {
        self.pre_commit_ttl_ms = millis;
        self
    }

    pub fn with_clean_ttl_ms(mut self, millis: i64) -> Self {
        self.clean_ttl_ms = millis;
        self
    }

    /// Load a configuration from a JSON file. Returns `None` if the file
    /// doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Save the configuration as JSON, via temp file + rename so readers
    /// never observe a partial file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let temp_path = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&temp_path, &json)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }
}
