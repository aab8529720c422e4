//! Error types for the commit protocol.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors that can occur while publishing a catalog version.
#[derive(Error, Debug)]
pub enum CommitError {
    /// Another client's artifact was observed at a checkpoint, or the
    /// attempt was fenced. The only recoverable failure: callers retry the
    /// whole commit, which re-resolves and may land on a new version.
    #[error("concurrent modification at version {version}, attempt {attempt}")]
    ConcurrentModification { version: u64, attempt: u64 },

    /// Backend failure, propagated unchanged. Whatever was already written
    /// stays on disk; later clients adjudicate the debris by staleness.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A filename that does not follow the layout grammar. The layout is
    /// never repaired automatically.
    #[error("malformed entry name: {0}")]
    MalformedName(String),
}

impl CommitError {
    /// Whether this failure is the expected lost-race outcome.
    pub fn is_concurrent_modification(&self) -> bool {
        matches!(self, CommitError::ConcurrentModification { .. })
    }

    /// Whether retrying the commit can succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        self.is_concurrent_modification()
    }
}
