//! Abstract storage substrate consumed by the commit protocol.
//!
//! The coordinator is written against this narrow surface so that any backend
//! with consistent listings can host the catalog: a local POSIX filesystem,
//! HDFS, or an object store with list-after-write consistency. Two backends
//! ship with the crate: [`crate::storage::LocalFsDriver`] and
//! [`crate::storage::MemoryDriver`].

use std::path::Path;

use thiserror::Error;

/// Errors surfaced by a storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error from a filesystem-backed driver
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by a non-filesystem backend
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A single file observed in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Last path segment of the file
    pub file_name: String,
    /// Modification time in epoch milliseconds, as reported by the backend
    pub last_modified: i64,
}

/// Directory and file primitives the protocol runs on.
///
/// Required backend guarantees: read-your-writes within one client, monotonic
/// listings (a visible name stays visible until deleted), and no filename
/// collisions. Writes do NOT need to be atomic; filenames, never contents,
/// carry protocol meaning. Backends with eventually-consistent listings can
/// let two clients miss each other and both believe they won.
pub trait StorageDriver {
    /// Create a directory. Succeeds if it already exists.
    fn create_dir(&self, path: &Path) -> Result<(), StorageError>;

    /// Whether a file or directory exists at `path`.
    fn exists(&self, path: &Path) -> Result<bool, StorageError>;

    /// List the files under `dir`. A missing directory lists as empty.
    /// Entry order is unspecified.
    fn list_files(&self, dir: &Path, recursive: bool) -> Result<Vec<FileEntry>, StorageError>;

    /// Whole-file put. No atomicity is guaranteed and a partial write is
    /// acceptable; overwriting is allowed.
    fn write_file(&self, path: &Path, contents: &str) -> Result<(), StorageError>;

    /// Delete a file or directory tree. A missing target is success.
    fn delete(&self, path: &Path, recursive: bool) -> Result<(), StorageError>;

    /// The backend clock, in epoch milliseconds. All staleness and expiry
    /// arithmetic in the protocol uses this clock, never the caller's.
    fn now_millis(&self) -> i64;
}
