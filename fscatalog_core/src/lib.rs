//! Optimistic, file-system-based commit coordination for a versioned
//! catalog.
//!
//! Independent clients publish catalog versions by writing marker files into
//! a shared storage substrate, with no central metadata service and no
//! locks. For any version number at most one client's commit becomes durable
//! and visible; every loser observably fails so it can retry at the next
//! version. Garbage collection of superseded versions is part of the same
//! protocol, so no single successful writer is responsible for cleanup.

pub mod commit;
pub mod config;
pub mod storage;

pub use commit::{CommitCoordinator, CommitError, CommitOutcome};
pub use config::{CommitConfig, ConfigError};
pub use storage::{FileEntry, LocalFsDriver, MemoryDriver, StorageDriver, StorageError};
