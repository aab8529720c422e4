//! The optimistic two-phase committer.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::CommitConfig;
use crate::storage::StorageDriver;

use super::adjudicate::adjudicate;
use super::archive::{archive_aged_trackers, clean_expired_commits};
use super::attempt::{resolve_attempt, scan_attempt, AttemptPaths};
use super::error::CommitError;
use super::layout::{self, Marker};
use super::version::{max_tracked_version, resolve_version, VersionPaths};

/// Receipt for a successful publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub version: u64,
    pub attempt: u64,
    pub client_id: String,
}

/// Optimistic commit coordinator over a shared storage substrate.
///
/// Any number of coordinators on separate hosts may run [`commit`] against
/// the same root concurrently. For each version number at most one client's
/// publication becomes durable; every other writer fails with
/// [`CommitError::ConcurrentModification`] and retries at the next version.
/// There is no locking and no leader; coordination happens purely through
/// file names on the shared substrate.
///
/// [`commit`]: CommitCoordinator::commit
pub struct CommitCoordinator<D: StorageDriver> {
    driver: D,
    root: PathBuf,
    config: CommitConfig,
}

impl<D: StorageDriver> CommitCoordinator<D> {
    pub fn new(driver: D, root: impl AsRef<Path>) -> Self {
        Self::with_config(driver, root, CommitConfig::default())
    }

    pub fn with_config(driver: D, root: impl AsRef<Path>, config: CommitConfig) -> Self {
        Self {
            driver,
            root: root.as_ref().to_path_buf(),
            config,
        }
    }

    pub fn config(&self) -> &CommitConfig {
        &self.config
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Attempt to publish the next catalog version.
    ///
    /// One full protocol pass: resolve the target version and attempt,
    /// adjudicate any debris, then run the check-write-check sequence (a
    /// phase-one marker and a peer check, a phase-two marker and a recheck,
    /// and only then the publication hint). Archival and GC of superseded
    /// versions run after publication.
    ///
    /// On `ConcurrentModification` the caller retries the whole call; the
    /// retry re-resolves and may land on a new version or attempt.
    pub fn commit(&self) -> Result<CommitOutcome, CommitError> {
        let version = resolve_version(&self.driver, &self.root)?;
        let attempt = resolve_attempt(&self.driver, &version)?;

        let state = scan_attempt(&self.driver, &attempt)?;
        adjudicate(&self.driver, &self.config, &version, &attempt, &state)?;

        let client_id = new_client_id();
        debug!(
            version = version.version,
            attempt = attempt.attempt,
            client = %client_id,
            "beginning two-phase commit"
        );

        // Phase one: stake a claim, then look for peers.
        let pre_commit = layout::pre_commit_name(&client_id);
        self.driver
            .write_file(&attempt.dir.join(&pre_commit), &pre_commit)?;
        self.check_alone(&version, &attempt, &client_id, false)?;

        // Phase two: confirm the claim, then look again. A peer that entered
        // phase one while we were between writes is caught here.
        self.driver
            .write_file(&attempt.dir.join(layout::commit_name(&client_id)), &client_id)?;
        self.check_alone(&version, &attempt, &client_id, true)?;

        // Publish. The hint's appearance is what makes the version visible;
        // everything after it is cleanup.
        Marker::new(&self.driver, version.hint_file.clone())
            .claim(&layout::hint_body(&client_id, attempt.attempt))?;
        Marker::new(
            &self.driver,
            version.sub_hint_dir.join(layout::commit_name(&client_id)),
        )
        .claim(&client_id)?;
        debug!(version = version.version, attempt = attempt.attempt, "published");

        archive_aged_trackers(&self.driver, &self.root, &self.config, version.version)?;
        clean_expired_commits(&self.driver, &self.root, &self.config)?;

        Ok(CommitOutcome {
            version: version.version,
            attempt: attempt.attempt,
            client_id,
        })
    }

    /// Retry [`commit`] while it loses races, up to `max_retries` further
    /// passes. Only `ConcurrentModification` is retried; storage failures
    /// and corruption surface immediately.
    ///
    /// [`commit`]: CommitCoordinator::commit
    pub fn commit_with_retries(&self, max_retries: usize) -> Result<CommitOutcome, CommitError> {
        let mut remaining = max_retries;
        loop {
            match self.commit() {
                Err(err) if err.is_retryable() && remaining > 0 => {
                    remaining -= 1;
                    debug!(remaining, "commit contended, retrying");
                }
                outcome => return outcome,
            }
        }
    }

    /// Run the archiver and GC without committing.
    ///
    /// `commit` only cleans up on its success path, so a long run of
    /// contended commits never advances archival; this entry point lets
    /// cleanup proceed independently. It never touches attempt workspaces
    /// of live versions.
    pub fn run_maintenance(&self) -> Result<(), CommitError> {
        self.driver.create_dir(&self.root.join(layout::TRACKER_DIR))?;
        self.driver.create_dir(&self.root.join(layout::COMMIT_DIR))?;
        self.driver.create_dir(&self.root.join(layout::ARCHIVE_DIR))?;

        if let Some(current) = max_tracked_version(&self.driver, &self.root)? {
            archive_aged_trackers(&self.driver, &self.root, &self.config, current)?;
        }
        clean_expired_commits(&self.driver, &self.root, &self.config)
    }

    /// List the attempt workspace and fail unless everything in it is ours.
    fn check_alone(
        &self,
        version: &VersionPaths,
        attempt: &AttemptPaths,
        client_id: &str,
        own_commit_written: bool,
    ) -> Result<(), CommitError> {
        let own_pre_commit = layout::pre_commit_name(client_id);
        let own_commit = layout::commit_name(client_id);
        for entry in self.driver.list_files(&attempt.dir, false)? {
            if entry.file_name == own_pre_commit {
                continue;
            }
            if own_commit_written && entry.file_name == own_commit {
                continue;
            }
            warn!(
                version = version.version,
                attempt = attempt.attempt,
                peer = %entry.file_name,
                "peer artifact observed, aborting"
            );
            return Err(CommitError::ConcurrentModification {
                version: version.version,
                attempt: attempt.attempt,
            });
        }
        Ok(())
    }
}

/// Fresh client id for one protocol pass. Hyphenated v4 output never starts
/// with the phase-one prefix, contains no `@`, and cannot equal a reserved
/// marker name.
fn new_client_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryDriver;

    #[test]
    fn test_solo_commit_publishes_version_zero() {
        let driver = MemoryDriver::new();
        let coordinator = CommitCoordinator::new(driver.clone(), "catalog");

        let outcome = coordinator.commit().unwrap();
        assert_eq!(outcome.version, 0);
        assert_eq!(outcome.attempt, 0);

        let hint = driver
            .read_file(Path::new("catalog/commit/0/sub-hint/COMMIT-HINT.TXT"))
            .unwrap();
        assert_eq!(hint, format!("{}@0", outcome.client_id));
    }

    #[test]
    fn test_sequential_commits_advance_versions() {
        let driver = MemoryDriver::new();
        let coordinator = CommitCoordinator::new(driver, "catalog");

        for expected in 0..4 {
            let outcome = coordinator.commit().unwrap();
            assert_eq!(outcome.version, expected);
        }
    }

    #[test]
    fn test_each_pass_uses_a_fresh_client_id() {
        let driver = MemoryDriver::new();
        let coordinator = CommitCoordinator::new(driver, "catalog");

        let first = coordinator.commit().unwrap();
        let second = coordinator.commit().unwrap();
        assert_ne!(first.client_id, second.client_id);
    }

    #[test]
    fn test_retries_exhaust_on_persistent_contention() {
        let driver = MemoryDriver::new();
        let coordinator = CommitCoordinator::new(driver.clone(), "catalog");

        // A live peer pre-commit makes every pass lose; attempts are live so
        // nothing is fenced and the contention never clears.
        driver
            .write_file(
                Path::new("catalog/commit/0/0/PRE_COMMIT-peer.txt"),
                "PRE_COMMIT-peer.txt",
            )
            .unwrap();

        let err = coordinator.commit_with_retries(3).unwrap_err();
        assert!(err.is_concurrent_modification());
    }

    #[test]
    fn test_retries_win_after_fencing_clears_a_stale_attempt() {
        let driver = MemoryDriver::new();
        let coordinator = CommitCoordinator::new(driver.clone(), "catalog");

        driver
            .write_file(
                Path::new("catalog/commit/0/0/PRE_COMMIT-peer.txt"),
                "PRE_COMMIT-peer.txt",
            )
            .unwrap();
        driver.advance_clock(31_000);

        // Pass 1 fences the stale attempt, pass 2 wins at attempt 1
        let outcome = coordinator.commit_with_retries(3).unwrap();
        assert_eq!(outcome.version, 0);
        assert_eq!(outcome.attempt, 1);
    }

    #[test]
    fn test_maintenance_on_empty_root_is_a_no_op() {
        let driver = MemoryDriver::new();
        let coordinator = CommitCoordinator::new(driver.clone(), "catalog");

        coordinator.run_maintenance().unwrap();
        assert!(driver.file_paths().is_empty());
    }

    #[test]
    fn test_maintenance_archives_without_a_commit() {
        let driver = MemoryDriver::new();
        let config = CommitConfig::default().with_clean_ttl_ms(1_000);
        let coordinator = CommitCoordinator::with_config(driver.clone(), "catalog", config);

        for _ in 0..4 {
            coordinator.commit().unwrap();
        }
        // Version 0 aged out during the last commit; its workspace survives
        // until the tombstone expires
        assert!(driver.exists(Path::new("catalog/commit/0")).unwrap());

        driver.advance_clock(2_000);
        coordinator.run_maintenance().unwrap();
        assert!(!driver.exists(Path::new("catalog/commit/0")).unwrap());
    }
}
