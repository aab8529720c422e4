//! Retirement of superseded versions: tracker archival and batch GC.
//!
//! Cleanup is woven into the protocol itself so no single successful writer
//! is responsible for it: every publication archives what has aged out and
//! deletes at most a small batch of expired workspaces. A client that dies
//! mid-cleanup leaves work that the next publication re-observes.

use std::path::Path;

use tracing::debug;

use crate::config::CommitConfig;
use crate::storage::StorageDriver;

use super::error::CommitError;
use super::layout;

/// Migrate tracker sentinels older than the retention window into archive
/// tombstones, then drop the sentinels.
///
/// Concurrent archivers may write tombstones with different expirations for
/// the same version; that is benign and at worst delays cleanup. A sentinel
/// whose tombstone already exists is still deleted, which finishes the job
/// of an archiver that died between the two steps.
pub(crate) fn archive_aged_trackers<D: StorageDriver>(
    driver: &D,
    root: &Path,
    config: &CommitConfig,
    current_version: u64,
) -> Result<(), CommitError> {
    let tracker_dir = root.join(layout::TRACKER_DIR);
    let archive_dir = root.join(layout::ARCHIVE_DIR);

    let mut tombstoned = Vec::new();
    for entry in driver.list_files(&archive_dir, false)? {
        let (version, _) = layout::parse_archive_name(&entry.file_name)?;
        tombstoned.push(version);
    }

    for entry in driver.list_files(&tracker_dir, false)? {
        let version = layout::parse_sentinel_name(&entry.file_name)?;
        if current_version.saturating_sub(version) <= config.max_saved_versions {
            continue;
        }
        if !tombstoned.contains(&version) {
            let expire = driver.now_millis() + config.clean_ttl_ms;
            driver.write_file(
                &archive_dir.join(layout::archive_name(version, expire)),
                &expire.to_string(),
            )?;
            debug!(version, expire, "tracker archived");
        }
        driver.delete(&tracker_dir.join(&entry.file_name), false)?;
    }
    Ok(())
}

/// Delete expired commit workspaces, oldest version first.
///
/// Rate-limited to one tombstone per call until the archive outgrows
/// `max_archive_size`, then `archive_batch_size` per call. Deletions are
/// idempotent and never retried here; a failure leaves the tombstone for
/// the next caller.
pub(crate) fn clean_expired_commits<D: StorageDriver>(
    driver: &D,
    root: &Path,
    config: &CommitConfig,
) -> Result<(), CommitError> {
    let archive_dir = root.join(layout::ARCHIVE_DIR);

    let mut tombstones = Vec::new();
    for entry in driver.list_files(&archive_dir, false)? {
        let (version, expire) = layout::parse_archive_name(&entry.file_name)?;
        tombstones.push((version, expire, entry.file_name));
    }
    tombstones.sort_by_key(|&(version, _, _)| version);

    let batch = if tombstones.len() > config.max_archive_size {
        config.archive_batch_size
    } else {
        1
    };
    let now = driver.now_millis();

    for (version, expire, name) in tombstones.into_iter().take(batch) {
        if expire > now {
            continue;
        }
        debug!(version, "deleting expired commit workspace");
        driver.delete(&root.join(layout::COMMIT_DIR).join(version.to_string()), true)?;
        driver.delete(&archive_dir.join(name), false)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryDriver;
    use std::path::PathBuf;

    fn root() -> PathBuf {
        PathBuf::from("catalog")
    }

    fn stage_tracker(driver: &MemoryDriver, version: u64) {
        driver
            .write_file(
                &root().join("tracker").join(format!("{}.txt", version)),
                &version.to_string(),
            )
            .unwrap();
    }

    fn tracker_versions(driver: &MemoryDriver) -> Vec<u64> {
        let mut versions: Vec<u64> = driver
            .file_paths()
            .into_iter()
            .filter(|p| p.starts_with(root().join("tracker")))
            .map(|p| {
                layout::parse_sentinel_name(&p.file_name().unwrap().to_string_lossy()).unwrap()
            })
            .collect();
        versions.sort();
        versions
    }

    fn archive_entries(driver: &MemoryDriver) -> Vec<String> {
        let mut names: Vec<String> = driver
            .file_paths()
            .into_iter()
            .filter(|p| p.starts_with(root().join("archive")))
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_archives_only_beyond_retention_window() {
        let driver = MemoryDriver::new();
        driver.set_clock(1_000);
        for version in 0..=3 {
            stage_tracker(&driver, version);
        }

        archive_aged_trackers(&driver, &root(), &CommitConfig::default(), 3).unwrap();

        assert_eq!(tracker_versions(&driver), vec![1, 2, 3]);
        assert_eq!(archive_entries(&driver), vec!["0.txt@601000"]);
        assert_eq!(
            driver.read_file(&root().join("archive/0.txt@601000")).unwrap(),
            "601000"
        );
    }

    #[test]
    fn test_no_archival_at_exact_retention_boundary() {
        let driver = MemoryDriver::new();
        for version in 0..=2 {
            stage_tracker(&driver, version);
        }

        archive_aged_trackers(&driver, &root(), &CommitConfig::default(), 2).unwrap();

        assert_eq!(tracker_versions(&driver), vec![0, 1, 2]);
        assert!(archive_entries(&driver).is_empty());
    }

    #[test]
    fn test_existing_tombstone_is_kept_and_sentinel_still_dropped() {
        let driver = MemoryDriver::new();
        driver.set_clock(1_000);
        stage_tracker(&driver, 0);
        stage_tracker(&driver, 5);
        driver.write_file(&root().join("archive/0.txt@99"), "99").unwrap();

        archive_aged_trackers(&driver, &root(), &CommitConfig::default(), 5).unwrap();

        assert_eq!(tracker_versions(&driver), vec![5]);
        assert_eq!(archive_entries(&driver), vec!["0.txt@99"]);
    }

    #[test]
    fn test_gc_waits_for_expiry() {
        let driver = MemoryDriver::new();
        driver.set_clock(1_000);
        driver.write_file(&root().join("archive/0.txt@5000"), "5000").unwrap();
        driver.write_file(&root().join("commit/0/0/u.txt"), "u").unwrap();

        clean_expired_commits(&driver, &root(), &CommitConfig::default()).unwrap();
        assert_eq!(archive_entries(&driver), vec!["0.txt@5000"]);

        driver.set_clock(6_000);
        clean_expired_commits(&driver, &root(), &CommitConfig::default()).unwrap();
        assert!(archive_entries(&driver).is_empty());
        assert!(!driver.exists(&root().join("commit/0")).unwrap());
    }

    #[test]
    fn test_gc_deletes_one_per_call_by_default() {
        let driver = MemoryDriver::new();
        driver.set_clock(10_000);
        for version in 0..3 {
            driver
                .write_file(
                    &root().join("archive").join(layout::archive_name(version, 1)),
                    "1",
                )
                .unwrap();
        }

        clean_expired_commits(&driver, &root(), &CommitConfig::default()).unwrap();
        // Oldest version went first
        assert_eq!(archive_entries(&driver), vec!["1.txt@1", "2.txt@1"]);

        clean_expired_commits(&driver, &root(), &CommitConfig::default()).unwrap();
        assert_eq!(archive_entries(&driver), vec!["2.txt@1"]);
    }

    #[test]
    fn test_gc_batches_under_pressure() {
        let driver = MemoryDriver::new();
        driver.set_clock(10_000);
        let config = CommitConfig::default()
            .with_max_archive_size(4)
            .with_archive_batch_size(3);
        for version in 0..6 {
            driver
                .write_file(
                    &root().join("archive").join(layout::archive_name(version, 1)),
                    "1",
                )
                .unwrap();
        }

        clean_expired_commits(&driver, &root(), &config).unwrap();
        assert_eq!(archive_entries(&driver).len(), 3);
    }

    #[test]
    fn test_gc_skips_unexpired_within_batch() {
        let driver = MemoryDriver::new();
        driver.set_clock(10_000);
        // Oldest tombstone not yet expired; batch of one ends the call
        driver
            .write_file(&root().join("archive/0.txt@99999"), "99999")
            .unwrap();
        driver.write_file(&root().join("archive/1.txt@1"), "1").unwrap();

        clean_expired_commits(&driver, &root(), &CommitConfig::default()).unwrap();
        assert_eq!(archive_entries(&driver), vec!["0.txt@99999", "1.txt@1"]);
    }

    #[test]
    fn test_malformed_archive_name_is_fatal() {
        let driver = MemoryDriver::new();
        driver.write_file(&root().join("archive/0.txt"), "0").unwrap();

        let err = clean_expired_commits(&driver, &root(), &CommitConfig::default()).unwrap_err();
        assert!(matches!(err, CommitError::MalformedName(_)));
    }
}
