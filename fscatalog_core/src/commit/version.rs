//! Target-version resolution.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::storage::StorageDriver;

use super::error::CommitError;
use super::layout::{self, Marker};

/// Paths derived from a resolved target version.
#[derive(Debug, Clone)]
pub struct VersionPaths {
    pub version: u64,
    pub tracker_file: PathBuf,
    pub commit_dir: PathBuf,
    pub sub_tracker_dir: PathBuf,
    pub sub_hint_dir: PathBuf,
    pub hint_file: PathBuf,
}

impl VersionPaths {
    fn derive(root: &Path, version: u64) -> Self {
        let commit_dir = root.join(layout::COMMIT_DIR).join(version.to_string());
        let sub_hint_dir = commit_dir.join(layout::SUB_HINT_DIR);
        Self {
            version,
            tracker_file: root.join(layout::TRACKER_DIR).join(layout::sentinel_name(version)),
            sub_tracker_dir: commit_dir.join(layout::SUB_TRACKER_DIR),
            hint_file: sub_hint_dir.join(layout::COMMIT_HINT_NAME),
            sub_hint_dir,
            commit_dir,
        }
    }
}

/// Resolve the version the next commit should target.
///
/// The tracker is a hint, not the source of truth: a predecessor may have
/// published and died before updating `tracker/`. The commit hint file is
/// authoritative, so if the tracked maximum is already published we roll
/// forward exactly once, and never in a loop.
pub(crate) fn resolve_version<D: StorageDriver>(
    driver: &D,
    root: &Path,
) -> Result<VersionPaths, CommitError> {
    driver.create_dir(&root.join(layout::TRACKER_DIR))?;
    driver.create_dir(&root.join(layout::COMMIT_DIR))?;
    driver.create_dir(&root.join(layout::ARCHIVE_DIR))?;

    let tracked = max_tracked_version(driver, root)?.unwrap_or(0);
    let mut paths = VersionPaths::derive(root, tracked);

    if Marker::new(driver, paths.hint_file.clone()).observe()? {
        debug!(version = tracked, "tracked version already published, rolling forward");
        paths = VersionPaths::derive(root, tracked + 1);
    }

    let sentinel = Marker::new(driver, paths.tracker_file.clone());
    if !sentinel.observe()? {
        sentinel.claim(&paths.version.to_string())?;
    }

    driver.create_dir(&paths.commit_dir)?;
    driver.create_dir(&paths.sub_tracker_dir)?;
    driver.create_dir(&paths.sub_hint_dir)?;

    Ok(paths)
}

/// Maximum version recorded in `tracker/`, if any.
pub(crate) fn max_tracked_version<D: StorageDriver>(
    driver: &D,
    root: &Path,
) -> Result<Option<u64>, CommitError> {
    let mut max = None;
    for entry in driver.list_files(&root.join(layout::TRACKER_DIR), false)? {
        let version = layout::parse_sentinel_name(&entry.file_name)?;
        max = Some(max.map_or(version, |m: u64| m.max(version)));
    }
    Ok(max)
}
