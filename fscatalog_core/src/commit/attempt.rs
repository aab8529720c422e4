//! Attempt resolution and attempt-workspace classification.
//!
//! An attempt moves `EMPTY → INFLIGHT → { PUBLISHED | EXPIRED }`. The two
//! terminal transitions are irreversible: a published version rolls the
//! resolver forward, an expired attempt rolls the sub-resolver forward.

use std::path::PathBuf;

use tracing::debug;

use crate::storage::{FileEntry, StorageDriver};

use super::error::CommitError;
use super::layout::{self, Marker};
use super::version::VersionPaths;

/// Paths for the current attempt under one version.
#[derive(Debug, Clone)]
pub struct AttemptPaths {
    pub attempt: u64,
    pub dir: PathBuf,
}

/// One client's footprint in an attempt workspace: its phase-one marker,
/// its phase-two marker, or both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientGroup {
    pub key: String,
    pub has_pre_commit: bool,
    pub has_commit: bool,
}

impl ClientGroup {
    pub fn member_count(&self) -> usize {
        usize::from(self.has_pre_commit) + usize::from(self.has_commit)
    }

    /// Both phases written: evidence of a completed two-phase write.
    pub fn is_complete_pair(&self) -> bool {
        self.has_pre_commit && self.has_commit
    }
}

/// Classification of an attempt workspace from a single listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptState {
    /// Nothing written yet; the two-phase sequence may begin
    Empty,
    /// The fencing marker is present; this attempt is dead
    Expired,
    /// One or more clients are mid-protocol
    InFlight {
        groups: Vec<ClientGroup>,
        latest_mtime: i64,
    },
}

/// Select the current attempt under a resolved version, rolling forward
/// exactly once past an expired attempt.
pub(crate) fn resolve_attempt<D: StorageDriver>(
    driver: &D,
    version: &VersionPaths,
) -> Result<AttemptPaths, CommitError> {
    let mut attempt = 0;
    for entry in driver.list_files(&version.sub_tracker_dir, false)? {
        attempt = attempt.max(layout::parse_sentinel_name(&entry.file_name)?);
    }

    let mut dir = version.commit_dir.join(attempt.to_string());
    if driver.exists(&dir.join(layout::EXPIRED_HINT_NAME))? {
        debug!(version = version.version, attempt, "attempt expired, rolling forward");
        attempt += 1;
        dir = version.commit_dir.join(attempt.to_string());
    }

    driver.create_dir(&dir)?;
    let sentinel = Marker::new(
        driver,
        version.sub_tracker_dir.join(layout::sentinel_name(attempt)),
    );
    if !sentinel.observe()? {
        sentinel.claim(&attempt.to_string())?;
    }

    Ok(AttemptPaths { attempt, dir })
}

/// Classify the attempt workspace from one fresh listing. Listings are never
/// cached across checkpoints; every decision point re-reads directory state
/// so a racing client's work is observed.
pub(crate) fn scan_attempt<D: StorageDriver>(
    driver: &D,
    attempt: &AttemptPaths,
) -> Result<AttemptState, CommitError> {
    let entries = driver.list_files(&attempt.dir, false)?;
    Ok(classify(&entries))
}

pub(crate) fn classify(entries: &[FileEntry]) -> AttemptState {
    if entries.is_empty() {
        return AttemptState::Empty;
    }
    if entries.iter().any(|e| e.file_name == layout::EXPIRED_HINT_NAME) {
        return AttemptState::Expired;
    }

    let mut groups: Vec<ClientGroup> = Vec::new();
    let mut latest_mtime = i64::MIN;
    for entry in entries {
        latest_mtime = latest_mtime.max(entry.last_modified);
        let key = layout::client_key(&entry.file_name);
        let is_pre_commit = entry.file_name.starts_with(layout::PRE_COMMIT_PREFIX);
        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => {
                if is_pre_commit {
                    group.has_pre_commit = true;
                } else {
                    group.has_commit = true;
                }
            }
            None => groups.push(ClientGroup {
                key: key.to_string(),
                has_pre_commit: is_pre_commit,
                has_commit: !is_pre_commit,
            }),
        }
    }

    AttemptState::InFlight { groups, latest_mtime }
}
