//! Contention adjudication for populated attempt workspaces.

use tracing::warn;

use crate::config::CommitConfig;
use crate::storage::StorageDriver;

use super::attempt::{AttemptPaths, AttemptState, ClientGroup};
use super::error::CommitError;
use super::layout::{self, Marker};
use super::version::VersionPaths;

/// Decide what to do with the attempt workspace before any writing begins.
///
/// Returns `Ok` only for an empty workspace. Anything else ends in
/// `ConcurrentModification`, after at most one side effect, evaluated
/// strictly in order:
///
/// 1. Two or more clients mid-phase-one → fence the attempt.
/// 2. A single client finished both phases, went stale, and the version is
///    unpublished → complete its publication on its behalf.
/// 3. Any other stale, unpublished debris → fence the attempt.
/// 4. Otherwise the contention is live → fail, caller retries.
///
/// Staleness is measured against the backend clock only; the TTL is a
/// liveness knob and safety never depends on it.
pub(crate) fn adjudicate<D: StorageDriver>(
    driver: &D,
    config: &CommitConfig,
    version: &VersionPaths,
    attempt: &AttemptPaths,
    state: &AttemptState,
) -> Result<(), CommitError> {
    let conflict = || CommitError::ConcurrentModification {
        version: version.version,
        attempt: attempt.attempt,
    };

    let (groups, latest_mtime) = match state {
        AttemptState::Empty => return Ok(()),
        // Fencing marker raced in after resolution; the next pass rolls past it.
        AttemptState::Expired => return Err(conflict()),
        AttemptState::InFlight { groups, latest_mtime } => (groups.as_slice(), *latest_mtime),
    };

    if groups.len() >= 2 && groups.iter().all(|g| g.member_count() == 1) {
        warn!(
            version = version.version,
            attempt = attempt.attempt,
            writers = groups.len(),
            "multiple writers mid-phase-one, fencing attempt"
        );
        fence(driver, attempt)?;
        return Err(conflict());
    }

    let elapsed = driver.now_millis().saturating_sub(latest_mtime);
    let stale = elapsed > config.pre_commit_ttl_ms;
    let published = Marker::new(driver, version.hint_file.clone()).observe()?;

    if let [group] = groups {
        if group.is_complete_pair() && stale && !published {
            recover_publication(driver, version, attempt, group)?;
            return Err(conflict());
        }
    }

    if stale && !published {
        warn!(
            version = version.version,
            attempt = attempt.attempt,
            elapsed,
            "stale partial progress, fencing attempt"
        );
        fence(driver, attempt)?;
        return Err(conflict());
    }

    Err(conflict())
}

/// Kill the attempt. Future resolvers roll to the next attempt number.
fn fence<D: StorageDriver>(driver: &D, attempt: &AttemptPaths) -> Result<(), CommitError> {
    Marker::new(driver, attempt.dir.join(layout::EXPIRED_HINT_NAME)).claim(layout::EXPIRED_BODY)
}

/// A predecessor wrote both of its phase markers and died before publishing.
/// Any client may finish the job: the hint names the dead client, not us.
fn recover_publication<D: StorageDriver>(
    driver: &D,
    version: &VersionPaths,
    attempt: &AttemptPaths,
    group: &ClientGroup,
) -> Result<(), CommitError> {
    let client_id = layout::client_id_of_key(&group.key);
    warn!(
        version = version.version,
        attempt = attempt.attempt,
        client = client_id,
        "completing publication for a finished but unpublished client"
    );
    Marker::new(driver, version.hint_file.clone())
        .claim(&layout::hint_body(client_id, attempt.attempt))?;
    Marker::new(driver, version.sub_hint_dir.join(layout::commit_name(client_id)))
        .claim(client_id)?;
    Ok(())
}
