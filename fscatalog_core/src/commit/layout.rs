//! Filename grammar for the coordinated tree.
//!
//! Coordination happens purely through file names; file bodies are
//! informational. Every name below is either client-owned (embeds a unique
//! client id) or shared-name with content-equivalent writers, so overwrites
//! are harmless.

use std::path::{Path, PathBuf};

use crate::storage::StorageDriver;

use super::error::CommitError;

pub const TRACKER_DIR: &str = "tracker";
pub const COMMIT_DIR: &str = "commit";
pub const ARCHIVE_DIR: &str = "archive";
pub const SUB_TRACKER_DIR: &str = "sub-tracker";
pub const SUB_HINT_DIR: &str = "sub-hint";
pub const COMMIT_HINT_NAME: &str = "COMMIT-HINT.TXT";
pub const EXPIRED_HINT_NAME: &str = "EXPIRED-HINT.TXT";
pub const PRE_COMMIT_PREFIX: &str = "PRE_COMMIT-";
pub const EXPIRED_BODY: &str = "EXPIRED!";

const SENTINEL_EXT: &str = ".txt";
const ARCHIVE_SEPARATOR: char = '@';
const HINT_SEPARATOR: char = '@';

/// `"{n}.txt"`: tracker and sub-tracker sentinels.
pub fn sentinel_name(n: u64) -> String {
    format!("{}{}", n, SENTINEL_EXT)
}

/// Parse `"{n}.txt"` back to `n`.
pub fn parse_sentinel_name(name: &str) -> Result<u64, CommitError> {
    name.strip_suffix(SENTINEL_EXT)
        .and_then(|stem| stem.parse::<u64>().ok())
        .ok_or_else(|| CommitError::MalformedName(name.to_string()))
}

/// `"{version}.txt@{expire_millis}"`: archive tombstones.
pub fn archive_name(version: u64, expire_millis: i64) -> String {
    format!("{}{}{}", sentinel_name(version), ARCHIVE_SEPARATOR, expire_millis)
}

/// Parse a tombstone name back to `(version, expire_millis)`.
pub fn parse_archive_name(name: &str) -> Result<(u64, i64), CommitError> {
    let (sentinel, expire) = name
        .split_once(ARCHIVE_SEPARATOR)
        .ok_or_else(|| CommitError::MalformedName(name.to_string()))?;
    let version = parse_sentinel_name(sentinel)?;
    let expire = expire
        .parse::<i64>()
        .map_err(|_| CommitError::MalformedName(name.to_string()))?;
    Ok((version, expire))
}

/// `"PRE_COMMIT-{id}.txt"`: a client's phase-one marker.
pub fn pre_commit_name(client_id: &str) -> String {
    format!("{}{}", PRE_COMMIT_PREFIX, commit_name(client_id))
}

/// `"{id}.txt"`: a client's phase-two marker, and also the witness name.
pub fn commit_name(client_id: &str) -> String {
    format!("{}{}", client_id, SENTINEL_EXT)
}

/// `"{client_id}@{attempt}"`: body of the commit hint.
pub fn hint_body(client_id: &str, attempt: u64) -> String {
    format!("{}{}{}", client_id, HINT_SEPARATOR, attempt)
}

/// Parse a commit hint body back to `(client_id, attempt)`.
pub fn parse_hint_body(body: &str) -> Result<(String, u64), CommitError> {
    let (client_id, attempt) = body
        .split_once(HINT_SEPARATOR)
        .ok_or_else(|| CommitError::MalformedName(body.to_string()))?;
    let attempt = attempt
        .parse::<u64>()
        .map_err(|_| CommitError::MalformedName(body.to_string()))?;
    Ok((client_id.to_string(), attempt))
}

/// Strip the phase-one prefix so both files of a client's pair share one
/// grouping key.
pub fn client_key(file_name: &str) -> &str {
    file_name.strip_prefix(PRE_COMMIT_PREFIX).unwrap_or(file_name)
}

/// Client id embedded in a grouping key (`"{id}.txt"` → `"{id}"`).
pub fn client_id_of_key(key: &str) -> &str {
    key.strip_suffix(SENTINEL_EXT).unwrap_or(key)
}

/// A shared-name marker file: COMMIT-HINT, EXPIRED-HINT, or a sentinel.
///
/// These names are immutable after their first meaningful write. Racing
/// claimants always carry equivalent bodies, so last-writer-wins is safe,
/// and a partially written marker still counts as present: the name, not
/// the body, is the signal.
pub struct Marker<'a, D: StorageDriver> {
    driver: &'a D,
    path: PathBuf,
}

impl<'a, D: StorageDriver> Marker<'a, D> {
    pub fn new(driver: &'a D, path: PathBuf) -> Self {
        Self { driver, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the marker has appeared.
    pub fn observe(&self) -> Result<bool, CommitError> {
        Ok(self.driver.exists(&self.path)?)
    }

    /// Publish the marker.
    pub fn claim(&self, body: &str) -> Result<(), CommitError> {
        Ok(self.driver.write_file(&self.path, body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryDriver;

    #[test]
    fn test_sentinel_round_trip() {
        assert_eq!(sentinel_name(0), "0.txt");
        assert_eq!(sentinel_name(42), "42.txt");
        assert_eq!(parse_sentinel_name("42.txt").unwrap(), 42);
    }

    #[test]
    fn test_sentinel_rejects_garbage() {
        assert!(matches!(
            parse_sentinel_name("latest.txt"),
            Err(CommitError::MalformedName(_))
        ));
        assert!(matches!(
            parse_sentinel_name("7"),
            Err(CommitError::MalformedName(_))
        ));
        assert!(matches!(
            parse_sentinel_name("-1.txt"),
            Err(CommitError::MalformedName(_))
        ));
    }

    #[test]
    fn test_archive_round_trip() {
        let name = archive_name(3, 1_700_000_000_000);
        assert_eq!(name, "3.txt@1700000000000");
        assert_eq!(parse_archive_name(&name).unwrap(), (3, 1_700_000_000_000));
    }

    #[test]
    fn test_archive_rejects_missing_expiry() {
        assert!(matches!(
            parse_archive_name("3.txt"),
            Err(CommitError::MalformedName(_))
        ));
        assert!(matches!(
            parse_archive_name("3.txt@soon"),
            Err(CommitError::MalformedName(_))
        ));
    }

    #[test]
    fn test_client_file_names() {
        assert_eq!(commit_name("abc"), "abc.txt");
        assert_eq!(pre_commit_name("abc"), "PRE_COMMIT-abc.txt");
    }

    #[test]
    fn test_grouping_keys() {
        assert_eq!(client_key("PRE_COMMIT-abc.txt"), "abc.txt");
        assert_eq!(client_key("abc.txt"), "abc.txt");
        assert_eq!(client_id_of_key("abc.txt"), "abc");
    }

    #[test]
    fn test_hint_body_round_trip() {
        let body = hint_body("abc", 2);
        assert_eq!(body, "abc@2");
        assert_eq!(parse_hint_body(&body).unwrap(), ("abc".to_string(), 2));
        assert!(matches!(
            parse_hint_body("no-separator"),
            Err(CommitError::MalformedName(_))
        ));
    }

    #[test]
    fn test_marker_observe_and_claim() {
        let driver = MemoryDriver::new();
        let marker = Marker::new(&driver, PathBuf::from("root/FLAG.TXT"));

        assert!(!marker.observe().unwrap());
        marker.claim("raised").unwrap();
        assert!(marker.observe().unwrap());
        assert_eq!(driver.read_file(marker.path()).unwrap(), "raised");
    }
}
