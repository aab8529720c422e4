//! Shared in-memory backend with a controllable clock.
//!
//! Cloning a [`MemoryDriver`] yields a handle onto the same substrate, so
//! several simulated clients can coordinate through one tree the way separate
//! processes would through a shared filesystem. The clock only moves when
//! told to, which makes staleness and expiry behavior deterministic to test,
//! and single writes can be made to fail on demand for crash-path coverage.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::driver::{FileEntry, StorageDriver, StorageError};

#[derive(Debug, Clone)]
struct FileRecord {
    contents: String,
    last_modified: i64,
}

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<PathBuf, FileRecord>,
    dirs: BTreeSet<PathBuf>,
    now: i64,
    write_fault: Option<String>,
}

/// In-memory [`StorageDriver`] with a virtual clock.
#[derive(Debug, Clone, Default)]
pub struct MemoryDriver {
    state: Arc<Mutex<State>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend clock to an absolute epoch-millisecond value.
    pub fn set_clock(&self, millis: i64) {
        self.state.lock().now = millis;
    }

    /// Advance the backend clock.
    pub fn advance_clock(&self, millis: i64) {
        self.state.lock().now += millis;
    }

    /// Arrange for the next write whose path contains `fragment` to fail
    /// once with [`StorageError::Backend`]. The file is not created.
    pub fn fail_next_write_matching(&self, fragment: impl Into<String>) {
        self.state.lock().write_fault = Some(fragment.into());
    }

    /// All stored file paths, sorted.
    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.state.lock().files.keys().cloned().collect()
    }

    /// Contents of a stored file, if present.
    pub fn read_file(&self, path: &Path) -> Option<String> {
        self.state.lock().files.get(path).map(|r| r.contents.clone())
    }

    /// Rewrite a stored file's modification time. Lets tests fabricate
    /// debris that is older (or newer, for skewed peers) than the clock.
    pub fn set_last_modified(&self, path: &Path, millis: i64) {
        if let Some(record) = self.state.lock().files.get_mut(path) {
            record.last_modified = millis;
        }
    }
}

impl StorageDriver for MemoryDriver {
    fn create_dir(&self, path: &Path) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        let mut current = PathBuf::new();
        for component in path.components() {
            current.push(component);
            state.dirs.insert(current.clone());
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> Result<bool, StorageError> {
        let state = self.state.lock();
        Ok(state.files.contains_key(path)
            || state.dirs.contains(path)
            || state.files.keys().any(|p| p != path && p.starts_with(path)))
    }

    fn list_files(&self, dir: &Path, recursive: bool) -> Result<Vec<FileEntry>, StorageError> {
        let state = self.state.lock();
        let entries = state
            .files
            .iter()
            .filter(|(path, _)| {
                if recursive {
                    path.as_path() != dir && path.starts_with(dir)
                } else {
                    path.parent() == Some(dir)
                }
            })
            .map(|(path, record)| FileEntry {
                file_name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                last_modified: record.last_modified,
            })
            .collect();
        Ok(entries)
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        let faulted = state
            .write_fault
            .as_deref()
            .is_some_and(|fragment| path.to_string_lossy().contains(fragment));
        if faulted {
            state.write_fault = None;
            return Err(StorageError::Backend(format!(
                "injected write fault: {}",
                path.display()
            )));
        }
        let now = state.now;
        state.files.insert(
            path.to_path_buf(),
            FileRecord {
                contents: contents.to_string(),
                last_modified: now,
            },
        );
        Ok(())
    }

    fn delete(&self, path: &Path, recursive: bool) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        state.files.remove(path);
        state.dirs.remove(path);
        if recursive {
            state.files.retain(|p, _| !p.starts_with(path));
            state.dirs.retain(|p| !p.starts_with(path));
        }
        Ok(())
    }

    fn now_millis(&self) -> i64 {
        self.state.lock().now
    }
}
