//! Local filesystem backend.

use std::fs;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use super::driver::{FileEntry, StorageDriver, StorageError};

/// [`StorageDriver`] over the local filesystem via `std::fs`.
///
/// The driver is stateless; any number of processes may point one at the same
/// root directory. Writes are plain whole-file puts, which matches the
/// driver contract: the protocol never relies on write atomicity.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFsDriver;

impl LocalFsDriver {
    pub fn new() -> Self {
        Self
    }
}

impl StorageDriver for LocalFsDriver {
    fn create_dir(&self, path: &Path) -> Result<(), StorageError> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> Result<bool, StorageError> {
        Ok(path.exists())
    }

    fn list_files(&self, dir: &Path, recursive: bool) -> Result<Vec<FileEntry>, StorageError> {
        let mut entries = Vec::new();
        if dir.is_dir() {
            collect_files(dir, recursive, &mut entries)?;
        }
        Ok(entries)
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<(), StorageError> {
        fs::write(path, contents)?;
        Ok(())
    }

    fn delete(&self, path: &Path, recursive: bool) -> Result<(), StorageError> {
        let result = if path.is_dir() {
            if recursive {
                fs::remove_dir_all(path)
            } else {
                fs::remove_dir(path)
            }
        } else {
            fs::remove_file(path)
        };
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn now_millis(&self) -> i64 {
        system_time_millis(SystemTime::now())
    }
}

fn collect_files(dir: &Path, recursive: bool, out: &mut Vec<FileEntry>) -> Result<(), StorageError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if recursive {
                collect_files(&entry.path(), true, out)?;
            }
            continue;
        }
        let modified = entry
            .metadata()?
            .modified()
            .map(system_time_millis)
            .unwrap_or(0);
        out.push(FileEntry {
            file_name: entry.file_name().to_string_lossy().into_owned(),
            last_modified: modified,
        });
    }
    Ok(())
}

fn system_time_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
