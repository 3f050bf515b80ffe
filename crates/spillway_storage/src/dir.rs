//! Spill directory management.
//!
//! Every buffer spills into its own directory under a shared base:
//!
//! ```text
//! <base>/
//! └─ <uuid>/
//!    ├─ 1718822400123.dat      # backing files, named by creation time
//!    ├─ 1718822400456.dat
//!    └─ 1718822400456-1.dat    # same millisecond, disambiguated
//! ```
//!
//! Nothing in the directory describes its contents. Payload locations live
//! only in the memory of the process that wrote them.

use crate::error::{StorageError, StorageResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// File extension used for backing files.
const SPILL_EXTENSION: &str = "dat";

/// A uniquely named directory that holds one buffer's backing files.
#[derive(Debug)]
pub struct SpillDir {
    /// Directory path (`<base>/<uuid>`).
    path: PathBuf,
}

impl SpillDir {
    /// Creates a fresh directory named by a random UUID under `base`.
    ///
    /// `base` is created if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::CreateDir`] if the directory cannot be created.
    pub fn create_unique(base: &Path) -> StorageResult<Self> {
        let path = base.join(Uuid::new_v4().to_string());
        fs::create_dir_all(&path).map_err(|source| StorageError::CreateDir {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path })
    }

    /// Returns the path to the spill directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns an unused path for the next backing file.
    ///
    /// Files are named by creation time in milliseconds. When a name is
    /// already taken a `-n` suffix is appended.
    #[must_use]
    pub fn next_file_path(&self) -> PathBuf {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis());

        let mut candidate = self.path.join(format!("{millis}.{SPILL_EXTENSION}"));
        let mut n = 1u32;
        while candidate.exists() {
            candidate = self
                .path
                .join(format!("{millis}-{n}.{SPILL_EXTENSION}"));
            n += 1;
        }
        candidate
    }

    /// Deletes one backing file.
    ///
    /// Returns `true` if a file was removed, `false` if it was already gone.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove_file(&self, path: &Path) -> StorageResult<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes every file in the spill directory and then the directory.
    ///
    /// Returns the number of files removed.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or removing fails. A directory that is
    /// already gone is not an error.
    pub fn remove_all(&self) -> StorageResult<usize> {
        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() && self.remove_file(&entry.path())? {
                removed += 1;
            }
        }

        match fs::remove_dir(&self.path) {
            Ok(()) => Ok(removed),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(removed),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_unique_makes_distinct_directories() {
        let temp = tempdir().unwrap();

        let a = SpillDir::create_unique(temp.path()).unwrap();
        let b = SpillDir::create_unique(temp.path()).unwrap();

        assert_ne!(a.path(), b.path());
        assert!(a.path().is_dir());
        assert!(b.path().is_dir());
        assert_eq!(a.path().parent(), Some(temp.path()));
    }

    #[test]
    fn create_unique_creates_missing_base() {
        let temp = tempdir().unwrap();
        let base = temp.path().join("nested").join("base");

        let dir = SpillDir::create_unique(&base).unwrap();
        assert!(dir.path().starts_with(&base));
        assert!(dir.path().is_dir());
    }

    #[test]
    fn next_file_path_avoids_collisions() {
        let temp = tempdir().unwrap();
        let dir = SpillDir::create_unique(temp.path()).unwrap();

        let first = dir.next_file_path();
        fs::write(&first, b"x").unwrap();
        let second = dir.next_file_path();

        assert_ne!(first, second);
        assert_eq!(second.extension().unwrap(), SPILL_EXTENSION);
        assert!(second.starts_with(dir.path()));
    }

    #[test]
    fn remove_file_reports_missing() {
        let temp = tempdir().unwrap();
        let dir = SpillDir::create_unique(temp.path()).unwrap();

        let path = dir.next_file_path();
        fs::write(&path, b"x").unwrap();

        assert!(dir.remove_file(&path).unwrap());
        assert!(!dir.remove_file(&path).unwrap());
    }

    #[test]
    fn remove_all_deletes_files_and_directory() {
        let temp = tempdir().unwrap();
        let dir = SpillDir::create_unique(temp.path()).unwrap();

        for _ in 0..3 {
            let path = dir.next_file_path();
            fs::write(&path, b"payload").unwrap();
        }

        assert_eq!(dir.remove_all().unwrap(), 3);
        assert!(!dir.path().exists());

        // Already gone is fine.
        assert_eq!(dir.remove_all().unwrap(), 0);
    }
}
