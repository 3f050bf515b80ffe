//! Backing file bookkeeping.
//!
//! Segments are appended to the current spill file until the next payload
//! would push a non-empty file past `file_size`. The file is then sealed and
//! a new one is opened on the next append. A sealed file is retired once the
//! last segment stored in it has been consumed.

use crate::config::BufferConfig;
use crate::segment::FileLocation;
use spillway_storage::{SpillDir, SpillFile, StorageResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct FileRefs {
    /// Segments stored in the file and not yet consumed.
    live: usize,
    /// No more segments will be appended.
    sealed: bool,
}

/// Spill directory, current file, and per-file reference counts.
#[derive(Debug)]
pub struct BackingFiles {
    base: PathBuf,
    dir: Option<SpillDir>,
    current: Option<SpillFile>,
    refs: HashMap<PathBuf, FileRefs>,
    file_count: usize,
    high_water: usize,
    file_size: u64,
    file_limit: usize,
    use_files: bool,
    delete_files: bool,
    backup_all: bool,
    at_cap: bool,
    flushes: u64,
}

impl BackingFiles {
    /// Creates the bookkeeping and, when files are in use, a fresh spill
    /// directory under `config.buffer_dir`.
    ///
    /// If the directory cannot be created the buffer runs memory-only.
    pub fn new(config: &BufferConfig) -> Self {
        let mut files = Self {
            base: config.buffer_dir.clone(),
            dir: None,
            current: None,
            refs: HashMap::new(),
            file_count: 0,
            high_water: 0,
            file_size: config.file_size,
            file_limit: config.file_limit,
            use_files: config.effective_use_files(),
            delete_files: config.effective_delete_files(),
            backup_all: config.backup_all,
            at_cap: false,
            flushes: 0,
        };
        files.open_dir();
        files
    }

    fn open_dir(&mut self) {
        if !self.use_files {
            return;
        }
        match SpillDir::create_unique(&self.base) {
            Ok(dir) => {
                debug!(path = %dir.path().display(), "created spill directory");
                self.dir = Some(dir);
            }
            Err(e) => {
                warn!(error = %e, "cannot create spill directory, running memory-only");
                self.use_files = false;
                self.backup_all = false;
            }
        }
    }

    /// Returns true if a payload could be written right now.
    #[must_use]
    pub fn can_spill(&self) -> bool {
        self.use_files
            && self.dir.is_some()
            && (self.current.is_some() || self.backup_all || self.file_count < self.file_limit)
    }

    /// Appends a finalized payload to the current file.
    ///
    /// Returns `Ok(None)` when files are off or the file cap is reached.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be created or written.
    pub fn append(&mut self, bytes: &[u8]) -> StorageResult<Option<FileLocation>> {
        if !self.use_files {
            return Ok(None);
        }

        let len = bytes.len() as u64;
        let rotate = self
            .current
            .as_ref()
            .is_some_and(|f| f.size() > 0 && f.size() + len > self.file_size);
        if rotate {
            self.seal_current();
        }

        if self.current.is_none() && !self.open_next()? {
            return Ok(None);
        }
        let Some(file) = self.current.as_mut() else {
            return Ok(None);
        };

        let offset = file.append(bytes)?;
        file.flush()?;
        let path = file.path().to_path_buf();
        self.refs.entry(path.clone()).or_default().live += 1;
        self.flushes += 1;

        Ok(Some(FileLocation {
            path,
            offset,
            len: bytes.len(),
        }))
    }

    fn open_next(&mut self) -> StorageResult<bool> {
        if !self.backup_all && self.file_count >= self.file_limit {
            if !self.at_cap {
                info!(limit = self.file_limit, "file limit reached, holding segments in memory");
                self.at_cap = true;
            }
            return Ok(false);
        }
        let Some(dir) = self.dir.as_ref() else {
            return Ok(false);
        };

        let file = SpillFile::create(&dir.next_file_path())?;
        debug!(path = %file.path().display(), "opened backing file");
        self.refs.insert(file.path().to_path_buf(), FileRefs::default());
        self.current = Some(file);
        self.file_count += 1;
        self.high_water = self.high_water.max(self.file_count);
        Ok(true)
    }

    /// Seals the current file. No more payloads go into it.
    pub fn seal_current(&mut self) {
        let Some(file) = self.current.take() else {
            return;
        };
        let path = file.path().to_path_buf();
        drop(file);

        let retire = match self.refs.get_mut(&path) {
            Some(refs) => {
                refs.sealed = true;
                refs.live == 0
            }
            None => false,
        };
        if retire {
            self.retire(&path);
        }
    }

    /// Releases one consumed segment stored in `path`.
    pub fn release(&mut self, path: &Path) {
        let retire = match self.refs.get_mut(path) {
            Some(refs) => {
                refs.live = refs.live.saturating_sub(1);
                refs.live == 0 && refs.sealed
            }
            None => false,
        };
        if retire {
            self.retire(path);
        }
    }

    fn retire(&mut self, path: &Path) {
        self.refs.remove(path);

        if self.delete_files {
            if let Some(dir) = self.dir.as_ref() {
                match dir.remove_file(path) {
                    Ok(_) => debug!(path = %path.display(), "deleted consumed backing file"),
                    Err(e) => warn!(path = %path.display(), error = %e, "cannot delete backing file"),
                }
            }
            self.file_count = self.file_count.saturating_sub(1);
        } else if !self.backup_all {
            self.file_count = self.file_count.saturating_sub(1);
        }

        if self.at_cap && self.file_count < self.file_limit {
            info!(count = self.file_count, "file slot released, spilling resumed");
            self.at_cap = false;
        }
    }

    /// Deletes every backing file and the spill directory.
    pub fn remove_all(&mut self) {
        self.current = None;
        self.refs.clear();
        self.file_count = 0;
        self.at_cap = false;
        if let Some(dir) = self.dir.take() {
            match dir.remove_all() {
                Ok(n) => debug!(files = n, path = %dir.path().display(), "removed spill directory"),
                Err(e) => warn!(error = %e, path = %dir.path().display(), "cannot remove spill directory"),
            }
        }
    }

    /// Drops all bookkeeping and starts over in a fresh spill directory.
    ///
    /// Old files are deleted when deletion is allowed.
    pub fn reset(&mut self) {
        if self.delete_files {
            self.remove_all();
        } else {
            self.current = None;
            self.dir = None;
            self.refs.clear();
            self.file_count = 0;
            self.at_cap = false;
        }
        self.open_dir();
    }

    /// Turns file use off for good after a write failure.
    pub fn disable(&mut self) {
        self.use_files = false;
        self.backup_all = false;
        self.current = None;
    }

    /// Keeps every file on disk and stops spilling.
    pub fn freeze(&mut self) {
        self.delete_files = false;
        self.use_files = false;
        self.current = None;
    }

    /// Clears the backup-all mode.
    pub fn clear_backup_all(&mut self) {
        self.backup_all = false;
    }

    /// Returns the number of live backing files.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.file_count
    }

    /// Returns the configured file cap.
    #[must_use]
    pub fn file_limit(&self) -> usize {
        self.file_limit
    }

    /// Returns the most files that were live at once.
    #[must_use]
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Returns the file name of the current backing file.
    #[must_use]
    pub fn current_file_name(&self) -> Option<String> {
        self.current
            .as_ref()
            .and_then(|f| f.path().file_name())
            .map(|name| name.to_string_lossy().into_owned())
    }

    /// Returns the spill directory.
    #[must_use]
    pub fn dir_path(&self) -> Option<&Path> {
        self.dir.as_ref().map(SpillDir::path)
    }

    /// Returns whether payloads may spill to disk.
    #[must_use]
    pub fn use_files(&self) -> bool {
        self.use_files
    }

    /// Returns whether consumed files are deleted.
    #[must_use]
    pub fn delete_files(&self) -> bool {
        self.delete_files
    }

    /// Returns whether every byte is backed up.
    #[must_use]
    pub fn backup_all(&self) -> bool {
        self.backup_all
    }

    /// Returns the number of payloads written to disk.
    #[must_use]
    pub fn flushes(&self) -> u64 {
        self.flushes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spillway_storage::read_region;
    use tempfile::tempdir;

    fn config(base: &Path) -> BufferConfig {
        BufferConfig::new()
            .buffer_dir(base)
            .file_size(8)
            .file_limit(2)
    }

    fn dat_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[test]
    fn appends_and_rotates() {
        let temp = tempdir().unwrap();
        let mut files = BackingFiles::new(&config(temp.path()));
        assert!(files.dir_path().is_some());
        assert_eq!(files.file_count(), 0);

        let a = files.append(b"abcd").unwrap().unwrap();
        let b = files.append(b"efgh").unwrap().unwrap();
        assert_eq!(a.path, b.path);
        assert_eq!(b.offset, 4);

        // 8 + 1 > 8: rotates.
        let c = files.append(b"i").unwrap().unwrap();
        assert_ne!(c.path, a.path);
        assert_eq!(c.offset, 0);
        assert_eq!(files.file_count(), 2);
        assert_eq!(files.high_water(), 2);
        assert_eq!(read_region(&b.path, b.offset, b.len).unwrap(), b"efgh");
        assert_eq!(files.flushes(), 3);
    }

    #[test]
    fn oversized_payload_goes_into_empty_file() {
        let temp = tempdir().unwrap();
        let mut files = BackingFiles::new(&config(temp.path()));

        let a = files.append(b"0123456789").unwrap().unwrap();
        assert_eq!(a.offset, 0);
        assert_eq!(a.len, 10);
    }

    #[test]
    fn sealed_file_deleted_after_last_release() {
        let temp = tempdir().unwrap();
        let mut files = BackingFiles::new(&config(temp.path()));

        let a = files.append(b"abcd").unwrap().unwrap();
        let b = files.append(b"efgh").unwrap().unwrap();
        files.append(b"ijkl").unwrap().unwrap();

        files.release(&a.path);
        assert!(a.path.exists());
        files.release(&b.path);
        assert!(!a.path.exists());
        assert_eq!(files.file_count(), 1);
    }

    #[test]
    fn file_cap_holds_segments_in_memory() {
        let temp = tempdir().unwrap();
        let mut files = BackingFiles::new(&config(temp.path()).file_limit(1));

        let a = files.append(b"abcdefgh").unwrap().unwrap();
        assert!(files.append(b"x").unwrap().is_none());
        assert!(!files.can_spill());

        files.release(&a.path);
        assert!(files.can_spill());
        assert!(files.append(b"x").unwrap().is_some());
    }

    #[test]
    fn backup_all_ignores_cap_and_keeps_files() {
        let temp = tempdir().unwrap();
        let mut files = BackingFiles::new(&config(temp.path()).file_limit(1).backup_all(true));

        let a = files.append(b"abcdefgh").unwrap().unwrap();
        let b = files.append(b"ijklmnop").unwrap().unwrap();
        files.append(b"q").unwrap().unwrap();
        assert_eq!(files.file_count(), 3);

        files.release(&a.path);
        files.release(&b.path);
        assert!(a.path.exists());
        assert!(b.path.exists());
    }

    #[test]
    fn memory_only_config_creates_nothing() {
        let temp = tempdir().unwrap();
        let mut files = BackingFiles::new(&config(temp.path()).use_files(false));

        assert!(files.dir_path().is_none());
        assert!(files.append(b"abc").unwrap().is_none());
        assert_eq!(dat_files(temp.path()), 0);
    }

    #[test]
    fn reset_opens_fresh_directory() {
        let temp = tempdir().unwrap();
        let mut files = BackingFiles::new(&config(temp.path()));
        files.append(b"abc").unwrap().unwrap();
        let old = files.dir_path().unwrap().to_path_buf();

        files.reset();
        let new = files.dir_path().unwrap().to_path_buf();
        assert_ne!(old, new);
        assert!(!old.exists());
        assert_eq!(files.file_count(), 0);
    }

    #[test]
    fn write_failure_surfaces() {
        let temp = tempdir().unwrap();
        let mut files = BackingFiles::new(&config(temp.path()));
        std::fs::remove_dir_all(files.dir_path().unwrap()).unwrap();

        assert!(files.append(b"abc").is_err());
        files.disable();
        assert!(!files.use_files());
        assert!(files.append(b"abc").unwrap().is_none());
    }
}
