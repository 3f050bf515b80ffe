//! Append-only spill files.

use crate::error::{StorageError, StorageResult};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A backing file that segment payloads are appended to.
///
/// A spill file is a flat sequence of raw payloads in flush order. It has
/// no header and no index: the caller remembers where each payload landed
/// and reads it back with [`read_region`].
///
/// # Durability
///
/// Spill files are transient working storage. `flush()` pushes data to the
/// OS so another handle can read it back; nothing is fsynced.
///
/// # Example
///
/// ```no_run
/// use spillway_storage::{read_region, SpillFile};
/// use std::path::Path;
///
/// let mut file = SpillFile::create(Path::new("spill.dat")).unwrap();
/// let offset = file.append(b"payload").unwrap();
/// file.flush().unwrap();
///
/// let data = read_region(file.path(), offset, 7).unwrap();
/// assert_eq!(&data, b"payload");
/// ```
#[derive(Debug)]
pub struct SpillFile {
    path: PathBuf,
    file: File,
    size: u64,
}

impl SpillFile {
    /// Creates a new spill file, truncating anything already at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created, for example because
    /// the parent directory is gone.
    pub fn create(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            size: 0,
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of bytes appended so far.
    ///
    /// This is the offset where the next `append` will write.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Appends data to the end of the file.
    ///
    /// Returns the offset where the data was written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    pub fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.size;
        if data.is_empty() {
            return Ok(offset);
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.size += data.len() as u64;

        Ok(offset)
    }

    /// Flushes buffered writes to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    pub fn flush(&mut self) -> StorageResult<()> {
        self.file.flush()?;
        Ok(())
    }
}

/// Reads `len` bytes at `offset` from the file at `path`.
///
/// The file is opened for every call, so a payload can be reloaded after
/// the handle that wrote it was closed.
///
/// # Errors
///
/// Returns an error if the file cannot be opened (see
/// [`StorageError::is_not_found`]), if the region extends past the end of
/// the file, or if the read fails.
pub fn read_region(path: &Path, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    let end = offset.saturating_add(len as u64);

    if offset > size || end > size {
        return Err(StorageError::ReadPastEnd {
            path: path.to_path_buf(),
            offset,
            len,
            size,
        });
    }

    if len == 0 {
        return Ok(Vec::new());
    }

    file.seek(SeekFrom::Start(offset))?;
    let mut buffer = vec![0u8; len];
    file.read_exact(&mut buffer)?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_create_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.dat");

        let file = SpillFile::create(&path).unwrap();
        assert_eq!(file.size(), 0);
        assert!(path.exists());
    }

    #[test]
    fn file_create_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.dat");
        std::fs::write(&path, b"stale").unwrap();

        let file = SpillFile::create(&path).unwrap();
        assert_eq!(file.size(), 0);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn file_append_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.dat");

        let mut file = SpillFile::create(&path).unwrap();

        let offset1 = file.append(b"hello").unwrap();
        assert_eq!(offset1, 0);

        let offset2 = file.append(b" world").unwrap();
        assert_eq!(offset2, 5);
        assert_eq!(file.size(), 11);

        file.flush().unwrap();
        assert_eq!(&read_region(&path, 0, 11).unwrap(), b"hello world");
        assert_eq!(&read_region(&path, 6, 5).unwrap(), b"world");
    }

    #[test]
    fn read_past_end_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.dat");

        let mut file = SpillFile::create(&path).unwrap();
        file.append(b"hello").unwrap();
        file.flush().unwrap();

        let result = read_region(&path, 3, 5);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn read_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.dat");

        let err = read_region(&path, 0, 1).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn file_empty_append() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.dat");

        let mut file = SpillFile::create(&path).unwrap();
        file.append(b"x").unwrap();

        let offset = file.append(b"").unwrap();
        assert_eq!(offset, 1);
        assert_eq!(file.size(), 1);
    }

    #[test]
    fn file_empty_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.dat");

        let mut file = SpillFile::create(&path).unwrap();
        file.append(b"hello").unwrap();
        file.flush().unwrap();

        assert!(read_region(&path, 2, 0).unwrap().is_empty());
    }

    #[test]
    fn create_in_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone").join("test.dat");

        assert!(SpillFile::create(&path).is_err());
    }

    #[test]
    fn file_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.dat");

        let file = SpillFile::create(&path).unwrap();
        assert_eq!(file.path(), path);
    }
}
