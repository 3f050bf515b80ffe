//! Error types for spill storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while managing backing files.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of a backing file.
    #[error("read beyond end of {path:?}: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// File that was read.
        path: PathBuf,
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current file size.
        size: u64,
    },

    /// The spill directory could not be created.
    #[error("cannot create spill directory {path:?}: {source}")]
    CreateDir {
        /// Directory that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    /// Returns true if the error means the backing file no longer exists.
    ///
    /// Missing files are the one condition worth retrying: another process
    /// may still be moving the file into place.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Io(e) => e.kind() == io::ErrorKind::NotFound,
            Self::CreateDir { source, .. } => source.kind() == io::ErrorKind::NotFound,
            Self::ReadPastEnd { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_detected() {
        let err = StorageError::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(err.is_not_found());

        let err = StorageError::from(io::Error::new(io::ErrorKind::PermissionDenied, "no"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn read_past_end_message() {
        let err = StorageError::ReadPastEnd {
            path: PathBuf::from("a.dat"),
            offset: 10,
            len: 4,
            size: 12,
        };
        let msg = err.to_string();
        assert!(msg.contains("offset 10"));
        assert!(!err.is_not_found());
    }
}
