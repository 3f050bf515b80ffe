//! # Spillway Storage
//!
//! Backing-file primitives for the Spillway disk-overflow buffer.
//!
//! This crate knows nothing about segments, windows, or streams. It only
//! provides:
//!
//! - [`SpillDir`] - a uniquely named working directory for one buffer
//! - [`SpillFile`] - an append-only file that payloads are flushed into
//! - [`read_region`] - reads a payload back by path, offset and length
//!
//! Spill files are transient. They have no header or index and cannot be
//! interpreted without the in-memory metadata of the process that wrote them.
//!
//! ## Example
//!
//! ```rust
//! use spillway_storage::{read_region, SpillDir, SpillFile};
//!
//! let base = tempfile::tempdir().unwrap();
//! let dir = SpillDir::create_unique(base.path()).unwrap();
//!
//! let mut file = SpillFile::create(&dir.next_file_path()).unwrap();
//! let offset = file.append(b"hello world").unwrap();
//! file.flush().unwrap();
//!
//! let data = read_region(file.path(), offset, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod dir;
mod error;
mod file;

pub use dir::SpillDir;
pub use error::{StorageError, StorageResult};
pub use file::{read_region, SpillFile};
