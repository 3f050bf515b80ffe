//! # Spillway Core
//!
//! A FIFO byte stream between one producer and one consumer that spills to
//! disk when the consumer falls behind.
//!
//! This crate provides:
//! - Fixed-size segments that move between memory and backing files
//! - A segment manager with a background maintenance thread
//! - The [`SpillBuffer`] read/write facade with `std::io` adapters
//! - A [`Pump`] that drains an external [`ByteSource`] into a buffer
//!
//! ## Example
//!
//! ```rust
//! use spillway_core::{BufferConfig, SpillBuffer};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let config = BufferConfig::new()
//!     .buffer_dir(dir.path())
//!     .segment_size(4)
//!     .segment_count(16)
//!     .window_size(2);
//!
//! let buffer = SpillBuffer::new(config).unwrap();
//! buffer.write(b"hello world").unwrap();
//! buffer.finish();
//!
//! let mut out = Vec::new();
//! let mut chunk = [0u8; 3];
//! loop {
//!     match buffer.read(&mut chunk).unwrap() {
//!         0 => break,
//!         n => out.extend_from_slice(&chunk[..n]),
//!     }
//! }
//! assert_eq!(out, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod buffer;
mod config;
mod error;
mod files;
mod maintenance;
mod manager;
mod pump;
mod segment;
mod stats;

pub use buffer::SpillBuffer;
pub use config::BufferConfig;
pub use error::{BufferError, BufferResult, StreamFault};
pub use manager::SegmentManager;
pub use pump::{ByteSource, Pump, ReaderSource};
pub use segment::{FileLocation, ReloadPolicy, Segment, SegmentRead};
pub use stats::{BufferStatus, HealthLevel, Throughput};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
