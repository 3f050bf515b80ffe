//! Throughput counters and status snapshots.
//!
//! # Usage
//!
//! ```rust,ignore
//! use spillway_core::{BufferConfig, SpillBuffer};
//!
//! let buffer = SpillBuffer::new(BufferConfig::default())?;
//!
//! // Move some data...
//! buffer.write(b"hello")?;
//!
//! let status = buffer.status();
//! println!("In: {} bytes", status.bytes_in);
//! println!("Health: {:?}", status.health);
//! ```

use parking_lot::Mutex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Byte counters for both ends of a buffer.
///
/// Counters are atomic and increase monotonically. Rates run from creation
/// to the completion instant of that side, or to now while it is open.
#[derive(Debug)]
pub struct Throughput {
    /// Total bytes accepted from the producer.
    bytes_in: AtomicU64,
    /// Total bytes handed to the consumer.
    bytes_out: AtomicU64,
    started: Instant,
    input_done: Mutex<Option<Instant>>,
    output_done: Mutex<Option<Instant>>,
}

impl Default for Throughput {
    fn default() -> Self {
        Self::new()
    }
}

impl Throughput {
    /// Creates counters starting now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bytes_in: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
            started: Instant::now(),
            input_done: Mutex::new(None),
            output_done: Mutex::new(None),
        }
    }

    // === Recording (internal use) ===

    pub(crate) fn record_in(&self, bytes: usize) {
        self.bytes_in.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_out(&self, bytes: usize) {
        self.bytes_out.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Stamps the input completion instant once.
    pub(crate) fn mark_input_done(&self) {
        self.input_done.lock().get_or_insert_with(Instant::now);
    }

    /// Stamps the output completion instant once.
    pub(crate) fn mark_output_done(&self) {
        self.output_done.lock().get_or_insert_with(Instant::now);
    }

    // === Getters ===

    /// Returns the total bytes written into the buffer.
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in.load(Ordering::Relaxed)
    }

    /// Returns the total bytes read out of the buffer.
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out.load(Ordering::Relaxed)
    }

    /// Returns the input rate in bytes per second.
    pub fn bytes_in_per_sec(&self) -> f64 {
        rate(self.bytes_in(), self.elapsed(*self.input_done.lock()))
    }

    /// Returns the output rate in bytes per second.
    pub fn bytes_out_per_sec(&self) -> f64 {
        rate(self.bytes_out(), self.elapsed(*self.output_done.lock()))
    }

    fn elapsed(&self, done: Option<Instant>) -> Duration {
        done.unwrap_or_else(Instant::now)
            .saturating_duration_since(self.started)
    }
}

fn rate(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    bytes as f64 / secs
}

/// Coarse utilization of the segment ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    /// Below the yellow level.
    Green,
    /// At or above the yellow level.
    Yellow,
    /// At or above the red level.
    Red,
}

impl HealthLevel {
    /// Classifies `in_use` out of `capacity` segments.
    ///
    /// A level of 0 is disabled.
    #[must_use]
    pub fn classify(in_use: usize, capacity: usize, yellow: u8, red: u8) -> Self {
        if capacity == 0 {
            return Self::Green;
        }
        let percent = in_use.saturating_mul(100) / capacity;
        if red > 0 && percent >= usize::from(red) {
            Self::Red
        } else if yellow > 0 && percent >= usize::from(yellow) {
            Self::Yellow
        } else {
            Self::Green
        }
    }
}

/// A point-in-time view of a buffer.
///
/// Unlike the live buffer, this is plain data that can be serialized or
/// compared.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BufferStatus {
    /// Total bytes written.
    pub bytes_in: u64,
    /// Total bytes read.
    pub bytes_out: u64,
    /// Input rate in bytes per second.
    pub bytes_in_per_sec: f64,
    /// Output rate in bytes per second.
    pub bytes_out_per_sec: f64,
    /// Ring capacity in segments.
    pub capacity: usize,
    /// Segments between the read and write positions.
    pub segments_in_use: usize,
    /// Most segments in use at once.
    pub segments_high_water: usize,
    /// Unread segments resident in memory.
    pub resident_segments: usize,
    /// Segment size in bytes.
    pub segment_size: usize,
    /// Window size in segments.
    pub window_size: usize,
    /// Live backing files.
    pub file_count: usize,
    /// Backing file cap.
    pub file_limit: usize,
    /// Most backing files live at once.
    pub file_high_water: usize,
    /// File currently appended to.
    pub current_file: Option<String>,
    /// Spill directory.
    pub backing_dir: Option<PathBuf>,
    /// Whether segments spill to disk.
    pub use_files: bool,
    /// Whether consumed files are deleted.
    pub delete_files: bool,
    /// Whether every byte is backed up.
    pub backup_all: bool,
    /// Production finished.
    pub produce_done: bool,
    /// Hard shutdown happened.
    pub shutdown: bool,
    /// Times the ring grew.
    pub growths: usize,
    /// Payloads written to disk.
    pub flushes: u64,
    /// Payloads loaded back from disk.
    pub reloads: u64,
    /// Ring utilization level.
    pub health: HealthLevel,
}
