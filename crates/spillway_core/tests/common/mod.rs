//! Shared helpers for buffer integration tests.

#![allow(dead_code)]

use spillway_core::{BufferConfig, BufferError, SpillBuffer};
use std::path::Path;
use std::time::{Duration, Instant};

/// A small configuration with a fast maintenance tick.
pub fn small_config(base: &Path) -> BufferConfig {
    BufferConfig::new()
        .buffer_dir(base)
        .segment_size(4)
        .segment_count(16)
        .window_size(2)
        .maintenance_period(Duration::from_millis(5))
        .reload_policy(3, Duration::from_millis(2))
}

/// What a reader saw while draining a buffer.
#[derive(Debug, Default)]
pub struct Drained {
    pub data: Vec<u8>,
    pub faults: Vec<(usize, BufferError)>,
}

/// Reads until end of stream with `chunk`-sized reads.
pub fn drain(buffer: &SpillBuffer, chunk: usize) -> Drained {
    let mut out = Drained::default();
    let mut scratch = vec![0u8; chunk];
    loop {
        match buffer.read(&mut scratch) {
            Ok(0) => return out,
            Ok(n) => out.data.extend_from_slice(&scratch[..n]),
            Err(e) => out.faults.push((out.data.len(), e)),
        }
    }
}

/// Polls `condition` until it holds or `timeout` expires.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Deterministic test payload.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Number of regular files directly inside `dir`.
pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| e.path().is_file())
                .count()
        })
        .unwrap_or(0)
}

/// Total size of the regular files directly inside `dir`.
pub fn total_file_bytes(dir: &Path) -> u64 {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter_map(|e| e.metadata().ok())
                .filter(std::fs::Metadata::is_file)
                .map(|m| m.len())
                .sum()
        })
        .unwrap_or(0)
}
