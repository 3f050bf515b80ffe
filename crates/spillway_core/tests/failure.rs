//! Disk failure handling: lost files end the stream, failed writes fall
//! back to memory.

mod common;

use common::{drain, pattern, small_config, wait_until};
use spillway_core::SpillBuffer;
use std::time::Duration;
use tempfile::tempdir;

const PATIENCE: Duration = Duration::from_secs(10);

#[test]
fn lost_backing_files_end_stream_early() {
    let temp = tempdir().unwrap();
    let config = small_config(temp.path())
        .segment_size(8)
        .segment_count(64)
        .window_size(1)
        .file_size(64)
        .reload_policy(2, Duration::from_millis(1));
    let buffer = SpillBuffer::new(config).unwrap();
    let dir = buffer.backing_dir().unwrap();

    let payload = pattern(200);
    buffer.write(&payload).unwrap();
    buffer.finish();

    // Slots 1..24 are ahead of the one-segment window.
    assert!(wait_until(PATIENCE, || buffer.manager().evictions() >= 23));

    for entry in std::fs::read_dir(&dir).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().is_some_and(|ext| ext == "dat") {
            std::fs::remove_file(path).unwrap();
        }
    }

    let drained = drain(&buffer, 16);
    assert!(drained.faults.is_empty());
    assert!(drained.data.len() < payload.len());
    assert_eq!(drained.data, payload[..drained.data.len()]);

    // The stream ended early; whatever remains on disk is left alone.
    assert!(!buffer.is_delete_files());
    assert!(!buffer.is_use_files());
    assert!(dir.exists());
}

#[test]
fn write_failure_switches_to_memory_only() {
    let temp = tempdir().unwrap();
    let config = small_config(temp.path())
        .segment_size(8)
        .segment_count(64)
        .window_size(1)
        .file_size(1000);
    let buffer = SpillBuffer::new(config).unwrap();
    let dir = buffer.backing_dir().unwrap();
    std::fs::remove_dir_all(&dir).unwrap();

    let payload = pattern(200);
    buffer.write(&payload).unwrap();
    buffer.finish();

    assert!(wait_until(PATIENCE, || !buffer.is_use_files()));
    assert_eq!(buffer.manager().flushes(), 0);

    let drained = drain(&buffer, 13);
    assert!(drained.faults.is_empty());
    assert_eq!(drained.data, payload);
}
