//! Stream facade over the segment manager.

use crate::config::BufferConfig;
use crate::error::{BufferError, BufferResult, StreamFault};
use crate::manager::SegmentManager;
use crate::segment::SegmentRead;
use crate::stats::{BufferStatus, HealthLevel, Throughput};
use parking_lot::MutexGuard;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// A FIFO byte stream that spills to disk.
///
/// One producer writes, one consumer reads. Memory use is bounded by the
/// consumer window; everything further ahead lives in backing files until
/// the reader gets close.
///
/// # Example
///
/// ```rust,no_run
/// use spillway_core::{BufferConfig, SpillBuffer};
///
/// let buffer = SpillBuffer::new(BufferConfig::default())?;
/// buffer.write(b"hello")?;
/// buffer.finish();
///
/// let mut out = [0u8; 16];
/// let n = buffer.read(&mut out)?;
/// assert_eq!(&out[..n], b"hello");
/// # Ok::<(), spillway_core::BufferError>(())
/// ```
#[derive(Debug)]
pub struct SpillBuffer {
    manager: Arc<SegmentManager>,
    stats: Throughput,
}

impl SpillBuffer {
    /// Creates a buffer and starts its maintenance thread.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::InvalidConfig`] for a bad configuration, or an
    /// I/O error if the maintenance thread cannot start.
    pub fn new(config: BufferConfig) -> BufferResult<Self> {
        Ok(Self {
            manager: SegmentManager::new(config)?,
            stats: Throughput::new(),
        })
    }

    // ------------------------------------------------------------------
    // Producer side
    // ------------------------------------------------------------------

    /// Appends `data` to the stream.
    ///
    /// Blocks while the segment ring is full. Returns the number of bytes
    /// written, which is short only if production ended mid-write.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::ProduceDone`] if nothing could be written.
    pub fn write(&self, data: &[u8]) -> BufferResult<usize> {
        if data.is_empty() {
            return Ok(0);
        }

        let mut written = 0;
        while written < data.len() {
            let mut guard = self.manager.producer_guard();
            if self.manager.is_produce_done() || self.manager.is_shutdown() {
                break;
            }

            let rest = &data[written..];
            let mut n = self.manager.current_write_segment()?.put(rest);
            if n == 0 {
                match self.manager.next_write_segment(&mut guard)? {
                    Some(next) => n = next.put(rest),
                    None => break,
                }
            }
            written += n;
        }

        self.stats.record_in(written);
        if written == 0 {
            return Err(BufferError::ProduceDone);
        }
        Ok(written)
    }

    /// Appends `len` bytes of `data` starting at `offset`.
    ///
    /// An out-of-range request writes nothing and returns `Ok(0)`.
    ///
    /// # Errors
    ///
    /// Same as [`SpillBuffer::write`].
    pub fn write_range(&self, data: &[u8], offset: usize, len: usize) -> BufferResult<usize> {
        let Some(slice) = offset
            .checked_add(len)
            .and_then(|end| data.get(offset..end))
        else {
            warn!(offset, len, available = data.len(), "write range out of bounds, ignored");
            return Ok(0);
        };
        self.write(slice)
    }

    /// Records an upstream failure at the current write offset.
    ///
    /// The consumer receives it after every byte written so far.
    pub fn record_error(&self, err: &io::Error) {
        let _producer = self.manager.producer_guard();
        if self.manager.is_produce_done() {
            debug!(error = %err, "ignoring error after produce done");
            return;
        }
        if let Err(e) = self.manager.record_fault_locked(StreamFault::from(err)) {
            warn!(error = %e, "cannot record stream fault");
        }
    }

    /// Marks the end of the stream. Idempotent.
    pub fn finish(&self) {
        self.manager.set_produce_done();
        self.stats.mark_input_done();
    }

    // ------------------------------------------------------------------
    // Consumer side
    // ------------------------------------------------------------------

    /// Reads bytes into `buf`.
    ///
    /// Blocks until at least one byte is available, the stream ends, or a
    /// fault is reached. Returns `Ok(0)` at end of stream, for an empty
    /// `buf`, and after a hard shutdown. Reaching the end of the stream
    /// shuts the buffer down.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::Stream`] when the read cursor reaches a
    /// recorded fault. The fault is delivered once; the next read continues
    /// with the bytes after it.
    pub fn read(&self, buf: &mut [u8]) -> BufferResult<usize> {
        if buf.is_empty() || self.manager.is_shutdown() {
            return Ok(0);
        }

        let period = self.manager.config().maintenance_period;
        let mut guard = self.manager.consumer_guard();
        let mut total = 0;

        loop {
            if self.manager.is_shutdown() {
                break;
            }

            let segment = self.manager.next_read_segment()?;
            match segment.get(&mut buf[total..]) {
                Ok(SegmentRead::Data(0)) => {
                    if total > 0 {
                        break;
                    }
                    MutexGuard::unlocked(&mut guard, || segment.wait_for_data(period));
                }
                Ok(SegmentRead::Data(n)) => {
                    total += n;
                    if total == buf.len() {
                        break;
                    }
                }
                Ok(SegmentRead::NotLoaded) => {
                    if total > 0 {
                        break;
                    }
                    MutexGuard::unlocked(&mut guard, || self.manager.request_window_load());
                }
                Ok(SegmentRead::Eof) => {
                    if total > 0 {
                        break;
                    }
                    drop(guard);
                    self.stats.mark_output_done();
                    debug!(bytes_out = self.stats.bytes_out(), "end of stream reached");
                    self.manager.shutdown(true);
                    return Ok(0);
                }
                Err(fault) => {
                    if total > 0 {
                        break;
                    }
                    segment.clear_fault();
                    return Err(BufferError::Stream(fault));
                }
            }
        }

        self.stats.record_out(total);
        Ok(total)
    }

    /// Discards up to `n` bytes.
    ///
    /// Returns the number of bytes skipped, which is short only at end of
    /// stream.
    ///
    /// # Errors
    ///
    /// Returns the fault that interrupted the skip.
    pub fn skip(&self, n: u64) -> BufferResult<u64> {
        let chunk = self.manager.segment_size().max(1);
        let mut scratch = vec![0u8; chunk];
        let mut skipped = 0u64;

        while skipped < n {
            let want = usize::try_from(n - skipped).map_or(chunk, |rest| rest.min(chunk));
            match self.read(&mut scratch[..want])? {
                0 => break,
                got => skipped += got as u64,
            }
        }
        Ok(skipped)
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    /// Discards all buffered data and starts over in a fresh directory.
    ///
    /// A fault recorded at the current write position survives the reset.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::IllegalState`] if the buffer is shut down or
    /// holds no data.
    pub fn clear(&self) -> BufferResult<()> {
        self.manager.clear()
    }

    /// Closes the buffer.
    ///
    /// With `graceful` the producer side closes and the consumer can still
    /// drain. Otherwise everything is discarded at once.
    pub fn close(&self, graceful: bool) {
        self.stats.mark_input_done();
        if !graceful {
            self.stats.mark_output_done();
        }
        self.manager.shutdown(!graceful);
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Returns the underlying segment manager.
    #[must_use]
    pub fn manager(&self) -> &SegmentManager {
        &self.manager
    }

    /// Returns the throughput counters.
    #[must_use]
    pub fn throughput(&self) -> &Throughput {
        &self.stats
    }

    /// Returns the total bytes written.
    #[must_use]
    pub fn bytes_in(&self) -> u64 {
        self.stats.bytes_in()
    }

    /// Returns the total bytes read.
    #[must_use]
    pub fn bytes_out(&self) -> u64 {
        self.stats.bytes_out()
    }

    /// Returns the input rate in bytes per second.
    #[must_use]
    pub fn bytes_in_per_sec(&self) -> f64 {
        self.stats.bytes_in_per_sec()
    }

    /// Returns the output rate in bytes per second.
    #[must_use]
    pub fn bytes_out_per_sec(&self) -> f64 {
        self.stats.bytes_out_per_sec()
    }

    /// Returns the ring capacity in segments.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.manager.capacity()
    }

    /// Returns the number of unread segments resident in memory.
    #[must_use]
    pub fn resident_segment_count(&self) -> usize {
        self.manager.resident_segment_count()
    }

    /// Returns the spill directory, if files are in use.
    #[must_use]
    pub fn backing_dir(&self) -> Option<PathBuf> {
        self.manager.backing_dir()
    }

    /// Returns whether segments spill to disk.
    #[must_use]
    pub fn is_use_files(&self) -> bool {
        self.manager.use_files()
    }

    /// Returns whether consumed backing files are deleted.
    #[must_use]
    pub fn is_delete_files(&self) -> bool {
        self.manager.delete_files()
    }

    /// Returns true once production has ended.
    #[must_use]
    pub fn is_produce_done(&self) -> bool {
        self.manager.is_produce_done()
    }

    /// Returns true after a hard shutdown.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.manager.is_shutdown()
    }

    /// Returns the ring utilization level.
    #[must_use]
    pub fn health(&self) -> HealthLevel {
        let config = self.manager.config();
        HealthLevel::classify(
            self.manager.segments_in_use(),
            self.manager.capacity(),
            config.yellow_level,
            config.red_level,
        )
    }

    /// Takes a snapshot of every counter and mode flag.
    #[must_use]
    pub fn status(&self) -> BufferStatus {
        let m = &self.manager;
        BufferStatus {
            bytes_in: self.stats.bytes_in(),
            bytes_out: self.stats.bytes_out(),
            bytes_in_per_sec: self.stats.bytes_in_per_sec(),
            bytes_out_per_sec: self.stats.bytes_out_per_sec(),
            capacity: m.capacity(),
            segments_in_use: m.segments_in_use(),
            segments_high_water: m.high_water(),
            resident_segments: m.resident_segment_count(),
            segment_size: m.segment_size(),
            window_size: m.window_size(),
            file_count: m.file_count(),
            file_limit: m.file_limit(),
            file_high_water: m.file_high_water(),
            current_file: m.current_file_name(),
            backing_dir: m.backing_dir(),
            use_files: m.use_files(),
            delete_files: m.delete_files(),
            backup_all: m.backup_all(),
            produce_done: m.is_produce_done(),
            shutdown: m.is_shutdown(),
            growths: m.growth_count(),
            flushes: m.flushes(),
            reloads: m.reloads(),
            health: self.health(),
        }
    }
}

impl Drop for SpillBuffer {
    fn drop(&mut self) {
        self.manager.shutdown(true);
    }
}

impl io::Write for SpillBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        SpillBuffer::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Write for &SpillBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        SpillBuffer::write(*self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Read for SpillBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        SpillBuffer::read(self, buf).map_err(io::Error::from)
    }
}

impl io::Read for &SpillBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        SpillBuffer::read(*self, buf).map_err(io::Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::time::Duration;
    use tempfile::tempdir;

    fn small(base: &std::path::Path) -> BufferConfig {
        BufferConfig::new()
            .buffer_dir(base)
            .segment_size(4)
            .segment_count(16)
            .window_size(2)
            .maintenance_period(Duration::from_millis(5))
    }

    #[test]
    fn write_then_read() {
        let temp = tempdir().unwrap();
        let buffer = SpillBuffer::new(small(temp.path())).unwrap();

        assert_eq!(buffer.write(b"hello world").unwrap(), 11);
        buffer.finish();

        let mut out = Vec::new();
        (&buffer).read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello world");
        assert_eq!(buffer.bytes_in(), 11);
        assert_eq!(buffer.bytes_out(), 11);
        assert!(buffer.is_shutdown());
    }

    #[test]
    fn write_after_finish_is_refused() {
        let temp = tempdir().unwrap();
        let buffer = SpillBuffer::new(small(temp.path())).unwrap();
        buffer.finish();

        assert!(matches!(buffer.write(b"x"), Err(BufferError::ProduceDone)));
        let err = Write::write(&mut &buffer, b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn write_range_is_lenient() {
        let temp = tempdir().unwrap();
        let buffer = SpillBuffer::new(small(temp.path())).unwrap();

        assert_eq!(buffer.write_range(b"abc", 2, 5).unwrap(), 0);
        assert_eq!(buffer.write_range(b"abc", 7, 0).unwrap(), 0);
        assert_eq!(buffer.write_range(b"abc", usize::MAX, 2).unwrap(), 0);
        assert_eq!(buffer.write_range(b"abcdef", 1, 3).unwrap(), 3);
        buffer.finish();

        let mut out = [0u8; 8];
        let n = buffer.read(&mut out).unwrap();
        assert_eq!(&out[..n], b"bcd");
    }

    #[test]
    fn empty_read_and_write() {
        let temp = tempdir().unwrap();
        let buffer = SpillBuffer::new(small(temp.path())).unwrap();
        assert_eq!(buffer.write(b"").unwrap(), 0);
        assert_eq!(buffer.read(&mut []).unwrap(), 0);
    }

    #[test]
    fn skip_discards_bytes() {
        let temp = tempdir().unwrap();
        let buffer = SpillBuffer::new(small(temp.path())).unwrap();
        buffer.write(b"0123456789").unwrap();
        buffer.finish();

        assert_eq!(buffer.skip(7).unwrap(), 7);
        let mut out = [0u8; 8];
        let n = buffer.read(&mut out).unwrap();
        assert_eq!(&out[..n], b"789");
        assert_eq!(buffer.skip(100).unwrap(), 0);
    }

    #[test]
    fn io_error_reaches_reader() {
        let temp = tempdir().unwrap();
        let buffer = SpillBuffer::new(small(temp.path())).unwrap();
        buffer.write(b"abc").unwrap();
        buffer.record_error(&io::Error::new(io::ErrorKind::TimedOut, "source stalled"));
        buffer.write(b"de").unwrap();
        buffer.finish();

        let mut reader = &buffer;
        let mut out = [0u8; 8];
        assert_eq!(Read::read(&mut reader, &mut out).unwrap(), 3);
        let err = Read::read(&mut reader, &mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert_eq!(Read::read(&mut reader, &mut out).unwrap(), 2);
        assert_eq!(&out[..2], b"de");
        assert_eq!(Read::read(&mut reader, &mut out).unwrap(), 0);
    }

    #[test]
    fn status_snapshot() {
        let temp = tempdir().unwrap();
        let buffer = SpillBuffer::new(small(temp.path())).unwrap();
        buffer.write(b"abcdefgh").unwrap();

        let status = buffer.status();
        assert_eq!(status.bytes_in, 8);
        assert_eq!(status.segment_size, 4);
        assert_eq!(status.capacity, 16);
        assert_eq!(status.health, HealthLevel::Green);
        assert!(status.use_files);
        assert!(!status.produce_done);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["bytes_in"], 8);
        assert_eq!(json["health"], "green");
    }

    #[test]
    fn health_tracks_utilization() {
        let temp = tempdir().unwrap();
        let config = small(temp.path())
            .segment_count(4)
            .use_files(false)
            .health_levels(50, 100);
        let buffer = SpillBuffer::new(config).unwrap();

        buffer.write(b"abcdefgh").unwrap();
        assert_eq!(buffer.health(), HealthLevel::Yellow);
    }
}
