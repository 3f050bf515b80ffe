//! Fixed-capacity byte segments.
//!
//! A segment is the unit the manager moves between memory and disk. The
//! producer appends at the write cursor, the consumer copies from the read
//! cursor, and maintenance flushes, evicts, and reloads the payload.

use crate::error::StreamFault;
use parking_lot::{Condvar, Mutex};
use rand::Rng;
use spillway_storage::{read_region, StorageError, StorageResult};
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where a flushed payload lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLocation {
    /// Backing file.
    pub path: PathBuf,
    /// Byte offset of the payload in the file.
    pub offset: u64,
    /// Payload length.
    pub len: usize,
}

/// Retry policy for reloading evicted payloads.
#[derive(Debug, Clone, Copy)]
pub struct ReloadPolicy {
    /// Total number of attempts.
    pub attempts: u32,
    /// Upper bound of the random pause between attempts.
    pub backoff: Duration,
}

/// Outcome of [`Segment::get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentRead {
    /// Bytes copied (may be zero when nothing is available yet).
    Data(usize),
    /// Bytes are available but the payload is evicted.
    NotLoaded,
    /// The stream ended at the read cursor.
    Eof,
}

#[derive(Debug)]
struct SegmentState {
    /// Resident payload. `None` once evicted.
    data: Option<Vec<u8>>,
    write_index: usize,
    read_index: usize,
    write_done: bool,
    location: Option<FileLocation>,
    /// Pending faults, ordered by offset.
    faults: VecDeque<(StreamFault, usize)>,
    unrecoverable: bool,
}

impl SegmentState {
    /// Last readable offset.
    fn end(&self) -> usize {
        self.write_index
    }

    fn fault_at_cursor(&self) -> Option<&StreamFault> {
        self.faults
            .front()
            .filter(|(_, at)| self.read_index >= *at)
            .map(|(fault, _)| fault)
    }
}

/// A fixed-capacity region of the stream.
#[derive(Debug)]
pub struct Segment {
    capacity: usize,
    state: Mutex<SegmentState>,
    cond: Condvar,
}

impl Segment {
    /// Creates an empty, resident segment.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(SegmentState {
                data: Some(Vec::with_capacity(capacity)),
                write_index: 0,
                read_index: 0,
                write_done: false,
                location: None,
                faults: VecDeque::new(),
                unrecoverable: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Creates an empty segment whose stream ends at offset 0.
    #[must_use]
    pub fn ended(capacity: usize) -> Self {
        let segment = Self::new(capacity);
        segment.set_fault(StreamFault::EndOfStream);
        segment
    }

    /// Returns the segment capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends as much of `data` as fits and wakes a parked reader.
    ///
    /// Returns the number of bytes taken. A write-done or evicted segment
    /// takes nothing.
    pub fn put(&self, data: &[u8]) -> usize {
        let mut st = self.state.lock();
        if st.write_done {
            return 0;
        }
        let n = data.len().min(self.capacity - st.write_index);
        let Some(payload) = st.data.as_mut() else {
            return 0;
        };
        payload.extend_from_slice(&data[..n]);
        st.write_index += n;
        drop(st);

        if n > 0 {
            self.cond.notify_all();
        }
        n
    }

    /// Copies bytes from the read cursor into `buf`.
    ///
    /// The copy stops at the write cursor and at the next pending fault.
    ///
    /// # Errors
    ///
    /// Returns the transient fault sitting at the read cursor. It stays
    /// pending until [`Segment::clear_fault`] is called.
    pub fn get(&self, buf: &mut [u8]) -> Result<SegmentRead, StreamFault> {
        let mut st = self.state.lock();

        if let Some(fault) = st.fault_at_cursor() {
            if fault.is_terminal() {
                return Ok(SegmentRead::Eof);
            }
            return Err(fault.clone());
        }

        let mut available = st.end() - st.read_index;
        if let Some((_, at)) = st.faults.front() {
            available = available.min(at - st.read_index);
        }
        let n = buf.len().min(available);
        if n == 0 {
            return Ok(SegmentRead::Data(0));
        }

        let start = st.read_index;
        let Some(payload) = st.data.as_ref() else {
            return Ok(SegmentRead::NotLoaded);
        };
        buf[..n].copy_from_slice(&payload[start..start + n]);
        st.read_index += n;
        Ok(SegmentRead::Data(n))
    }

    /// Drops a delivered transient fault at the read cursor.
    ///
    /// Returns `true` if a fault was removed. Terminal faults stay.
    pub fn clear_fault(&self) -> bool {
        let mut st = self.state.lock();
        let deliverable = matches!(st.fault_at_cursor(), Some(fault) if !fault.is_terminal());
        if deliverable {
            st.faults.pop_front();
        }
        deliverable
    }

    /// Records a fault at the current write cursor.
    pub fn set_fault(&self, fault: StreamFault) {
        let mut st = self.state.lock();
        let at = st.write_index;
        st.faults.push_back((fault, at));
        drop(st);
        self.cond.notify_all();
    }

    /// Returns true if any fault is still pending in this segment.
    #[must_use]
    pub fn has_pending_fault(&self) -> bool {
        !self.state.lock().faults.is_empty()
    }

    /// Returns the last pending fault sitting exactly at `offset`.
    #[must_use]
    pub fn fault_at(&self, offset: usize) -> Option<StreamFault> {
        self.state
            .lock()
            .faults
            .iter()
            .rev()
            .find(|(_, at)| *at == offset)
            .map(|(fault, _)| fault.clone())
    }

    /// Freezes the segment length at the current write cursor.
    pub fn mark_write_done(&self) {
        self.state.lock().write_done = true;
        self.cond.notify_all();
    }

    /// Returns true once the producer has moved past this segment.
    #[must_use]
    pub fn is_write_done(&self) -> bool {
        self.state.lock().write_done
    }

    /// Returns true if every written byte was read and no more will come.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        let st = self.state.lock();
        st.write_done && st.read_index >= st.end()
    }

    /// Returns the write cursor.
    #[must_use]
    pub fn write_index(&self) -> usize {
        self.state.lock().write_index
    }

    /// Returns the read cursor.
    #[must_use]
    pub fn read_index(&self) -> usize {
        self.state.lock().read_index
    }

    /// Returns true if the payload is resident.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.state.lock().data.is_some()
    }

    /// Returns true if a reload failed for good.
    #[must_use]
    pub fn is_unrecoverable(&self) -> bool {
        self.state.lock().unrecoverable
    }

    /// Returns where the payload was flushed, if it was.
    #[must_use]
    pub fn location(&self) -> Option<FileLocation> {
        self.state.lock().location.clone()
    }

    /// Returns true if the segment is finalized, resident, non-empty, and
    /// not yet written to disk.
    #[must_use]
    pub fn needs_flush(&self) -> bool {
        let st = self.state.lock();
        st.write_done && st.location.is_none() && st.data.is_some() && st.write_index > 0
    }

    /// Hands the finalized payload to `write` and records where it landed.
    ///
    /// Returns `Ok(None)` when there was nothing to flush or `write`
    /// declined the payload.
    ///
    /// # Errors
    ///
    /// Returns the error from `write`; the payload stays resident.
    pub fn flush_with<F>(&self, write: F) -> StorageResult<Option<FileLocation>>
    where
        F: FnOnce(&[u8]) -> StorageResult<Option<FileLocation>>,
    {
        let mut st = self.state.lock();
        if !st.write_done || st.location.is_some() || st.write_index == 0 {
            return Ok(None);
        }
        let Some(payload) = st.data.as_ref() else {
            return Ok(None);
        };
        let location = write(payload)?;
        if location.is_some() {
            st.location.clone_from(&location);
        }
        Ok(location)
    }

    /// Drops the resident payload of a flushed segment.
    ///
    /// Returns `true` if memory was released.
    pub fn evict(&self) -> bool {
        let mut st = self.state.lock();
        if st.location.is_none() || st.data.is_none() {
            return false;
        }
        st.data = None;
        true
    }

    /// Restores an evicted payload from its backing file.
    ///
    /// A missing file is retried with a random pause of up to
    /// `policy.backoff`. When the attempts run out, or any other error
    /// occurs, the segment is marked unrecoverable and the stream ends at
    /// its read cursor.
    ///
    /// # Errors
    ///
    /// Returns the last storage error.
    pub fn reload(&self, policy: ReloadPolicy) -> StorageResult<()> {
        let location = {
            let mut st = self.state.lock();
            if st.data.is_some() {
                return Ok(());
            }
            if st.unrecoverable {
                return Err(lost_payload(st.location.as_ref().map(|l| l.path.as_path())));
            }
            match st.location.clone() {
                Some(location) => location,
                None => {
                    self.give_up(&mut st);
                    return Err(lost_payload(None));
                }
            }
        };

        let attempts = policy.attempts.max(1);
        let mut attempt = 0;
        let err = loop {
            attempt += 1;
            match read_region(&location.path, location.offset, location.len) {
                Ok(bytes) => {
                    let mut st = self.state.lock();
                    if st.data.is_none() {
                        st.data = Some(bytes);
                    }
                    drop(st);
                    self.cond.notify_all();
                    return Ok(());
                }
                Err(e) if e.is_not_found() && attempt < attempts => {
                    std::thread::sleep(random_pause(policy.backoff));
                }
                Err(e) => break e,
            }
        };

        let mut st = self.state.lock();
        self.give_up(&mut st);
        Err(err)
    }

    fn give_up(&self, st: &mut SegmentState) {
        st.unrecoverable = true;
        let cursor = st.read_index;
        st.faults.retain(|(_, at)| *at <= cursor);
        st.faults.push_back((StreamFault::EndOfStream, cursor));
        self.cond.notify_all();
    }

    /// Parks the caller until data, write-done, a fault, or `timeout`.
    pub fn wait_for_data(&self, timeout: Duration) {
        let mut st = self.state.lock();
        let ready = st.end() > st.read_index || st.write_done || st.fault_at_cursor().is_some();
        if !ready {
            let _ = self.cond.wait_for(&mut st, timeout);
        }
    }

    /// Wakes every thread parked on this segment.
    pub fn wake(&self) {
        self.cond.notify_all();
    }
}

fn lost_payload(path: Option<&Path>) -> StorageError {
    let message = match path {
        Some(path) => format!("payload in {} is unrecoverable", path.display()),
        None => "payload was never written to disk".to_string(),
    };
    StorageError::Io(io::Error::new(io::ErrorKind::NotFound, message))
}

/// Random pause in `[1ms, max]`.
pub(crate) fn random_pause(max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX).max(1);
    Duration::from_millis(rand::thread_rng().gen_range(1..=max_ms))
}
