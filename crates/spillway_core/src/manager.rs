//! Segment manager.
//!
//! The manager owns the segment ring and every position into it:
//!
//! ```text
//!  maint_pos      read_pos             read_pos + window      write_pos
//!      |  consumed   |   window (resident)   |   ahead (spillable)  |
//!      v             v                       v                      v
//!   [ seg ] [ seg ] [ seg ] [ seg ] [ seg ] [ seg ] [ seg ] [ seg ] [ seg ] [ None ... ]
//! ```
//!
//! The producer only moves `write_pos`, the consumer only moves `read_pos`,
//! and maintenance moves `maint_pos`, compacts the ring, and grows it.
//!
//! # Locking
//!
//! Lock order is producer, consumer, ring, files, segment. The two domain
//! guards are held together only for lockdown, clear, and the final backup
//! sweep of a hard shutdown.

use crate::config::BufferConfig;
use crate::error::{BufferError, BufferResult, StreamFault};
use crate::files::BackingFiles;
use crate::maintenance::{self, MaintenanceCommand, MaintenanceHandle};
use crate::segment::{random_pause, ReloadPolicy, Segment};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Maximum number of times the ring grows.
const MAX_GROWTHS: usize = 3;

/// Producer waits between stall warnings.
const STALL_WARN_EVERY: u32 = 10;

#[derive(Debug)]
struct Ring {
    slots: Vec<Option<Arc<Segment>>>,
    read_pos: usize,
    write_pos: usize,
    maint_pos: usize,
}

impl Ring {
    fn new(capacity: usize, segment_size: usize) -> Self {
        let mut slots = vec![None; capacity];
        slots[0] = Some(Arc::new(Segment::new(segment_size)));
        Self {
            slots,
            read_pos: 0,
            write_pos: 0,
            maint_pos: 0,
        }
    }

    fn segment(&self, index: usize) -> BufferResult<Arc<Segment>> {
        self.slots
            .get(index)
            .and_then(Option::clone)
            .ok_or(BufferError::MissingSegment { index })
    }

    fn live(&self, range: std::ops::Range<usize>) -> Vec<Arc<Segment>> {
        let end = range.end.min(self.slots.len());
        let start = range.start.min(end);
        self.slots[start..end].iter().flatten().cloned().collect()
    }

    fn position_of(&self, segment: &Arc<Segment>) -> Option<usize> {
        (self.read_pos..=self.write_pos).find(|&i| {
            self.slots
                .get(i)
                .and_then(Option::as_ref)
                .is_some_and(|s| Arc::ptr_eq(s, segment))
        })
    }
}

/// The last fault the producer recorded.
#[derive(Debug, Clone)]
struct RecordedFault {
    write_pos: usize,
    offset: usize,
    fault: StreamFault,
}

enum FlushOutcome {
    Flushed,
    Skipped,
    Failed,
}

/// Owns the segment ring, the backing files, and the maintenance thread.
#[derive(Debug)]
pub struct SegmentManager {
    config: BufferConfig,
    producer: Mutex<()>,
    consumer: Mutex<()>,
    ring: RwLock<Ring>,
    files: Mutex<BackingFiles>,
    produce_done: AtomicBool,
    shutdown: AtomicBool,
    growths: AtomicUsize,
    high_water: AtomicUsize,
    reloads: AtomicU64,
    evictions: AtomicU64,
    last_fault: Mutex<Option<RecordedFault>>,
    maintenance: Mutex<Option<MaintenanceHandle>>,
}

impl SegmentManager {
    /// Creates a manager and starts its maintenance thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the thread cannot
    /// be spawned. A spill directory that cannot be created only switches
    /// the buffer to memory-only mode.
    pub fn new(config: BufferConfig) -> BufferResult<Arc<Self>> {
        config.validate()?;

        let files = BackingFiles::new(&config);
        let ring = Ring::new(config.segment_count, config.segment_size);
        let period = config.maintenance_period;

        let manager = Arc::new(Self {
            config,
            producer: Mutex::new(()),
            consumer: Mutex::new(()),
            ring: RwLock::new(ring),
            files: Mutex::new(files),
            produce_done: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            growths: AtomicUsize::new(0),
            high_water: AtomicUsize::new(1),
            reloads: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            last_fault: Mutex::new(None),
            maintenance: Mutex::new(None),
        });

        let handle = maintenance::spawn(Arc::downgrade(&manager), period)?;
        *manager.maintenance.lock() = Some(handle);

        debug!(
            segment_size = manager.config.segment_size,
            segments = manager.config.segment_count,
            window = manager.config.window_size,
            use_files = manager.use_files(),
            "buffer started"
        );
        Ok(manager)
    }

    /// Returns the configuration the buffer was built with.
    #[must_use]
    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Takes the producer-domain guard.
    pub fn producer_guard(&self) -> MutexGuard<'_, ()> {
        self.producer.lock()
    }

    /// Takes the consumer-domain guard.
    pub fn consumer_guard(&self) -> MutexGuard<'_, ()> {
        self.consumer.lock()
    }

    fn reload_policy(&self) -> ReloadPolicy {
        ReloadPolicy {
            attempts: self.config.reload_attempts,
            backoff: self.config.reload_backoff,
        }
    }

    // ------------------------------------------------------------------
    // Producer side
    // ------------------------------------------------------------------

    /// Returns the segment the producer is filling.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::MissingSegment`] if the slot is empty.
    pub fn current_write_segment(&self) -> BufferResult<Arc<Segment>> {
        let ring = self.ring.read();
        ring.segment(ring.write_pos)
    }

    /// Moves the producer to a fresh segment.
    ///
    /// While the ring is full this sleeps with the producer guard released.
    /// Returns `None` once production is done or the buffer is shut down.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::MissingSegment`] if the ring is inconsistent.
    pub fn next_write_segment(
        &self,
        guard: &mut MutexGuard<'_, ()>,
    ) -> BufferResult<Option<Arc<Segment>>> {
        let mut waits = 0u32;
        loop {
            if self.is_shutdown() || self.is_produce_done() {
                return Ok(None);
            }

            {
                let mut ring = self.ring.write();
                if ring.write_pos + 1 < ring.slots.len() {
                    ring.segment(ring.write_pos)?.mark_write_done();
                    ring.write_pos += 1;

                    let segment = Arc::new(Segment::new(self.config.segment_size));
                    let write_pos = ring.write_pos;
                    ring.slots[write_pos] = Some(Arc::clone(&segment));

                    let in_use = ring.write_pos - ring.read_pos + 1;
                    self.high_water.fetch_max(in_use, Ordering::Relaxed);
                    return Ok(Some(segment));
                }
            }

            waits += 1;
            if waits % STALL_WARN_EVERY == 0 {
                warn!(waits, capacity = self.capacity(), "segment ring full, producer waiting");
            }
            let pause = random_pause(self.config.maintenance_period);
            MutexGuard::unlocked(guard, || std::thread::sleep(pause));
        }
    }

    /// Records a fault at the producer's write offset.
    ///
    /// The caller must hold the producer guard.
    pub fn record_fault_locked(&self, fault: StreamFault) -> BufferResult<()> {
        let (write_pos, segment) = {
            let ring = self.ring.read();
            (ring.write_pos, ring.segment(ring.write_pos)?)
        };
        let offset = segment.write_index();
        segment.set_fault(fault.clone());
        *self.last_fault.lock() = Some(RecordedFault {
            write_pos,
            offset,
            fault,
        });
        Ok(())
    }

    /// Marks production done. Idempotent.
    pub fn set_produce_done(&self) {
        let _producer = self.producer.lock();
        self.set_produce_done_locked();
    }

    /// Marks production done with the producer guard already held.
    pub fn set_produce_done_locked(&self) {
        if self.produce_done.swap(true, Ordering::AcqRel) {
            return;
        }
        match self.record_fault_locked(StreamFault::EndOfStream) {
            Ok(()) => {
                if let Ok(segment) = self.current_write_segment() {
                    segment.mark_write_done();
                }
            }
            Err(e) => warn!(error = %e, "cannot mark end of stream"),
        }
        debug!("produce side done");
    }

    // ------------------------------------------------------------------
    // Consumer side
    // ------------------------------------------------------------------

    /// Returns the consumer's segment, advancing past exhausted ones.
    ///
    /// The caller must hold the consumer guard.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::MissingSegment`] if the ring is inconsistent.
    pub fn next_read_segment(&self) -> BufferResult<Arc<Segment>> {
        let mut ring = self.ring.write();
        loop {
            let segment = ring.segment(ring.read_pos)?;
            if ring.read_pos < ring.write_pos
                && segment.is_exhausted()
                && !segment.has_pending_fault()
            {
                ring.read_pos += 1;
                continue;
            }
            return Ok(segment);
        }
    }

    /// Asks maintenance to load the consumer window and waits for it.
    ///
    /// Loads on the calling thread only when no maintenance thread is
    /// running. A slow reply is waited out, never raced.
    pub fn request_window_load(&self) {
        let (reply, answer) = mpsc::channel();
        let sent = {
            let maintenance = self.maintenance.lock();
            maintenance.as_ref().is_some_and(|h| {
                !h.is_current_thread() && h.send(MaintenanceCommand::LoadWindow(reply))
            })
        };
        if !sent {
            if !self.is_shutdown() {
                self.load_window();
            }
            return;
        }

        loop {
            match answer.recv_timeout(self.config.shutdown_timeout) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                Err(RecvTimeoutError::Timeout) => {
                    if self.is_shutdown() {
                        return;
                    }
                    warn!("window load still pending, waiting for maintenance");
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Runs one maintenance pass: sweep, then compact if needed.
    pub fn run_maintenance(&self) {
        if self.is_shutdown() {
            return;
        }
        self.sweep();
        if self.needs_lockdown() {
            self.lockdown();
        }
    }

    fn sweep(&self) {
        if !self.retire_consumed() {
            self.switch_to_memory_only();
        }
        if !self.load_window() {
            return;
        }
        self.flush_ahead();
    }

    /// Retires segments behind the read position.
    ///
    /// Returns `false` if a backup write failed. The caller escalates once
    /// it holds no domain guard.
    fn retire_consumed(&self) -> bool {
        let retired = {
            let mut ring = self.ring.write();
            let (from, to) = (ring.maint_pos, ring.read_pos);
            let taken: Vec<Arc<Segment>> =
                ring.slots[from..to].iter_mut().filter_map(Option::take).collect();
            ring.maint_pos = to;
            taken
        };
        if retired.is_empty() {
            return true;
        }

        let mut backup = self.files.lock().backup_all();
        let mut written = true;
        for segment in retired {
            if backup && segment.needs_flush() {
                if let FlushOutcome::Failed = self.flush_segment(&segment) {
                    written = false;
                    backup = false;
                }
            }
            if let Some(location) = segment.location() {
                self.files.lock().release(&location.path);
            }
        }
        written
    }

    /// Reloads evicted segments inside the consumer window.
    ///
    /// Returns `false` if a segment was lost and the stream ended early.
    pub fn load_window(&self) -> bool {
        let window = {
            let ring = self.ring.read();
            let end = (ring.read_pos + self.config.window_size).min(ring.write_pos + 1);
            ring.live(ring.read_pos..end)
        };

        for segment in window {
            if segment.is_loaded() || segment.is_unrecoverable() {
                continue;
            }
            match segment.reload(self.reload_policy()) {
                Ok(()) => {
                    self.reloads.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    warn!(error = %e, "cannot reload segment");
                    self.end_stream_early(&segment);
                    return false;
                }
            }
        }
        true
    }

    /// Flushes and evicts completed segments ahead of the window.
    fn flush_ahead(&self) {
        let (start, ahead) = {
            let ring = self.ring.read();
            let start = ring.read_pos + self.config.window_size;
            (start, ring.live(start..ring.write_pos))
        };
        if ahead.is_empty() || !self.files.lock().can_spill() {
            return;
        }

        for segment in ahead {
            if !segment.needs_flush() {
                continue;
            }
            match self.flush_segment(&segment) {
                FlushOutcome::Flushed => {
                    let still_ahead = self.ring.read().read_pos + self.config.window_size <= start;
                    if still_ahead && segment.evict() {
                        self.evictions.fetch_add(1, Ordering::Relaxed);
                    }
                }
                FlushOutcome::Skipped => break,
                FlushOutcome::Failed => {
                    self.switch_to_memory_only();
                    break;
                }
            }
        }
    }

    fn flush_segment(&self, segment: &Segment) -> FlushOutcome {
        let mut files = self.files.lock();
        match segment.flush_with(|bytes| files.append(bytes)) {
            Ok(Some(_)) => FlushOutcome::Flushed,
            Ok(None) => FlushOutcome::Skipped,
            Err(e) => {
                warn!(error = %e, "cannot write segment to disk");
                FlushOutcome::Failed
            }
        }
    }

    fn needs_lockdown(&self) -> bool {
        let ring = self.ring.read();
        ring.write_pos >= ring.slots.len() * 9 / 10
    }

    /// Compacts the ring to index 0 and grows it under sustained pressure.
    fn lockdown(&self) {
        let written = {
            let _producer = self.producer.lock();
            let _consumer = self.consumer.lock();
            let written = self.retire_consumed();
            self.compact_and_grow();
            written
        };
        if !written {
            self.switch_to_memory_only();
        }
    }

    fn compact_and_grow(&self) {
        let mut ring = self.ring.write();
        let (read_pos, write_pos) = (ring.read_pos, ring.write_pos);
        if read_pos > 0 {
            // Everything before read_pos was retired, so only empty slots wrap.
            ring.slots.rotate_left(read_pos);
            ring.read_pos = 0;
            ring.write_pos = write_pos - read_pos;
            debug!(shift = read_pos, "compacted segment ring");
        }
        ring.maint_pos = 0;

        let capacity = ring.slots.len();
        let occupancy = ring.write_pos - ring.read_pos + 1;
        if occupancy * 10 < capacity * 9 || self.growth_count() >= MAX_GROWTHS {
            return;
        }

        let grown = (capacity * 13).div_ceil(10);
        let bytes = (self.config.segment_size as u64).saturating_mul(grown as u64);
        if bytes > self.config.max_disk_bytes() {
            debug!(capacity, grown, "ring growth would exceed disk budget");
            return;
        }
        ring.slots.resize(grown, None);
        let growths = self.growths.fetch_add(1, Ordering::Relaxed) + 1;
        info!(from = capacity, to = grown, growths, "grew segment ring");
    }

    /// Stops spilling after a disk write failure.
    ///
    /// Evicted segments that were not consumed yet are reloaded first.
    fn switch_to_memory_only(&self) {
        warn!("disk write failed, switching to memory-only mode");
        self.files.lock().clear_backup_all();

        let pending = {
            let ring = self.ring.read();
            ring.live(ring.read_pos..ring.write_pos + 1)
        };
        for segment in pending {
            if segment.is_loaded() {
                continue;
            }
            if let Err(e) = segment.reload(self.reload_policy()) {
                warn!(error = %e, "cannot reload segment while leaving disk mode");
                self.end_stream_early(&segment);
                break;
            }
            self.reloads.fetch_add(1, Ordering::Relaxed);
        }

        let mut files = self.files.lock();
        if files.delete_files() {
            files.remove_all();
        }
        files.disable();
    }

    /// Ends the stream at `lost`, which could not be loaded.
    ///
    /// Everything after it is discarded and nothing on disk is deleted.
    fn end_stream_early(&self, lost: &Arc<Segment>) {
        warn!("buffered data lost, ending stream early");
        self.files.lock().freeze();

        let _producer = self.producer.lock();
        let tail = {
            let mut ring = self.ring.write();
            match ring.position_of(lost) {
                Some(index) => {
                    let write_pos = ring.write_pos;
                    for slot in &mut ring.slots[index + 1..=write_pos] {
                        *slot = None;
                    }
                    ring.write_pos = index;
                    if lost.is_loaded() {
                        lost.set_fault(StreamFault::EndOfStream);
                        Some(Arc::clone(lost))
                    } else {
                        let ended = Arc::new(Segment::ended(self.config.segment_size));
                        ring.slots[index] = Some(Arc::clone(&ended));
                        Some(ended)
                    }
                }
                None => None,
            }
        };

        self.produce_done.store(true, Ordering::Release);
        if let Some(segment) = tail {
            segment.mark_write_done();
        }
        lost.wake();
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    /// Resets the buffer through the maintenance thread.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::IllegalState`] if the buffer is shut down or
    /// holds no data.
    pub fn clear(&self) -> BufferResult<()> {
        if self.is_shutdown() {
            return Err(BufferError::illegal_state("buffer is shut down"));
        }

        let (reply, answer) = mpsc::channel();
        let sent = {
            let maintenance = self.maintenance.lock();
            maintenance
                .as_ref()
                .is_some_and(|h| !h.is_current_thread() && h.send(MaintenanceCommand::Clear(reply)))
        };
        if !sent {
            return self.clear_now();
        }
        answer
            .recv()
            .unwrap_or_else(|_| Err(BufferError::illegal_state("maintenance stopped")))
    }

    /// Resets the buffer on the calling thread.
    pub(crate) fn clear_now(&self) -> BufferResult<()> {
        let _producer = self.producer.lock();
        let _consumer = self.consumer.lock();
        if self.is_shutdown() {
            return Err(BufferError::illegal_state("buffer is shut down"));
        }

        let (old_read, fresh) = {
            let mut ring = self.ring.write();
            let write_segment = ring.segment(ring.write_pos)?;
            let write_offset = write_segment.write_index();
            if ring.write_pos == 0 && write_offset == 0 {
                return Err(BufferError::illegal_state("buffer is empty"));
            }

            let pending = self
                .last_fault
                .lock()
                .take()
                .filter(|f| f.write_pos == ring.write_pos && f.offset == write_offset)
                .filter(|f| write_segment.fault_at(f.offset).as_ref() == Some(&f.fault));

            let old_read = ring.segment(ring.read_pos).ok();
            let capacity = ring.slots.len();
            *ring = Ring::new(capacity, self.config.segment_size);
            let fresh = ring.segment(0)?;

            if let Some(recorded) = pending {
                fresh.set_fault(recorded.fault.clone());
                *self.last_fault.lock() = Some(RecordedFault {
                    write_pos: 0,
                    offset: 0,
                    ..recorded
                });
            }
            (old_read, fresh)
        };

        self.files.lock().reset();
        if self.is_produce_done() {
            fresh.mark_write_done();
        }
        if let Some(segment) = old_read {
            segment.wake();
        }
        info!("buffer cleared");
        Ok(())
    }

    /// Shuts the buffer down.
    ///
    /// A soft shutdown only closes the producer side; the consumer can still
    /// drain. A hard shutdown also stops maintenance, releases backing data,
    /// and discards everything unread.
    pub fn shutdown(&self, complete: bool) {
        self.set_produce_done();
        if !complete || self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("shutting down buffer");

        let handle = self.maintenance.lock().take();
        let clean = handle.map_or(true, |h| h.stop(self.config.shutdown_timeout));

        if clean && self.files.lock().backup_all() {
            let _producer = self.producer.lock();
            let _consumer = self.consumer.lock();
            self.backup_remaining();
        }

        {
            let mut files = self.files.lock();
            files.seal_current();
            if files.delete_files() {
                files.remove_all();
            }
        }

        let old = {
            let mut ring = self.ring.write();
            let old = ring.live(ring.read_pos..ring.write_pos + 1);
            let capacity = ring.slots.len();
            *ring = Ring::new(capacity, self.config.segment_size);
            if let Ok(segment) = ring.segment(0) {
                segment.set_fault(StreamFault::EndOfStream);
                segment.mark_write_done();
            }
            old
        };
        // Write-done makes a parked reader's wait condition true, so a
        // reader that has not parked yet cannot miss the wakeup.
        for segment in old {
            segment.mark_write_done();
        }
    }

    /// Writes every unflushed segment to disk.
    fn backup_remaining(&self) {
        let pending = {
            let ring = self.ring.read();
            ring.live(ring.maint_pos..ring.write_pos + 1)
        };
        for segment in pending {
            segment.mark_write_done();
            if let FlushOutcome::Failed = self.flush_segment(&segment) {
                warn!("final backup incomplete");
                break;
            }
        }
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Returns the number of slots in the ring.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.read().slots.len()
    }

    /// Returns the number of segments between the read and write positions.
    #[must_use]
    pub fn segments_in_use(&self) -> usize {
        let ring = self.ring.read();
        ring.write_pos - ring.read_pos + 1
    }

    /// Returns the most segments that were in use at once.
    #[must_use]
    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::Relaxed)
    }

    /// Returns the number of unread segments whose payload is in memory.
    #[must_use]
    pub fn resident_segment_count(&self) -> usize {
        let ring = self.ring.read();
        ring.live(ring.read_pos..ring.write_pos + 1)
            .iter()
            .filter(|s| s.is_loaded())
            .count()
    }

    /// Returns the read position.
    #[must_use]
    pub fn read_pos(&self) -> usize {
        self.ring.read().read_pos
    }

    /// Returns the write position.
    #[must_use]
    pub fn write_pos(&self) -> usize {
        self.ring.read().write_pos
    }

    /// Returns the segment size.
    #[must_use]
    pub fn segment_size(&self) -> usize {
        self.config.segment_size
    }

    /// Returns the window size.
    #[must_use]
    pub fn window_size(&self) -> usize {
        self.config.window_size
    }

    /// Returns the number of live backing files.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.lock().file_count()
    }

    /// Returns the file cap.
    #[must_use]
    pub fn file_limit(&self) -> usize {
        self.files.lock().file_limit()
    }

    /// Returns the most backing files live at once.
    #[must_use]
    pub fn file_high_water(&self) -> usize {
        self.files.lock().high_water()
    }

    /// Returns the name of the file being appended to.
    #[must_use]
    pub fn current_file_name(&self) -> Option<String> {
        self.files.lock().current_file_name()
    }

    /// Returns the spill directory, if files are in use.
    #[must_use]
    pub fn backing_dir(&self) -> Option<PathBuf> {
        self.files.lock().dir_path().map(PathBuf::from)
    }

    /// Returns whether segments spill to disk.
    #[must_use]
    pub fn use_files(&self) -> bool {
        self.files.lock().use_files()
    }

    /// Returns whether consumed files are deleted.
    #[must_use]
    pub fn delete_files(&self) -> bool {
        self.files.lock().delete_files()
    }

    /// Returns whether every byte is backed up.
    #[must_use]
    pub fn backup_all(&self) -> bool {
        self.files.lock().backup_all()
    }

    /// Returns true once production is done.
    #[must_use]
    pub fn is_produce_done(&self) -> bool {
        self.produce_done.load(Ordering::Acquire)
    }

    /// Returns true after a hard shutdown.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Returns how many times the ring grew.
    #[must_use]
    pub fn growth_count(&self) -> usize {
        self.growths.load(Ordering::Relaxed)
    }

    /// Returns the number of payloads written to disk.
    #[must_use]
    pub fn flushes(&self) -> u64 {
        self.files.lock().flushes()
    }

    /// Returns the number of payloads loaded back from disk.
    #[must_use]
    pub fn reloads(&self) -> u64 {
        self.reloads.load(Ordering::Relaxed)
    }

    /// Returns the number of payloads dropped from memory.
    #[must_use]
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}
