//! Drains an external byte source into a buffer on a background thread.

use crate::buffer::SpillBuffer;
use parking_lot::Mutex;
use std::io::{self, Read};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Upstream byte source.
///
/// `read` blocks until bytes are available and returns `Ok(0)` at end of
/// input. `close` may be called from another thread to unblock a reader.
pub trait ByteSource: Send + Sync {
    /// Reads bytes into `buf`.
    ///
    /// # Errors
    ///
    /// Returns the source's I/O error.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Closes the source.
    ///
    /// # Errors
    ///
    /// Returns the source's I/O error.
    fn close(&self) -> io::Result<()>;
}

impl ByteSource for TcpStream {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut stream = self;
        Read::read(&mut stream, buf)
    }

    fn close(&self) -> io::Result<()> {
        match self.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }
}

/// Adapts any [`Read`] into a [`ByteSource`].
///
/// Closing only stops further reads; a read already blocked inside the
/// reader is not interrupted.
#[derive(Debug)]
pub struct ReaderSource<R> {
    inner: Mutex<R>,
    closed: AtomicBool,
}

impl<R: Read + Send> ReaderSource<R> {
    /// Wraps `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            inner: Mutex::new(reader),
            closed: AtomicBool::new(false),
        }
    }
}

impl<R: Read + Send> ByteSource for ReaderSource<R> {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(0);
        }
        self.inner.lock().read(buf)
    }

    fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// A background thread copying a [`ByteSource`] into a [`SpillBuffer`].
pub struct Pump {
    stop: Arc<AtomicBool>,
    source: Arc<dyn ByteSource>,
    thread: Option<JoinHandle<()>>,
    finished: Receiver<()>,
}

impl std::fmt::Debug for Pump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pump")
            .field("stopped", &self.stop.load(Ordering::Relaxed))
            .field("running", &self.thread.is_some())
            .finish_non_exhaustive()
    }
}

impl Pump {
    /// Starts pumping `source` into `buffer`.
    ///
    /// The pump finishes the buffer at end of input and stops when the
    /// buffer refuses more bytes. Read errors are recorded in the stream
    /// and pumping continues.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn start(buffer: Arc<SpillBuffer>, source: Arc<dyn ByteSource>) -> io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let (done, finished) = mpsc::channel();

        let thread = {
            let stop = Arc::clone(&stop);
            let source = Arc::clone(&source);
            thread::Builder::new()
                .name("spillway-pump".into())
                .spawn(move || {
                    run(&buffer, source.as_ref(), &stop);
                    let _ = done.send(());
                })?
        };

        Ok(Self {
            stop,
            source,
            thread: Some(thread),
            finished,
        })
    }

    /// Returns true once the pump thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stops the pump, closes the source, and waits up to `timeout`.
    ///
    /// Returns `true` if the thread exited in time; otherwise it is
    /// detached.
    pub fn shutdown(mut self, timeout: Duration) -> bool {
        self.signal_stop();
        let Some(thread) = self.thread.take() else {
            return true;
        };

        match self.finished.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => thread.join().is_ok(),
            Err(RecvTimeoutError::Timeout) => {
                warn!(?timeout, "pump did not stop in time, detaching");
                false
            }
        }
    }

    fn signal_stop(&self) {
        self.stop.store(true, Ordering::Release);
        if let Err(e) = self.source.close() {
            warn!(error = %e, "cannot close pump source");
        }
    }
}

impl Drop for Pump {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.signal_stop();
        }
    }
}

fn run(buffer: &SpillBuffer, source: &dyn ByteSource, stop: &AtomicBool) {
    let mut scratch = vec![0u8; buffer.manager().segment_size()];
    let pause = buffer.manager().config().maintenance_period;

    while !stop.load(Ordering::Acquire) {
        match source.read(&mut scratch) {
            Ok(0) => {
                debug!("pump source reached end of input");
                buffer.finish();
                break;
            }
            Ok(n) => {
                if let Err(e) = write_all(buffer, &scratch[..n]) {
                    debug!(error = %e, "buffer refused bytes, pump stopping");
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                if stop.load(Ordering::Acquire) {
                    break;
                }
                warn!(error = %e, "pump source read failed");
                buffer.record_error(&e);
                thread::sleep(pause);
            }
        }
    }
}

fn write_all(buffer: &SpillBuffer, mut data: &[u8]) -> crate::BufferResult<()> {
    while !data.is_empty() {
        let n = buffer.write(data)?;
        data = &data[n..];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BufferConfig;
    use std::io::Cursor;
    use std::net::TcpListener;
    use std::sync::atomic::AtomicUsize;
    use tempfile::tempdir;

    fn buffer(base: &std::path::Path) -> Arc<SpillBuffer> {
        let config = BufferConfig::new()
            .buffer_dir(base)
            .segment_size(8)
            .segment_count(64)
            .maintenance_period(Duration::from_millis(5));
        Arc::new(SpillBuffer::new(config).unwrap())
    }

    fn drain(buffer: &SpillBuffer) -> (Vec<u8>, Vec<io::ErrorKind>) {
        let mut data = Vec::new();
        let mut errors = Vec::new();
        let mut chunk = [0u8; 16];
        loop {
            match buffer.read(&mut chunk) {
                Ok(0) => return (data, errors),
                Ok(n) => data.extend_from_slice(&chunk[..n]),
                Err(e) => errors.push(io::Error::from(e).kind()),
            }
        }
    }

    #[test]
    fn pumps_reader_to_end() {
        let temp = tempdir().unwrap();
        let buffer = buffer(temp.path());
        let payload: Vec<u8> = (0..200u8).collect();

        let source = Arc::new(ReaderSource::new(Cursor::new(payload.clone())));
        let pump = Pump::start(Arc::clone(&buffer), source).unwrap();

        let (data, errors) = drain(&buffer);
        assert_eq!(data, payload);
        assert!(errors.is_empty());
        assert!(pump.shutdown(Duration::from_secs(5)));
    }

    /// Fails once after the first chunk, then ends.
    struct Flaky {
        calls: AtomicUsize,
    }

    impl ByteSource for Flaky {
        fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
            match self.calls.fetch_add(1, Ordering::SeqCst) {
                0 => {
                    buf[..3].copy_from_slice(b"abc");
                    Ok(3)
                }
                1 => Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
                2 => Err(io::Error::new(io::ErrorKind::Interrupted, "signal")),
                3 => {
                    buf[..2].copy_from_slice(b"de");
                    Ok(2)
                }
                _ => Ok(0),
            }
        }

        fn close(&self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn read_errors_are_forwarded_in_order() {
        let temp = tempdir().unwrap();
        let buffer = buffer(temp.path());
        let source = Arc::new(Flaky {
            calls: AtomicUsize::new(0),
        });
        let pump = Pump::start(Arc::clone(&buffer), source).unwrap();

        let (data, errors) = drain(&buffer);
        assert_eq!(data, b"abcde");
        assert_eq!(errors, vec![io::ErrorKind::ConnectionReset]);
        assert!(pump.shutdown(Duration::from_secs(5)));
    }

    #[test]
    fn stops_when_buffer_closed() {
        let temp = tempdir().unwrap();
        let buffer = buffer(temp.path());
        let source = Arc::new(ReaderSource::new(io::repeat(7)));
        let pump = Pump::start(Arc::clone(&buffer), source).unwrap();

        thread::sleep(Duration::from_millis(20));
        buffer.close(true);
        assert!(pump.shutdown(Duration::from_secs(5)));
        assert!(buffer.bytes_in() > 0);
    }

    #[test]
    fn tcp_source_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = thread::spawn(move || {
            use std::io::Write;
            let mut stream = TcpStream::connect(addr).unwrap();
            stream.write_all(b"over tcp").unwrap();
        });
        let (stream, _) = listener.accept().unwrap();
        client.join().unwrap();

        let temp = tempdir().unwrap();
        let buffer = buffer(temp.path());
        let pump = Pump::start(Arc::clone(&buffer), Arc::new(stream)).unwrap();

        let (data, _) = drain(&buffer);
        assert_eq!(data, b"over tcp");
        assert!(pump.is_finished() || pump.shutdown(Duration::from_secs(5)));
    }
}
