//! Background maintenance actor.
//!
//! A single thread owns all segment migration. It ticks at a fixed rate and
//! also serves on-demand requests from the consumer and from `clear()`.

use crate::error::BufferResult;
use crate::manager::SegmentManager;
use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Commands served by the maintenance thread.
#[derive(Debug)]
pub enum MaintenanceCommand {
    /// Load the consumer window now; reply when done.
    LoadWindow(Sender<()>),
    /// Reset the buffer; reply with the outcome.
    Clear(Sender<BufferResult<()>>),
    /// Stop the thread.
    Shutdown,
}

/// Handle to a running maintenance thread.
#[derive(Debug)]
pub struct MaintenanceHandle {
    commands: Sender<MaintenanceCommand>,
    thread: Option<JoinHandle<()>>,
    finished: Receiver<()>,
}

impl MaintenanceHandle {
    /// Queues a command. Returns `false` if the thread is gone.
    pub fn send(&self, command: MaintenanceCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Returns true if called from the maintenance thread itself.
    #[must_use]
    pub fn is_current_thread(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|t| t.thread().id() == thread::current().id())
    }

    /// Stops the thread and waits up to `timeout` for it to exit.
    ///
    /// Returns `true` if the thread stopped cleanly. On timeout the thread
    /// is detached.
    pub fn stop(mut self, timeout: Duration) -> bool {
        let _ = self.commands.send(MaintenanceCommand::Shutdown);

        let Some(thread) = self.thread.take() else {
            return true;
        };
        if thread.thread().id() == thread::current().id() {
            // Joining ourselves would deadlock; the loop exits on its own.
            return false;
        }

        match self.finished.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => thread.join().is_ok(),
            Err(RecvTimeoutError::Timeout) => {
                warn!(?timeout, "maintenance thread did not stop in time, detaching");
                false
            }
        }
    }
}

/// Spawns the maintenance thread for `manager`.
///
/// The thread holds only a weak reference and exits once the manager is
/// dropped.
///
/// # Errors
///
/// Returns an error if the thread cannot be spawned.
pub fn spawn(manager: Weak<SegmentManager>, period: Duration) -> io::Result<MaintenanceHandle> {
    let (commands, inbox) = mpsc::channel();
    let (done, finished) = mpsc::channel();

    let thread = thread::Builder::new()
        .name("spillway-maintenance".into())
        .spawn(move || {
            run(&manager, &inbox, period);
            let _ = done.send(());
        })?;

    Ok(MaintenanceHandle {
        commands,
        thread: Some(thread),
        finished,
    })
}

fn run(manager: &Weak<SegmentManager>, inbox: &Receiver<MaintenanceCommand>, period: Duration) {
    debug!(?period, "maintenance started");
    let mut next_tick = Instant::now() + period;

    loop {
        let timeout = next_tick.saturating_duration_since(Instant::now());
        match inbox.recv_timeout(timeout) {
            Ok(MaintenanceCommand::LoadWindow(reply)) => {
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.load_window();
                let _ = reply.send(());
            }
            Ok(MaintenanceCommand::Clear(reply)) => {
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                let _ = reply.send(manager.clear_now());
            }
            Ok(MaintenanceCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                if manager.is_shutdown() {
                    break;
                }
                manager.run_maintenance();

                // Fixed rate; missed ticks are skipped, not replayed.
                next_tick += period;
                let now = Instant::now();
                if next_tick < now {
                    next_tick = now + period;
                }
            }
        }
    }

    debug!("maintenance stopped");
}
