//! Serialized background queue for decode/preload work.
//!
//! One dedicated thread drains a FIFO channel, so jobs run strictly in
//! submission order and never concurrently: at most one prepare or refill is
//! in flight per controller.
//!
//! Epoch mechanism cancels stale sessions: a job submitted with
//! `execute_with_epoch` is skipped if the shared epoch moved on before the
//! worker picked it up. Jobs that are already running check the epoch
//! themselves before publishing results (cooperative, no forced cancel).

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use log::trace;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Cloneable submit side of a `DecodeQueue`
#[derive(Clone)]
pub struct QueueHandle {
    sender: Sender<Job>,
    current_epoch: Arc<AtomicU64>,
}

impl QueueHandle {
    /// Run `f` on the queue thread
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.sender.send(Box::new(f)).is_err() {
            trace!("DecodeQueue closed, job dropped");
        }
    }

    /// Run `f` only if the epoch still equals `epoch` when the job starts.
    pub fn execute_with_epoch<F>(&self, epoch: u64, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let current_epoch = Arc::clone(&self.current_epoch);
        self.execute(move || {
            if current_epoch.load(Ordering::Acquire) == epoch {
                f();
            } else {
                trace!("Skipping stale job (epoch {})", epoch);
            }
        });
    }

    pub fn current_epoch(&self) -> u64 {
        self.current_epoch.load(Ordering::Acquire)
    }
}

/// Single-thread FIFO worker with a shared epoch counter.
pub struct DecodeQueue {
    handle: QueueHandle,
    thread: Option<thread::JoinHandle<()>>,
}

impl DecodeQueue {
    /// Spawn the worker thread.
    ///
    /// # Arguments
    ///
    /// * `name` - Thread name (shows up in debuggers/profilers)
    /// * `epoch` - Shared epoch counter for cancelling stale requests
    pub fn new(name: &str, epoch: Arc<AtomicU64>) -> std::io::Result<Self> {
        let (sender, receiver): (Sender<Job>, Receiver<Job>) = unbounded();

        let thread = thread::Builder::new().name(name.to_string()).spawn(move || {
            trace!("DecodeQueue worker started");
            // Ends when every sender is dropped
            for job in receiver.iter() {
                job();
            }
            trace!("DecodeQueue worker stopped");
        })?;

        Ok(Self {
            handle: QueueHandle {
                sender,
                current_epoch: epoch,
            },
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> QueueHandle {
        self.handle.clone()
    }

    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.execute(f);
    }

    pub fn execute_with_epoch<F>(&self, epoch: u64, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.execute_with_epoch(epoch, f);
    }

    pub fn current_epoch(&self) -> u64 {
        self.handle.current_epoch()
    }

    /// Block until every job submitted before this call has finished.
    ///
    /// Returns false on timeout.
    pub fn flush(&self, timeout: Duration) -> bool {
        let (done_tx, done_rx) = bounded::<()>(1);
        self.execute(move || {
            let _ = done_tx.send(());
        });
        done_rx.recv_timeout(timeout).is_ok()
    }
}

impl Drop for DecodeQueue {
    fn drop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        // Closing our sender ends the worker loop once the queue drains.
        // Outstanding QueueHandle clones keep it alive until they drop too.
        let (sender, _) = unbounded();
        drop(std::mem::replace(&mut self.handle.sender, sender));

        // Wait with timeout: a job stuck in a slow decode must not hang teardown.
        // Stale jobs are no-ops once the epoch moved, so this is normally quick.
        let deadline = Instant::now() + Duration::from_millis(500);
        while !thread.is_finished() {
            if Instant::now() >= deadline {
                trace!("DecodeQueue shutdown timeout, detaching worker");
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        let _ = thread.join();
    }
}
