//! Background status polling
//!
//! The controller lights its "alive" indicator only while it is being
//! polled, and the shared status cache goes stale without it. The heartbeat
//! runs on its own OS thread and shares the [`Link`] lock with foreground
//! commands, so its requests never interleave with theirs.

use crate::communication::Link;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Cycles between "still running" log lines
const LOG_EVERY_CYCLES: u64 = 200;

struct Worker {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

/// Periodic status requester with idempotent start and stop
pub struct HeartbeatScheduler {
    link: Arc<Link>,
    interval: Duration,
    cycles: Arc<AtomicU64>,
    worker: Mutex<Option<Worker>>,
}

impl HeartbeatScheduler {
    /// Create a stopped scheduler polling every `interval`
    pub fn new(link: Arc<Link>, interval: Duration) -> Self {
        Self {
            link,
            interval,
            cycles: Arc::new(AtomicU64::new(0)),
            worker: Mutex::new(None),
        }
    }

    /// Start polling. Returns `false` if it was already running.
    pub fn start(&self) -> bool {
        let mut worker = self.worker.lock();
        if let Some(existing) = worker.as_ref() {
            if !existing.handle.is_finished() {
                return false;
            }
        }
        if let Some(finished) = worker.take() {
            let _ = finished.handle.join();
        }

        let (shutdown, stop_rx) = mpsc::channel::<()>();
        let link = self.link.clone();
        let interval = self.interval;
        let cycles = self.cycles.clone();

        let spawned = thread::Builder::new()
            .name("tvm920-heartbeat".to_string())
            .spawn(move || {
                tracing::info!("TVM920 heartbeat started ({:?} interval)", interval);
                loop {
                    link.request_status();
                    let count = cycles.fetch_add(1, Ordering::Relaxed) + 1;
                    if count % LOG_EVERY_CYCLES == 0 {
                        tracing::info!("TVM920 heartbeat running ({} cycles)", count);
                    }
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::info!("TVM920 heartbeat stopped");
            });

        match spawned {
            Ok(handle) => {
                *worker = Some(Worker { shutdown, handle });
                true
            }
            Err(e) => {
                tracing::error!("Failed to spawn heartbeat thread: {}", e);
                false
            }
        }
    }

    /// Stop polling and wait for the thread to exit. Safe to call when
    /// already stopped.
    pub fn stop(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            let _ = worker.shutdown.send(());
            if worker.handle.join().is_err() {
                tracing::error!("Heartbeat thread panicked");
            }
        }
    }

    /// Whether the polling thread is alive
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Status requests issued since creation
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Polling interval
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for HeartbeatScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for HeartbeatScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatScheduler")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .field("cycles", &self.cycles())
            .finish()
    }
}
