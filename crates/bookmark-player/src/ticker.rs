//! Cancellable repeating progress refresh.
//!
//! The refresh task never touches controller state itself. It emits [`Tick`] messages on a
//! channel and the thread that owns the controller applies them, so the controller keeps a
//! single logical owner.

use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

/// One firing of a refresh task.
///
/// `generation` identifies the task that produced it; ticks from a cancelled or replaced
/// task are rejected by [`RefreshTimer::accepts`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tick {
    pub generation: u64,
}

/// A repeating task handle owned by the controller.
pub trait RefreshTimer {
    /// Start firing every `interval`, cancelling any task already running.
    fn start(&mut self, interval: Duration);

    /// Stop firing. Safe to call when nothing is running.
    fn cancel(&mut self);

    fn is_running(&self) -> bool;

    /// Whether `tick` came from the currently running task.
    fn accepts(&self, tick: Tick) -> bool;
}

struct Worker {
    stop_tx: Sender<()>,
    join: thread::JoinHandle<()>,
}

/// Thread-backed [`RefreshTimer`] delivering ticks over a crossbeam channel.
pub struct RepeatingTask {
    tick_tx: Sender<Tick>,
    generation: u64,
    worker: Option<Worker>,
}

impl RepeatingTask {
    pub fn new(tick_tx: Sender<Tick>) -> Self {
        Self {
            tick_tx,
            generation: 0,
            worker: None,
        }
    }

    /// Convenience constructor returning the task and the receiving end of its ticks.
    pub fn with_channel() -> (Self, Receiver<Tick>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self::new(tx), rx)
    }
}

impl RefreshTimer for RepeatingTask {
    fn start(&mut self, interval: Duration) {
        self.cancel();
        self.generation = self.generation.wrapping_add(1);

        let generation = self.generation;
        let tick_tx = self.tick_tx.clone();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let interval = interval.max(Duration::from_millis(1));

        let join = thread::spawn(move || {
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if tick_tx.send(Tick { generation }).is_err() {
                            break;
                        }
                    }
                    // Explicit stop or the handle was dropped.
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        let interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        tracing::debug!(generation, interval_ms, "refresh task started");
        self.worker = Some(Worker { stop_tx, join });
    }

    fn cancel(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            let _ = worker.join.join();
            tracing::debug!(generation = self.generation, "refresh task cancelled");
        }
    }

    fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    fn accepts(&self, tick: Tick) -> bool {
        self.worker.is_some() && tick.generation == self.generation
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
