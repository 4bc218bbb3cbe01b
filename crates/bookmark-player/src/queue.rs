//! Bounded queue of interleaved `f32` samples shared between pipeline stages.
//!
//! decode thread → queue → (resampler thread → queue) → output callback.
//! The output callback only uses non-blocking pops.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Thread-safe bounded FIFO of interleaved samples with a fixed channel count.
///
/// The `done` flag lives under the same mutex as the samples so close/drain checks never race.
pub struct SharedAudio {
    channels: usize,
    inner: Mutex<SharedInner>,
    cv: Condvar,
    max_buffered_samples: usize,
}

struct SharedInner {
    queue: VecDeque<f32>,
    done: bool,
}

/// How many frames a pop should wait for.
pub enum PopStrategy {
    /// Wait for exactly `frames`; `None` if closed first.
    BlockingExact { frames: usize },
    /// Wait for at least one frame, return up to `max_frames`.
    BlockingUpTo { max_frames: usize },
    /// Return whatever is buffered (up to `max_frames`) without waiting.
    NonBlocking { max_frames: usize },
}

/// Queue capacity in samples for `buffer_seconds` of audio; invalid durations fall back to 2 s.
pub fn calc_max_buffered_samples(rate_hz: u32, channels: usize, buffer_seconds: f32) -> usize {
    let secs = if buffer_seconds.is_finite() && buffer_seconds > 0.0 {
        buffer_seconds
    } else {
        2.0
    };
    let frames = (rate_hz as f32 * secs).ceil() as usize;
    frames.saturating_mul(channels)
}

impl SharedAudio {
    pub fn new(channels: usize, max_buffered_samples: usize) -> Self {
        let channels = channels.max(1);
        Self {
            channels,
            inner: Mutex::new(SharedInner {
                queue: VecDeque::new(),
                done: false,
            }),
            cv: Condvar::new(),
            max_buffered_samples: max_buffered_samples.max(channels),
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn is_done(&self) -> bool {
        self.lock().done
    }

    /// Mark the producer side finished and wake every waiter. Idempotent.
    pub fn close(&self) {
        self.lock().done = true;
        self.cv.notify_all();
    }

    /// Append samples, blocking while the queue is full. Remaining samples are dropped if the
    /// queue is closed meanwhile.
    pub fn push_interleaved_blocking(&self, samples: &[f32]) {
        let mut offset = 0;
        while offset < samples.len() {
            let mut g = self.lock();
            while g.queue.len() >= self.max_buffered_samples && !g.done {
                g = self.cv.wait(g).unwrap_or_else(|e| e.into_inner());
            }
            if g.done {
                return;
            }
            let room = self.max_buffered_samples - g.queue.len();
            let end = (offset + room).min(samples.len());
            g.queue.extend(&samples[offset..end]);
            offset = end;
            drop(g);
            self.cv.notify_all();
        }
    }

    /// Pop interleaved frames. Returns `None` when nothing can satisfy the strategy.
    pub fn pop(&self, strategy: PopStrategy) -> Option<Vec<f32>> {
        let mut g = self.lock();
        let take_frames = match strategy {
            PopStrategy::BlockingExact { frames } => {
                let want = frames * self.channels;
                while g.queue.len() < want && !g.done {
                    g = self.cv.wait(g).unwrap_or_else(|e| e.into_inner());
                }
                if g.queue.len() < want {
                    return None;
                }
                frames
            }
            PopStrategy::BlockingUpTo { max_frames } => {
                while g.queue.is_empty() && !g.done {
                    g = self.cv.wait(g).unwrap_or_else(|e| e.into_inner());
                }
                (g.queue.len() / self.channels).min(max_frames)
            }
            PopStrategy::NonBlocking { max_frames } => {
                (g.queue.len() / self.channels).min(max_frames)
            }
        };
        if take_frames == 0 {
            return None;
        }
        let out: Vec<f32> = g.queue.drain(..take_frames * self.channels).collect();
        drop(g);
        self.cv.notify_all();
        Some(out)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SharedInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Block until `q` is closed and drained (`true`) or `cancel` is raised (`false`).
pub fn wait_until_done_and_empty_or_cancel(q: &Arc<SharedAudio>, cancel: &Arc<AtomicBool>) -> bool {
    let mut g = q.lock();
    loop {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        if g.done && g.queue.is_empty() {
            return true;
        }
        let (next, _timeout) = q
            .cv
            .wait_timeout(g, Duration::from_millis(50))
            .unwrap_or_else(|e| e.into_inner());
        g = next;
    }
}
