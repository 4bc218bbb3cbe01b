use std::time::Duration;

/// Pipeline tuning parameters shared by decode/resample/output stages.
#[derive(Clone, Debug)]
pub struct PlaybackConfig {
    /// Resampler chunk size in frames.
    pub chunk_frames: usize,
    /// Max frames pulled per output callback refill.
    pub refill_max_frames: usize,
    /// Target buffer duration for queue sizing.
    pub buffer_seconds: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            chunk_frames: 1024,
            refill_max_frames: 4096,
            buffer_seconds: 2.0,
        }
    }
}

impl PlaybackConfig {
    /// Smaller buffers for sessions that start at an offset, so a seek is audible quickly.
    pub fn for_seek(&self) -> Self {
        Self {
            chunk_frames: self.chunk_frames.min(1024),
            refill_max_frames: self.refill_max_frames.min(2048),
            buffer_seconds: self.buffer_seconds.min(1.0),
        }
    }
}

/// Controller-level knobs.
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Interval of the progress refresh task while playing.
    pub tick_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
        }
    }
}
