use std::path::PathBuf;
use std::time::Duration;

use bookmark_player::config::{ControllerConfig, PlaybackConfig};
use clap::Parser;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "bookmark-player", version = VERSION)]
pub struct Args {
    /// Audio asset to load at startup
    #[arg(default_value = "assets/Americana.mp3")]
    pub path: PathBuf,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Progress refresh interval while playing (milliseconds)
    #[arg(long, default_value_t = 1000)]
    pub tick_ms: u64,

    /// Resampler input chunk size in frames (higher => more latency, lower => more overhead)
    #[arg(long, default_value_t = 1024)]
    pub chunk_frames: usize,

    /// Playback callback refill cap (frames). Larger reduces lock churn but can add latency.
    #[arg(long, default_value_t = 4096)]
    pub refill_max_frames: usize,

    /// Queue buffer target in seconds (per stage)
    #[arg(long, default_value_t = 2.0)]
    pub buffer_seconds: f32,

    /// Fraction of the asset moved by one scrub key press
    #[arg(long, default_value_t = 0.02)]
    pub scrub_step: f64,

    /// Idle time after the last scrub key press before the scrub is committed (milliseconds)
    #[arg(long, default_value_t = 750)]
    pub scrub_commit_ms: u64,

    /// Skip the audio device and simulate an asset of this many seconds
    #[arg(long, value_name = "SECS")]
    pub simulate: Option<f64>,
}

impl Args {
    pub fn playback_config(&self) -> PlaybackConfig {
        PlaybackConfig {
            chunk_frames: self.chunk_frames,
            refill_max_frames: self.refill_max_frames,
            buffer_seconds: self.buffer_seconds,
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            tick_interval: Duration::from_millis(self.tick_ms.max(1)),
        }
    }

    pub fn scrub_commit_delay(&self) -> Duration {
        Duration::from_millis(self.scrub_commit_ms)
    }
}
