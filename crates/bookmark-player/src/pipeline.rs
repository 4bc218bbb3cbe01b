//! Session wiring: optional resample stage + output stream, blocking until drained or cancelled.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use cpal::traits::StreamTrait;
use symphonia::core::audio::SignalSpec;

use crate::config::PlaybackConfig;
use crate::output::{self, OutputConfig};
use crate::queue::{self, SharedAudio};
use crate::resample;

/// Shared state of one playback session, observed by the session owner.
#[derive(Clone, Debug)]
pub struct SessionFlags {
    pub paused: Arc<AtomicBool>,
    pub cancel: Arc<AtomicBool>,
    pub played_frames: Arc<AtomicU64>,
    pub underrun_events: Arc<AtomicU64>,
}

impl SessionFlags {
    pub fn new(paused: bool) -> Self {
        Self {
            paused: Arc::new(AtomicBool::new(paused)),
            cancel: Arc::new(AtomicBool::new(false)),
            played_frames: Arc::new(AtomicU64::new(0)),
            underrun_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Play `srcq` through `device` until the queue drains (`Ok(true)`) or `flags.cancel` is
/// raised (`Ok(false)`).
pub fn play_decoded_source(
    device: &cpal::Device,
    config: &cpal::SupportedStreamConfig,
    stream_config: &cpal::StreamConfig,
    playback: &PlaybackConfig,
    src_spec: SignalSpec,
    srcq: Arc<SharedAudio>,
    flags: &SessionFlags,
) -> Result<bool> {
    let dst_rate = stream_config.sample_rate;
    let dstq = if src_spec.rate == dst_rate {
        tracing::debug!(rate_hz = dst_rate, "resample skipped");
        srcq.clone()
    } else {
        tracing::info!(from_hz = src_spec.rate, to_hz = dst_rate, "resampling");
        resample::start_resampler(
            srcq.clone(),
            src_spec,
            dst_rate,
            resample::ResampleConfig {
                chunk_frames: playback.chunk_frames,
                buffer_seconds: playback.buffer_seconds,
            },
        )?
    };

    let stream = output::build_output_stream(
        device,
        stream_config,
        config.sample_format(),
        &dstq,
        OutputConfig {
            refill_max_frames: playback.refill_max_frames,
            paused: flags.paused.clone(),
            played_frames: flags.played_frames.clone(),
            underrun_events: flags.underrun_events.clone(),
        },
    )?;
    stream.play()?;

    let drained = queue::wait_until_done_and_empty_or_cancel(&dstq, &flags.cancel);
    if !drained {
        flags.paused.store(true, Ordering::Relaxed);
        srcq.close();
        dstq.close();
    } else {
        // Let the device play out the last callback buffer.
        thread::sleep(Duration::from_millis(100));
    }

    Ok(drained)
}
