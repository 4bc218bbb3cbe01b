//! CPAL output stream for one playback session.
//!
//! The real-time callback refills a small local buffer from the shared queue without blocking,
//! maps channels, and converts `f32` to the device sample format. While paused it emits
//! silence and leaves the queue untouched, so resuming continues exactly where it stopped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use anyhow::{Result, anyhow};
use cpal::traits::DeviceTrait;

use crate::queue::{PopStrategy, SharedAudio};

/// Shared flags and counters wired into the output callback.
#[derive(Clone, Debug)]
pub struct OutputConfig {
    /// Max frames pulled from the queue per refill.
    pub refill_max_frames: usize,
    pub paused: Arc<AtomicBool>,
    /// Incremented by every frame of real audio written to the device.
    pub played_frames: Arc<AtomicU64>,
    /// Number of callbacks that ran out of audio.
    pub underrun_events: Arc<AtomicU64>,
}

/// Build an output stream playing interleaved `f32` from `dstq`, which must already be at the
/// stream's sample rate.
pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    dstq: &Arc<SharedAudio>,
    cfg: OutputConfig,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, dstq, cfg),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, dstq, cfg),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, dstq, cfg),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, dstq, cfg),
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    dstq: &Arc<SharedAudio>,
    cfg: OutputConfig,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels_out = config.channels as usize;
    let refill_max_frames = cfg.refill_max_frames.max(1);
    let queue = dstq.clone();
    let mut local = LocalBuffer {
        pos: 0,
        src_channels: dstq.channels(),
        src: Vec::new(),
    };

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            let silence = <T as cpal::Sample>::from_sample::<f32>(0.0);
            if cfg.paused.load(Ordering::Relaxed) {
                data.fill(silence);
                return;
            }

            let frames = data.len() / channels_out;
            let mut filled = 0usize;

            for frame in 0..frames {
                if local.exhausted() {
                    match queue.pop(PopStrategy::NonBlocking {
                        max_frames: refill_max_frames,
                    }) {
                        Some(v) => local.refill(v),
                        None => {
                            cfg.underrun_events.fetch_add(1, Ordering::Relaxed);
                            data[frame * channels_out..].fill(silence);
                            break;
                        }
                    }
                }
                for ch in 0..channels_out {
                    data[frame * channels_out + ch] =
                        <T as cpal::Sample>::from_sample::<f32>(local.sample_for(channels_out, ch));
                }
                local.advance();
                filled += 1;
            }

            if filled > 0 {
                cfg.played_frames.fetch_add(filled as u64, Ordering::Relaxed);
            }
        },
        |err| tracing::warn!("stream error: {err}"),
        None,
    )?;

    Ok(stream)
}

/// Samples already taken from the queue, owned by the callback.
struct LocalBuffer {
    pos: usize,
    src_channels: usize,
    src: Vec<f32>,
}

impl LocalBuffer {
    fn exhausted(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn refill(&mut self, samples: Vec<f32>) {
        self.src = samples;
        self.pos = 0;
    }

    fn advance(&mut self) {
        self.pos += self.src_channels;
    }

    /// Output sample for `dst_ch` of the current frame.
    ///
    /// mono→stereo duplicates, stereo→mono averages, anything else clamps to the last
    /// available source channel.
    fn sample_for(&self, dst_channels: usize, dst_ch: usize) -> f32 {
        let get = |ch: usize| -> f32 {
            if ch < self.src_channels {
                self.src.get(self.pos + ch).copied().unwrap_or(0.0)
            } else {
                0.0
            }
        };
        match (self.src_channels, dst_channels) {
            (2, 1) => 0.5 * (get(0) + get(1)),
            (1, _) => get(0),
            _ => get(dst_ch.min(self.src_channels.saturating_sub(1))),
        }
    }
}
