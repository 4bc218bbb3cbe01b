//! Sample-rate conversion stage.
//!
//! Runs Rubato's async sinc resampler on a background thread between the decode queue and
//! the output queue. Only inserted when the asset rate differs from the device rate.

use std::sync::Arc;
use std::thread;

use anyhow::{Result, anyhow};
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};
use symphonia::core::audio::SignalSpec;

use crate::queue::{PopStrategy, SharedAudio, calc_max_buffered_samples};

#[derive(Clone, Copy, Debug)]
pub struct ResampleConfig {
    /// Input chunk size in frames.
    pub chunk_frames: usize,
    /// Buffering target (seconds) for the output queue.
    pub buffer_seconds: f32,
}

/// Spawn the resampler thread reading `srcq` at `src_spec.rate` and writing `dst_rate` audio to
/// the returned queue, which is closed once `srcq` is closed and drained.
pub fn start_resampler(
    srcq: Arc<SharedAudio>,
    src_spec: SignalSpec,
    dst_rate: u32,
    cfg: ResampleConfig,
) -> Result<Arc<SharedAudio>> {
    let channels = src_spec.channels.count();
    let max_buffered_samples = calc_max_buffered_samples(dst_rate, channels, cfg.buffer_seconds);
    let dstq = Arc::new(SharedAudio::new(channels, max_buffered_samples));

    let ratio = dst_rate as f64 / src_spec.rate as f64;
    let chunk_frames = cfg.chunk_frames.max(1);

    let sinc_len = 128;
    let window = WindowFunction::BlackmanHarris2;
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: calculate_cutoff(sinc_len, window),
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window,
    };

    let dstq_thread = dstq.clone();
    thread::spawn(move || {
        let mut resampler =
            match Async::<f32>::new_sinc(ratio, 1.1, &params, chunk_frames, channels, FixedAsync::Input) {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!("resampler init error: {e:#}");
                    dstq_thread.close();
                    return;
                }
            };

        let mut out = vec![0.0f32; channels * chunk_frames * 3];

        while let Some(block) = srcq.pop(PopStrategy::BlockingExact { frames: chunk_frames }) {
            if let Err(e) = process_block(&mut resampler, &block, channels, None, &mut out, &dstq_thread) {
                tracing::error!("resampler process error: {e:#}");
                break;
            }
        }

        // Whatever is left is shorter than one chunk.
        while let Some(tail) = srcq.pop(PopStrategy::BlockingUpTo { max_frames: chunk_frames }) {
            let frames = tail.len() / channels;
            if frames == 0 {
                continue;
            }
            if let Err(e) = process_block(&mut resampler, &tail, channels, Some(frames), &mut out, &dstq_thread) {
                tracing::error!("resampler tail error: {e:#}");
                break;
            }
        }

        dstq_thread.close();
    });

    Ok(dstq)
}

/// Resample one interleaved block into `out` and push the produced frames to `dstq`.
///
/// `partial_len` marks a short final block.
fn process_block(
    resampler: &mut Async<f32>,
    block: &[f32],
    channels: usize,
    partial_len: Option<usize>,
    out: &mut [f32],
    dstq: &SharedAudio,
) -> Result<()> {
    let in_frames = block.len() / channels;
    let input = InterleavedSlice::new(block, channels, in_frames)
        .map_err(|e| anyhow!("input slice: {e}"))?;

    let out_frames = out.len() / channels;
    let mut output = InterleavedSlice::new_mut(out, channels, out_frames)
        .map_err(|e| anyhow!("output slice: {e}"))?;

    let indexing = Indexing {
        input_offset: 0,
        output_offset: 0,
        active_channels_mask: None,
        partial_len,
    };

    let (_consumed, produced) = resampler
        .process_into_buffer(&input, &mut output, Some(&indexing))
        .map_err(|e| anyhow!("{e}"))?;

    let produced_samples = produced * channels;
    if produced_samples > 0 {
        dstq.push_interleaved_blocking(&out[..produced_samples]);
    }
    Ok(())
}
