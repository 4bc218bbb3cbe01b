//! Asset probing and streaming decode.
//!
//! Uses Symphonia to:
//! - probe the asset once at load time (duration, rate, channels, codec)
//! - decode from a seek offset into interleaved `f32` on a background thread

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{CodecParameters, DecoderOptions};
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;

use crate::error::LoadError;
use crate::queue::{SharedAudio, calc_max_buffered_samples};

/// What the player needs to know about the asset before any playback.
#[derive(Clone, Debug)]
pub struct AssetInfo {
    pub path: PathBuf,
    /// Total length in seconds; always `> 0`.
    pub duration_secs: f64,
    pub sample_rate: u32,
    pub channels: usize,
    /// Codec label (best-effort).
    pub codec: Option<String>,
}

/// Probe `path` and resolve its duration.
///
/// When the container does not carry a frame count, packet durations are summed instead.
pub fn probe_asset(path: &Path) -> Result<AssetInfo, LoadError> {
    if !path.exists() {
        return Err(LoadError::Missing(path.to_path_buf()));
    }
    let mut format = open_format(path)?;

    let track = format
        .default_track()
        .ok_or_else(|| LoadError::NoAudioTrack(path.to_path_buf()))?;
    let params = track.codec_params.clone();
    let track_id = track.id;

    let (Some(sample_rate), Some(channels)) = (params.sample_rate, params.channels) else {
        return Err(LoadError::NoAudioTrack(path.to_path_buf()));
    };

    let duration_secs = match duration_secs_from_codec_params(&params) {
        Some(secs) => secs,
        None => scan_duration_secs(format.as_mut(), track_id, &params),
    };
    if !(duration_secs > 0.0) {
        return Err(LoadError::NoDuration(path.to_path_buf()));
    }

    Ok(AssetInfo {
        path: path.to_path_buf(),
        duration_secs,
        sample_rate,
        channels: channels.count(),
        codec: codec_name_from_params(&params),
    })
}

/// Start a background decoder thread streaming interleaved `f32` from `path`, beginning at
/// `seek_ms` when set.
///
/// Fails if the requested seek fails. The returned queue is closed on EOF or decode error.
pub fn start_streaming_decode_at(
    path: &Path,
    buffer_seconds: f32,
    seek_ms: Option<u64>,
) -> Result<(SignalSpec, Arc<SharedAudio>)> {
    let mut format = open_format(path).with_context(|| format!("open {:?}", path))?;

    let skip_frames = match seek_ms.filter(|ms| *ms > 0) {
        Some(ms) => seek_format(format.as_mut(), ms)?,
        None => 0,
    };

    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("No default audio track"))?;
    let codec_params = track.codec_params.clone();
    let track_id = track.id;

    let rate = codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("Unknown sample rate"))?;
    let layout = codec_params
        .channels
        .ok_or_else(|| anyhow!("Unknown channels"))?;
    let spec = SignalSpec::new(rate, layout);
    let channels = layout.count();

    let max_buffered_samples = calc_max_buffered_samples(rate, channels, buffer_seconds);
    let shared = Arc::new(SharedAudio::new(channels, max_buffered_samples));

    let shared_for_thread = shared.clone();
    thread::spawn(move || {
        if let Err(e) = decode_format_loop(
            format,
            track_id,
            &codec_params,
            skip_frames,
            &shared_for_thread,
        ) {
            tracing::error!("decoder thread error: {e:#}");
        }
        shared_for_thread.close();
    });

    Ok((spec, shared))
}

/// Position `format` at `ms`. Callers report playback position relative to `ms`, so a
/// failed seek must not fall back to decoding from the start.
///
/// Returns how many decoded frames precede `ms` and must be dropped.
fn seek_format(format: &mut dyn FormatReader, ms: u64) -> Result<u64> {
    let time = Time::new(ms / 1000, (ms % 1000) as f64 / 1000.0);
    let seeked = format
        .seek(
            SeekMode::Accurate,
            SeekTo::Time {
                time,
                track_id: None,
            },
        )
        .with_context(|| format!("seek to {ms} ms"))?;
    tracing::debug!(
        seek_ms = ms,
        actual_ts = seeked.actual_ts,
        required_ts = seeked.required_ts,
        "decoder seeked"
    );
    Ok(seeked.required_ts.saturating_sub(seeked.actual_ts))
}

fn open_format(path: &Path) -> Result<Box<dyn FormatReader>, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|source| LoadError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(probed.format)
}

/// Decode packets of `track_id` and push interleaved samples into `shared` until EOF or the
/// queue is closed by a cancelled session. The first `skip_frames` frames are dropped.
fn decode_format_loop(
    mut format: Box<dyn FormatReader>,
    track_id: u32,
    codec_params: &CodecParameters,
    mut skip_frames: u64,
    shared: &Arc<SharedAudio>,
) -> Result<()> {
    let mut decoder =
        symphonia::default::get_codecs().make(codec_params, &DecoderOptions::default())?;

    loop {
        if shared.is_done() {
            break;
        }
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(_) => break, // EOF
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(e) => {
                tracing::debug!("skipping undecodable packet: {e}");
                continue;
            }
        };

        let frames = decoded.frames() as u64;
        if skip_frames >= frames {
            skip_frames -= frames;
            continue;
        }
        let channels = decoded.spec().channels.count();
        let mut sample_buf = SampleBuffer::<f32>::new(frames, *decoded.spec());
        sample_buf.copy_interleaved_ref(decoded);
        let offset = skip_frames as usize * channels;
        skip_frames = 0;
        shared.push_interleaved_blocking(&sample_buf.samples()[offset..]);
    }

    Ok(())
}

/// Duration from container metadata, if it carries a frame count.
fn duration_secs_from_codec_params(params: &CodecParameters) -> Option<f64> {
    let frames = params.n_frames?;
    let rate = params.sample_rate?;
    if rate == 0 || frames == 0 {
        return None;
    }
    Some(frames as f64 / rate as f64)
}

/// Sum packet durations of `track_id` without decoding audio.
fn scan_duration_secs(format: &mut dyn FormatReader, track_id: u32, params: &CodecParameters) -> f64 {
    let mut total_ts: u64 = 0;
    while let Ok(packet) = format.next_packet() {
        if packet.track_id() == track_id {
            total_ts = total_ts.saturating_add(packet.dur());
        }
    }
    match (params.time_base, params.sample_rate) {
        (Some(tb), _) => {
            let time = tb.calc_time(total_ts);
            time.seconds as f64 + time.frac
        }
        (None, Some(rate)) if rate > 0 => total_ts as f64 / rate as f64,
        _ => 0.0,
    }
}

/// Best-effort codec label for display.
fn codec_name_from_params(params: &CodecParameters) -> Option<String> {
    use symphonia::core::codecs::*;
    let name = match params.codec {
        CODEC_TYPE_FLAC => "FLAC",
        CODEC_TYPE_MP3 => "MP3",
        CODEC_TYPE_AAC => "AAC",
        CODEC_TYPE_ALAC => "ALAC",
        CODEC_TYPE_VORBIS => "VORBIS",
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM_S16",
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM_S24",
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => "PCM_F32",
        _ => return None,
    };
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::PopStrategy;
    use crate::test_wav::write_pcm16;
    use symphonia::core::codecs::*;

    #[test]
    fn duration_from_params_requires_rate_and_frames() {
        let mut params = CodecParameters::new();
        params.sample_rate = Some(0);
        params.n_frames = Some(100);
        assert!(duration_secs_from_codec_params(&params).is_none());

        params.sample_rate = Some(48_000);
        params.n_frames = None;
        assert!(duration_secs_from_codec_params(&params).is_none());
    }

    #[test]
    fn duration_from_params_computes_seconds() {
        let mut params = CodecParameters::new();
        params.sample_rate = Some(44_100);
        params.n_frames = Some(441_000);
        assert_eq!(duration_secs_from_codec_params(&params), Some(10.0));
    }

    #[test]
    fn codec_name_maps_mp3_and_unknown() {
        let mut params = CodecParameters::new();
        assert!(codec_name_from_params(&params).is_none());
        params.codec = CODEC_TYPE_MP3;
        assert_eq!(codec_name_from_params(&params).as_deref(), Some("MP3"));
    }

    fn drain_frames(q: &SharedAudio) -> usize {
        let mut samples = 0;
        while let Some(block) = q.pop(PopStrategy::BlockingUpTo { max_frames: 1024 }) {
            samples += block.len();
        }
        samples / q.channels()
    }

    #[test]
    fn wav_asset_reports_format_and_duration() {
        let path = write_pcm16("info", 8_000, 2, 4_000);
        let info = probe_asset(&path);
        let _ = std::fs::remove_file(&path);

        let info = info.unwrap();
        assert_eq!(info.sample_rate, 8_000);
        assert_eq!(info.channels, 2);
        assert_eq!(info.codec.as_deref(), Some("PCM_S16"));
        assert!((info.duration_secs - 0.5).abs() < 1e-9, "{}", info.duration_secs);
    }

    #[test]
    fn packet_scan_matches_header_duration() {
        let path = write_pcm16("scan", 8_000, 1, 6_000);
        let mut format = open_format(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        let track = format.default_track().unwrap();
        let params = track.codec_params.clone();
        let track_id = track.id;
        let scanned = scan_duration_secs(format.as_mut(), track_id, &params);
        assert!((scanned - 0.75).abs() < 1e-3, "{scanned}");
    }

    #[test]
    fn streaming_decode_starts_at_seek_offset() {
        let path = write_pcm16("seek", 8_000, 1, 8_000);
        let started = start_streaming_decode_at(&path, 1.0, Some(250));
        let (spec, q) = started.unwrap();
        let frames = drain_frames(&q);
        let _ = std::fs::remove_file(&path);

        assert_eq!(spec.rate, 8_000);
        assert_eq!(frames, 6_000);
    }

    #[test]
    fn streaming_decode_without_seek_yields_every_frame() {
        let path = write_pcm16("full", 8_000, 2, 2_000);
        let (_spec, q) = start_streaming_decode_at(&path, 1.0, None).unwrap();
        let frames = drain_frames(&q);
        let _ = std::fs::remove_file(&path);
        assert_eq!(frames, 2_000);
    }

    #[test]
    fn failed_seek_is_an_error() {
        let path = write_pcm16("seek-past-end", 8_000, 1, 8_000);
        let result = start_streaming_decode_at(&path, 1.0, Some(10_000));
        let _ = std::fs::remove_file(&path);
        assert!(result.is_err());
    }

    #[test]
    fn missing_file_reports_missing() {
        let path = std::env::temp_dir().join("bookmark-player-does-not-exist.mp3");
        match probe_asset(&path) {
            Err(LoadError::Missing(p)) => assert_eq!(p, path),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn garbage_file_reports_decode_error() {
        let path = std::env::temp_dir().join(format!(
            "bookmark-player-garbage-{}.mp3",
            std::process::id()
        ));
        std::fs::write(&path, b"definitely not audio").unwrap();
        let result = probe_asset(&path);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(LoadError::Decode { .. })), "{result:?}");
    }
}
