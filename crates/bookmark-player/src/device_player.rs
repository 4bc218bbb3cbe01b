//! [`AudioSource`] backed by the output device.
//!
//! Every play or reposition starts a playback session: a thread that decodes from the
//! requested offset and drives one output stream until the asset ends or the session is
//! cancelled. Pause and resume flip the session's paused flag and keep the stream alive.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::JoinHandle;

use anyhow::{Context, Result};

use crate::config::PlaybackConfig;
use crate::decode::{self, AssetInfo};
use crate::device;
use crate::error::LoadError;
use crate::pipeline::{self, SessionFlags};
use crate::source::{AudioSource, clamp_secs};

pub struct DevicePlayer {
    asset: AssetInfo,
    device: Option<String>,
    playback: PlaybackConfig,
    /// Position while no session is running.
    position_secs: f64,
    session: Option<SessionHandle>,
}

struct SessionHandle {
    start_secs: f64,
    flags: SessionFlags,
    /// Stream sample rate, 0 until the device is opened.
    output_rate: Arc<AtomicU32>,
    /// Set when the session thread exits for any reason.
    finished: Arc<AtomicBool>,
    /// Set when the asset played through to its end.
    ended: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl SessionHandle {
    fn position_secs(&self, duration_secs: f64) -> f64 {
        if self.ended.load(Ordering::Relaxed) {
            return duration_secs;
        }
        session_position(
            self.start_secs,
            self.flags.played_frames.load(Ordering::Relaxed),
            self.output_rate.load(Ordering::Relaxed),
            duration_secs,
        )
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::Relaxed)
    }
}

impl DevicePlayer {
    /// Probe the asset at `path`. No audio device is touched until the first play.
    pub fn open(
        path: &Path,
        device: Option<String>,
        playback: PlaybackConfig,
    ) -> Result<Self, LoadError> {
        let asset = decode::probe_asset(path)?;
        tracing::info!(
            path = %asset.path.display(),
            duration_secs = asset.duration_secs,
            sample_rate = asset.sample_rate,
            channels = asset.channels,
            codec = asset.codec.as_deref().unwrap_or("unknown"),
            "asset loaded"
        );
        Ok(Self {
            asset,
            device,
            playback,
            position_secs: 0.0,
            session: None,
        })
    }

    fn start_session(&mut self, start_secs: f64) {
        self.cancel_session_async();

        let flags = SessionFlags::new(false);
        let output_rate = Arc::new(AtomicU32::new(0));
        let finished = Arc::new(AtomicBool::new(false));
        let ended = Arc::new(AtomicBool::new(false));

        let path = self.asset.path.clone();
        let needle = self.device.clone();
        let playback = self.playback.clone();
        let flags_for_thread = flags.clone();
        let rate_for_thread = output_rate.clone();
        let finished_for_thread = finished.clone();
        let ended_for_thread = ended.clone();

        tracing::debug!(start_secs, "playback session start");
        let join = std::thread::spawn(move || {
            match run_session(
                path,
                needle,
                playback,
                start_secs,
                &flags_for_thread,
                &rate_for_thread,
            ) {
                Ok(true) => {
                    tracing::info!("playback reached end of asset");
                    ended_for_thread.store(true, Ordering::Relaxed);
                }
                Ok(false) => tracing::debug!("playback session cancelled"),
                Err(e) => tracing::warn!("playback session error: {e:#}"),
            }
            let underruns = flags_for_thread.underrun_events.load(Ordering::Relaxed);
            if underruns > 0 {
                tracing::warn!(underruns, "output ran dry during session");
            }
            finished_for_thread.store(true, Ordering::Relaxed);
        });

        self.session = Some(SessionHandle {
            start_secs,
            flags,
            output_rate,
            finished,
            ended,
            join,
        });
    }

    /// Cancel the current session and join its thread.
    fn cancel_session(&mut self) {
        if let Some(sess) = self.session.take() {
            sess.flags.cancel.store(true, Ordering::Relaxed);
            let _ = sess.join.join();
        }
    }

    /// Cancel the current session without blocking the caller.
    fn cancel_session_async(&mut self) {
        if let Some(sess) = self.session.take() {
            sess.flags.cancel.store(true, Ordering::Relaxed);
            std::thread::spawn(move || {
                let _ = sess.join.join();
            });
        }
    }
}

impl AudioSource for DevicePlayer {
    fn duration_secs(&self) -> f64 {
        self.asset.duration_secs
    }

    fn current_time(&self) -> f64 {
        match &self.session {
            Some(sess) => sess.position_secs(self.asset.duration_secs),
            None => self.position_secs,
        }
    }

    fn set_current_time(&mut self, secs: f64) {
        let target = clamp_secs(secs, self.asset.duration_secs);
        let was_playing = self.is_playing();
        self.cancel_session_async();
        self.position_secs = target;
        if was_playing && target < self.asset.duration_secs {
            self.start_session(target);
        }
    }

    fn play(&mut self) {
        if let Some(sess) = &self.session {
            if !sess.is_finished() {
                if sess.is_paused() {
                    sess.flags.paused.store(false, Ordering::Relaxed);
                    tracing::debug!("playback resumed");
                }
                return;
            }
            self.position_secs = sess.position_secs(self.asset.duration_secs);
            self.session = None;
        }
        if self.position_secs >= self.asset.duration_secs {
            return;
        }
        self.start_session(self.position_secs);
    }

    fn pause(&mut self) {
        if let Some(sess) = &self.session {
            self.position_secs = sess.position_secs(self.asset.duration_secs);
            if !sess.is_finished() {
                sess.flags.paused.store(true, Ordering::Relaxed);
                tracing::debug!(position_secs = self.position_secs, "playback paused");
            }
        }
    }

    fn is_playing(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| !s.is_finished() && !s.is_paused())
            .unwrap_or(false)
    }
}

impl Drop for DevicePlayer {
    fn drop(&mut self) {
        self.cancel_session();
    }
}

/// Decode from `start_secs` and play until drained (`Ok(true)`) or cancelled (`Ok(false)`).
fn run_session(
    path: PathBuf,
    needle: Option<String>,
    playback: PlaybackConfig,
    start_secs: f64,
    flags: &SessionFlags,
    output_rate: &AtomicU32,
) -> Result<bool> {
    let seek_ms = seek_ms_for(start_secs);
    let playback_eff = if seek_ms.is_some() {
        playback.for_seek()
    } else {
        playback
    };

    let (src_spec, srcq) =
        decode::start_streaming_decode_at(&path, playback_eff.buffer_seconds, seek_ms)
            .context("start decode")?;

    let host = cpal::default_host();
    let opened = device::pick_device(&host, needle.as_deref()).and_then(|device| {
        let config = device::pick_output_config(&device, Some(src_spec.rate))?;
        Ok((device, config))
    });
    let (device, config) = match opened {
        Ok(v) => v,
        Err(e) => {
            srcq.close();
            return Err(e);
        }
    };

    let mut stream_config: cpal::StreamConfig = config.clone().into();
    if let Some(buf) = device::pick_buffer_size(&config) {
        stream_config.buffer_size = buf;
    }
    output_rate.store(stream_config.sample_rate, Ordering::Relaxed);

    pipeline::play_decoded_source(
        &device,
        &config,
        &stream_config,
        &playback_eff,
        src_spec,
        srcq,
        flags,
    )
}

/// Decoder seek target; `None` for a session starting at the top.
fn seek_ms_for(start_secs: f64) -> Option<u64> {
    let ms = (start_secs * 1000.0).round();
    (ms >= 1.0).then_some(ms as u64)
}

/// Session position from the frames the device has played so far.
fn session_position(start_secs: f64, played_frames: u64, output_rate: u32, duration_secs: f64) -> f64 {
    if output_rate == 0 {
        return start_secs;
    }
    (start_secs + played_frames as f64 / output_rate as f64).min(duration_secs)
}
