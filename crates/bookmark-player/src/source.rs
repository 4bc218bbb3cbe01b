//! The audio source seam driven by the controller.
//!
//! [`AudioSource`] is modelled on a platform media player handle: a fixed duration,
//! a settable current time, and play/pause. Two implementations exist:
//! - [`crate::device_player::DevicePlayer`] plays through the output device
//! - [`SimulatedSource`] advances with a [`Clock`] and never touches audio hardware

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::LoadError;

/// A single loaded audio asset that can be started, paused, and repositioned.
pub trait AudioSource {
    /// Total asset length in seconds. Always `> 0`.
    fn duration_secs(&self) -> f64;

    /// Current playback position in seconds, within `[0, duration]`.
    fn current_time(&self) -> f64;

    /// Move the playback position (clamped to `[0, duration]`).
    ///
    /// A playing source keeps playing from the new position.
    fn set_current_time(&mut self, secs: f64);

    /// Start advancing from the current position.
    fn play(&mut self);

    /// Stop advancing; the current position is kept for resume.
    fn pause(&mut self);

    /// Whether the position is currently advancing.
    fn is_playing(&self) -> bool;
}

impl<S: AudioSource + ?Sized> AudioSource for Box<S> {
    fn duration_secs(&self) -> f64 {
        (**self).duration_secs()
    }

    fn current_time(&self) -> f64 {
        (**self).current_time()
    }

    fn set_current_time(&mut self, secs: f64) {
        (**self).set_current_time(secs)
    }

    fn play(&mut self) {
        (**self).play()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn is_playing(&self) -> bool {
        (**self).is_playing()
    }
}

/// Monotonic time source for [`SimulatedSource`].
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// Wall-clock [`Clock`] anchored at construction.
#[derive(Clone, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when [`ManualClock::advance`] is called.
///
/// Clones share the same time, so a test can keep one handle while the source owns another.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        let micros = u64::try_from(by.as_micros()).unwrap_or(u64::MAX);
        self.micros.fetch_add(micros, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::Relaxed))
    }
}

/// An [`AudioSource`] with no audio output; the position follows its clock.
///
/// Reaching the end stops the source at `duration`, like a real player finishing the asset.
/// Playing again from there ends immediately until the position is moved.
#[derive(Debug)]
pub struct SimulatedSource<C: Clock> {
    clock: C,
    duration_secs: f64,
    /// Position at the last state change.
    anchor_secs: f64,
    /// Clock reading when playback last started; `None` while paused.
    started_at: Option<Duration>,
}

impl<C: Clock> SimulatedSource<C> {
    pub fn new(clock: C, duration_secs: f64) -> Result<Self, LoadError> {
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(LoadError::InvalidDuration(duration_secs));
        }
        Ok(Self {
            clock,
            duration_secs,
            anchor_secs: 0.0,
            started_at: None,
        })
    }

    fn position(&self) -> f64 {
        let advanced = match self.started_at {
            Some(start) => self.clock.now().saturating_sub(start).as_secs_f64(),
            None => 0.0,
        };
        (self.anchor_secs + advanced).min(self.duration_secs)
    }
}

impl<C: Clock> AudioSource for SimulatedSource<C> {
    fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    fn current_time(&self) -> f64 {
        self.position()
    }

    fn set_current_time(&mut self, secs: f64) {
        self.anchor_secs = clamp_secs(secs, self.duration_secs);
        if self.started_at.is_some() {
            self.started_at = Some(self.clock.now());
        }
    }

    fn play(&mut self) {
        if self.is_playing() {
            return;
        }
        self.anchor_secs = self.position();
        self.started_at = Some(self.clock.now());
    }

    fn pause(&mut self) {
        self.anchor_secs = self.position();
        self.started_at = None;
    }

    fn is_playing(&self) -> bool {
        self.started_at.is_some() && self.position() < self.duration_secs
    }
}

/// Clamp a requested position into `[0, duration]`; non-finite input maps to 0.
pub(crate) fn clamp_secs(secs: f64, duration_secs: f64) -> f64 {
    if secs.is_finite() {
        secs.clamp(0.0, duration_secs)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(duration: f64) -> (ManualClock, SimulatedSource<ManualClock>) {
        let clock = ManualClock::new();
        let src = SimulatedSource::new(clock.clone(), duration).unwrap();
        (clock, src)
    }

    #[test]
    fn rejects_non_positive_duration() {
        assert!(SimulatedSource::new(ManualClock::new(), 0.0).is_err());
        assert!(SimulatedSource::new(ManualClock::new(), -1.0).is_err());
        assert!(SimulatedSource::new(ManualClock::new(), f64::NAN).is_err());
    }

    #[test]
    fn advances_only_while_playing() {
        let (clock, mut src) = source(100.0);
        clock.advance(Duration::from_secs(5));
        assert_eq!(src.current_time(), 0.0);

        src.play();
        clock.advance(Duration::from_secs(10));
        assert_eq!(src.current_time(), 10.0);

        src.pause();
        clock.advance(Duration::from_secs(10));
        assert_eq!(src.current_time(), 10.0);
        assert!(!src.is_playing());
    }

    #[test]
    fn seek_while_playing_continues_from_target() {
        let (clock, mut src) = source(100.0);
        src.play();
        clock.advance(Duration::from_secs(3));
        src.set_current_time(40.0);
        clock.advance(Duration::from_secs(2));
        assert_eq!(src.current_time(), 42.0);
        assert!(src.is_playing());
    }

    #[test]
    fn seek_is_clamped() {
        let (_clock, mut src) = source(100.0);
        src.set_current_time(250.0);
        assert_eq!(src.current_time(), 100.0);
        src.set_current_time(-3.0);
        assert_eq!(src.current_time(), 0.0);
        src.set_current_time(f64::NAN);
        assert_eq!(src.current_time(), 0.0);
    }

    #[test]
    fn stops_at_end() {
        let (clock, mut src) = source(10.0);
        src.play();
        clock.advance(Duration::from_secs(15));
        assert_eq!(src.current_time(), 10.0);
        assert!(!src.is_playing());

        src.play();
        assert!(!src.is_playing());
        src.set_current_time(0.0);
        src.play();
        assert!(src.is_playing());
    }

    #[test]
    fn boxed_source_delegates() {
        let clock = ManualClock::new();
        let mut boxed: Box<dyn AudioSource> =
            Box::new(SimulatedSource::new(clock.clone(), 20.0).unwrap());
        boxed.play();
        clock.advance(Duration::from_secs(4));
        assert_eq!(boxed.current_time(), 4.0);
        assert_eq!(boxed.duration_secs(), 20.0);
    }
}
