//! Playback controller: play/pause/rewind, one bookmark, and scrub-aware progress.
//!
//! The controller owns exactly one [`AudioSource`] and one [`RefreshTimer`]. Commands and
//! ticks are applied synchronously by whoever owns the controller; the timer only delivers
//! [`Tick`] messages that are fed back through [`PlaybackController::on_timer`].
//!
//! `is_playing` and `is_scrubbing` are independent flags. Scrubbing freezes the displayed
//! progress but never pauses playback.

use std::fmt::Display;
use std::time::Duration;

use crate::config::ControllerConfig;
use crate::source::{AudioSource, clamp_secs};
use crate::status::{ControllerStatus, transport_for};
use crate::ticker::{RefreshTimer, Tick};

pub struct PlaybackController<S: AudioSource, T: RefreshTimer> {
    /// `None` after a failed load; every command is then a no-op.
    source: Option<S>,
    timer: T,
    tick_interval: Duration,
    is_playing: bool,
    is_scrubbing: bool,
    bookmark_secs: f64,
    progress: f64,
}

impl<S: AudioSource, T: RefreshTimer> PlaybackController<S, T> {
    pub fn new(source: S, timer: T, config: ControllerConfig) -> Self {
        tracing::info!(duration_secs = source.duration_secs(), "audio source ready");
        Self::build(Some(source), timer, config)
    }

    /// Build a controller from the outcome of loading the asset.
    ///
    /// A load error is logged once here and leaves the controller permanently unable to play.
    pub fn from_load<E: Display>(loaded: Result<S, E>, timer: T, config: ControllerConfig) -> Self {
        match loaded {
            Ok(source) => Self::new(source, timer, config),
            Err(e) => {
                tracing::error!("audio source initialization failed: {e:#}");
                Self::build(None, timer, config)
            }
        }
    }

    fn build(source: Option<S>, timer: T, config: ControllerConfig) -> Self {
        Self {
            source,
            timer,
            tick_interval: config.tick_interval,
            is_playing: false,
            is_scrubbing: false,
            bookmark_secs: 0.0,
            progress: 0.0,
        }
    }

    pub fn play(&mut self) {
        let Some(source) = self.source.as_mut() else {
            return;
        };
        if source.is_playing() {
            return;
        }
        // A finished asset starts over.
        if source.current_time() >= source.duration_secs() {
            source.set_current_time(0.0);
        }
        source.play();
        self.is_playing = true;
        self.timer.start(self.tick_interval);
        tracing::info!(at_secs = source.current_time(), "play");
    }

    /// Stop advancing. The source keeps its position for resume; the bookmark is untouched.
    pub fn pause(&mut self) {
        let Some(source) = self.source.as_mut() else {
            return;
        };
        if !self.is_playing {
            return;
        }
        source.pause();
        self.is_playing = false;
        self.timer.cancel();
        tracing::info!(at_secs = source.current_time(), "pause");
    }

    pub fn rewind(&mut self) {
        let Some(source) = self.source.as_mut() else {
            return;
        };
        source.set_current_time(0.0);
        self.progress = 0.0;
        if self.is_playing {
            source.play();
        } else {
            self.refresh_progress();
        }
        tracing::info!(playing = self.is_playing, "rewind");
    }

    pub fn set_bookmark(&mut self) {
        let Some(source) = self.source.as_ref() else {
            return;
        };
        self.bookmark_secs = clamp_secs(source.current_time(), source.duration_secs());
        tracing::info!(bookmark_secs = self.bookmark_secs, "bookmark set");
    }

    pub fn play_from_bookmark(&mut self) {
        let Some(source) = self.source.as_mut() else {
            return;
        };
        source.set_current_time(self.bookmark_secs);
        source.play();
        self.is_playing = true;
        self.timer.start(self.tick_interval);
        if !self.is_scrubbing {
            self.refresh_progress();
        }
        tracing::info!(bookmark_secs = self.bookmark_secs, "play from bookmark");
    }

    pub fn begin_scrub(&mut self, value: f64) {
        if self.source.is_none() {
            return;
        }
        let Some(value) = normalized(value) else {
            return;
        };
        self.is_scrubbing = true;
        self.progress = value;
        tracing::debug!(value, "scrub started");
    }

    /// Move the displayed position only; the source is repositioned by [`Self::end_scrub`].
    pub fn update_scrub(&mut self, value: f64) {
        if self.source.is_none() || !self.is_scrubbing {
            return;
        }
        if let Some(value) = normalized(value) {
            self.progress = value;
        }
    }

    pub fn end_scrub(&mut self, value: f64) {
        let Some(source) = self.source.as_mut() else {
            return;
        };
        let Some(value) = normalized(value) else {
            return;
        };
        let new_time = value * source.duration_secs();
        source.set_current_time(new_time);
        self.is_scrubbing = false;
        self.progress = value;
        if self.is_playing {
            source.play();
        }
        tracing::info!(to_secs = new_time, playing = self.is_playing, "seek");
    }

    /// Drop an open scrub without seeking; progress follows the source again.
    pub fn cancel_scrub(&mut self) {
        if self.source.is_none() || !self.is_scrubbing {
            return;
        }
        self.is_scrubbing = false;
        self.refresh_progress();
        tracing::debug!("scrub cancelled");
    }

    /// Refresh progress from the source. Ignored while scrubbing.
    pub fn tick(&mut self) {
        if self.is_scrubbing {
            return;
        }
        let finished = match self.source.as_ref() {
            Some(source) => self.is_playing && !source.is_playing(),
            None => return,
        };
        self.refresh_progress();
        if finished {
            self.is_playing = false;
            self.timer.cancel();
            tracing::info!("playback reached end of asset");
        }
    }

    /// Apply a tick from the refresh task, dropping ticks from a superseded task.
    pub fn on_timer(&mut self, tick: Tick) {
        if self.timer.accepts(tick) {
            self.tick();
        } else {
            tracing::trace!(generation = tick.generation, "stale tick dropped");
        }
    }

    /// Cancel the periodic refresh and silence the source.
    pub fn shutdown(&mut self) {
        self.timer.cancel();
        if let Some(source) = self.source.as_mut() {
            source.pause();
        }
        self.is_playing = false;
    }

    pub fn is_loaded(&self) -> bool {
        self.source.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn is_scrubbing(&self) -> bool {
        self.is_scrubbing
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn bookmark_secs(&self) -> f64 {
        self.bookmark_secs
    }

    pub fn current_secs(&self) -> f64 {
        self.source.as_ref().map_or(0.0, |s| s.current_time())
    }

    pub fn duration_secs(&self) -> f64 {
        self.source.as_ref().map_or(0.0, |s| s.duration_secs())
    }

    pub fn status(&self) -> ControllerStatus {
        let Some(source) = self.source.as_ref() else {
            return ControllerStatus::unloaded(self.progress);
        };
        let current_secs = source.current_time();
        ControllerStatus {
            loaded: true,
            transport: transport_for(self.is_playing, current_secs),
            scrubbing: self.is_scrubbing,
            progress: self.progress,
            current_secs,
            duration_secs: source.duration_secs(),
            bookmark_secs: self.bookmark_secs,
        }
    }

    fn refresh_progress(&mut self) {
        if let Some(source) = self.source.as_ref() {
            let ratio = source.current_time() / source.duration_secs();
            self.progress = if ratio.is_finite() {
                ratio.clamp(0.0, 1.0)
            } else {
                0.0
            };
        }
    }
}

impl<S: AudioSource, T: RefreshTimer> Drop for PlaybackController<S, T> {
    fn drop(&mut self) {
        self.timer.cancel();
    }
}

fn normalized(value: f64) -> Option<f64> {
    value.is_finite().then(|| value.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use crate::source::{ManualClock, SimulatedSource};
    use std::cell::RefCell;
    use std::rc::Rc;

    const EPS: f64 = 1e-9;

    #[derive(Debug, Default)]
    struct TimerLog {
        running: bool,
        generation: u64,
        starts: usize,
        cancels: usize,
    }

    /// Records timer calls; ticks are injected by the test.
    #[derive(Clone, Default)]
    struct RecordingTimer(Rc<RefCell<TimerLog>>);

    impl RefreshTimer for RecordingTimer {
        fn start(&mut self, _interval: Duration) {
            let mut log = self.0.borrow_mut();
            log.running = true;
            log.generation += 1;
            log.starts += 1;
        }

        fn cancel(&mut self) {
            let mut log = self.0.borrow_mut();
            if log.running {
                log.cancels += 1;
            }
            log.running = false;
        }

        fn is_running(&self) -> bool {
            self.0.borrow().running
        }

        fn accepts(&self, tick: Tick) -> bool {
            let log = self.0.borrow();
            log.running && log.generation == tick.generation
        }
    }

    type Controller = PlaybackController<SimulatedSource<ManualClock>, RecordingTimer>;

    fn controller(duration: f64) -> (ManualClock, RecordingTimer, Controller) {
        let clock = ManualClock::new();
        let timer = RecordingTimer::default();
        let source = SimulatedSource::new(clock.clone(), duration).unwrap();
        let ctl = PlaybackController::new(source, timer.clone(), ControllerConfig::default());
        (clock, timer, ctl)
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn bookmark_scenario() {
        let (clock, _timer, mut ctl) = controller(100.0);
        ctl.play();
        clock.advance(secs(10));
        ctl.set_bookmark();
        assert_eq!(ctl.bookmark_secs(), 10.0);

        ctl.rewind();
        assert_eq!(ctl.progress(), 0.0);

        ctl.play_from_bookmark();
        assert_eq!(ctl.current_secs(), 10.0);
        assert!(ctl.is_playing());
    }

    #[test]
    fn scrub_scenario_pins_progress_against_ticks() {
        let (clock, timer, mut ctl) = controller(100.0);
        ctl.play();
        ctl.begin_scrub(ctl.progress());
        for _ in 0..3 {
            ctl.update_scrub(0.5);
            clock.advance(secs(1));
            ctl.tick();
            let generation = timer.0.borrow().generation;
            ctl.on_timer(Tick { generation });
            assert_eq!(ctl.progress(), 0.5);
        }
        ctl.end_scrub(0.5);
        assert_eq!(ctl.current_secs(), 50.0);
        assert!(!ctl.is_scrubbing());
        assert!(ctl.is_playing());
    }

    #[test]
    fn end_scrub_then_tick_keeps_value() {
        for i in 0..=20 {
            let v = i as f64 / 20.0;
            let (_clock, _timer, mut ctl) = controller(100.0);
            ctl.play();
            ctl.begin_scrub(0.0);
            ctl.end_scrub(v);
            ctl.tick();
            assert!((ctl.progress() - v).abs() < EPS, "v={v} got {}", ctl.progress());
        }
    }

    #[test]
    fn end_scrub_while_paused_only_moves_position() {
        let (clock, _timer, mut ctl) = controller(100.0);
        ctl.begin_scrub(0.0);
        ctl.end_scrub(0.25);
        clock.advance(secs(5));
        ctl.tick();
        assert!(!ctl.is_playing());
        assert_eq!(ctl.current_secs(), 25.0);
        assert_eq!(ctl.progress(), 0.25);
    }

    #[test]
    fn end_scrub_while_playing_continues_from_target() {
        let (clock, _timer, mut ctl) = controller(100.0);
        ctl.play();
        clock.advance(secs(5));
        ctl.begin_scrub(0.05);
        ctl.end_scrub(0.6);
        clock.advance(secs(2));
        assert_eq!(ctl.current_secs(), 62.0);
    }

    #[test]
    fn bookmark_survives_rewinds() {
        let (clock, _timer, mut ctl) = controller(100.0);
        ctl.play();
        clock.advance(secs(30));
        ctl.set_bookmark();
        ctl.rewind();
        clock.advance(secs(4));
        ctl.rewind();
        ctl.play_from_bookmark();
        assert_eq!(ctl.current_secs(), 30.0);
        assert_eq!(ctl.progress(), 0.3);
    }

    #[test]
    fn rewind_zeroes_progress_in_any_state() {
        let (clock, _timer, mut ctl) = controller(100.0);
        ctl.play();
        clock.advance(secs(20));
        ctl.tick();
        ctl.rewind();
        assert_eq!(ctl.progress(), 0.0);
        assert!(ctl.is_playing());
        clock.advance(secs(3));
        assert_eq!(ctl.current_secs(), 3.0);

        ctl.pause();
        ctl.tick();
        ctl.rewind();
        assert_eq!(ctl.progress(), 0.0);
        assert!(!ctl.is_playing());
    }

    #[test]
    fn pause_twice_is_idempotent() {
        let (clock, timer, mut ctl) = controller(100.0);
        ctl.play();
        clock.advance(secs(7));
        ctl.pause();
        let first = ctl.status();
        let cancels = timer.0.borrow().cancels;

        ctl.pause();
        assert_eq!(ctl.status(), first);
        assert_eq!(timer.0.borrow().cancels, cancels);
    }

    #[test]
    fn pause_does_not_touch_bookmark() {
        let (clock, _timer, mut ctl) = controller(100.0);
        ctl.play();
        clock.advance(secs(12));
        ctl.pause();
        assert_eq!(ctl.bookmark_secs(), 0.0);

        ctl.play();
        clock.advance(secs(3));
        assert_eq!(ctl.current_secs(), 15.0);
    }

    #[test]
    fn tick_without_play_is_harmless() {
        let (_clock, timer, mut ctl) = controller(100.0);
        ctl.tick();
        assert_eq!(ctl.progress(), 0.0);
        assert!(!timer.is_running());
    }

    #[test]
    fn play_while_playing_is_noop() {
        let (clock, timer, mut ctl) = controller(100.0);
        ctl.play();
        clock.advance(secs(5));
        ctl.play();
        assert_eq!(timer.0.borrow().starts, 1);
        assert_eq!(ctl.current_secs(), 5.0);
    }

    #[test]
    fn refresh_is_never_duplicated() {
        let (_clock, timer, mut ctl) = controller(100.0);
        ctl.play();
        ctl.play_from_bookmark();
        ctl.play_from_bookmark();
        let log = timer.0.borrow();
        assert!(log.running);
        assert_eq!(log.starts, 3);
        assert_eq!(log.generation, 3);
    }

    #[test]
    fn stale_ticks_are_dropped() {
        let (clock, timer, mut ctl) = controller(100.0);
        ctl.play();
        let stale = Tick {
            generation: timer.0.borrow().generation,
        };
        ctl.pause();
        ctl.play();
        clock.advance(secs(10));

        ctl.on_timer(stale);
        assert_eq!(ctl.progress(), 0.0);

        let fresh = Tick {
            generation: timer.0.borrow().generation,
        };
        ctl.on_timer(fresh);
        assert_eq!(ctl.progress(), 0.1);
    }

    #[test]
    fn tick_reconciles_end_of_asset() {
        let (clock, timer, mut ctl) = controller(10.0);
        ctl.play();
        clock.advance(secs(12));
        ctl.tick();
        assert_eq!(ctl.progress(), 1.0);
        assert!(!ctl.is_playing());
        assert!(!timer.is_running());

        ctl.play();
        assert!(ctl.is_playing());
        assert_eq!(ctl.current_secs(), 0.0);
    }

    #[test]
    fn bookmark_is_clamped_to_duration() {
        let (clock, _timer, mut ctl) = controller(10.0);
        ctl.play();
        clock.advance(secs(30));
        ctl.set_bookmark();
        assert_eq!(ctl.bookmark_secs(), 10.0);
    }

    #[test]
    fn scrub_values_are_clamped_and_nan_ignored() {
        let (_clock, _timer, mut ctl) = controller(100.0);
        ctl.begin_scrub(1.7);
        assert_eq!(ctl.progress(), 1.0);
        ctl.update_scrub(-0.4);
        assert_eq!(ctl.progress(), 0.0);
        ctl.update_scrub(f64::NAN);
        assert_eq!(ctl.progress(), 0.0);
        ctl.end_scrub(f64::NAN);
        assert!(ctl.is_scrubbing());
        ctl.end_scrub(0.4);
        assert_eq!(ctl.current_secs(), 40.0);
    }

    #[test]
    fn cancel_scrub_keeps_source_position() {
        let (clock, _timer, mut ctl) = controller(100.0);
        ctl.play();
        clock.advance(secs(10));
        ctl.begin_scrub(0.7);
        ctl.cancel_scrub();
        assert!(!ctl.is_scrubbing());
        assert!(ctl.is_playing());
        assert_eq!(ctl.current_secs(), 10.0);
        assert!((ctl.progress() - 0.1).abs() < 1e-9);

        // Without an open scrub there is nothing to drop.
        ctl.cancel_scrub();
        assert!((ctl.progress() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn update_without_begin_is_ignored() {
        let (_clock, _timer, mut ctl) = controller(100.0);
        ctl.update_scrub(0.8);
        assert_eq!(ctl.progress(), 0.0);
    }

    #[test]
    fn load_failure_makes_commands_noops() {
        let timer = RecordingTimer::default();
        let loaded: Result<SimulatedSource<ManualClock>, LoadError> =
            Err(LoadError::Missing("assets/missing.mp3".into()));
        let mut ctl = PlaybackController::from_load(loaded, timer.clone(), ControllerConfig::default());

        ctl.play();
        ctl.set_bookmark();
        ctl.play_from_bookmark();
        ctl.begin_scrub(0.5);
        ctl.end_scrub(0.5);
        ctl.rewind();
        ctl.pause();
        ctl.tick();

        assert!(!ctl.is_loaded());
        assert!(!ctl.is_playing());
        assert!(!ctl.is_scrubbing());
        assert_eq!(ctl.progress(), 0.0);
        assert_eq!(timer.0.borrow().starts, 0);
        assert!(!ctl.status().loaded);
    }

    #[test]
    fn status_reports_combined_state() {
        use crate::status::Transport;

        let (clock, _timer, mut ctl) = controller(100.0);
        assert_eq!(ctl.status().transport, Transport::Idle);

        ctl.play();
        clock.advance(secs(4));
        ctl.begin_scrub(0.9);
        let status = ctl.status();
        assert_eq!(status.transport, Transport::Playing);
        assert!(status.scrubbing);
        assert_eq!(status.display_secs(), 90.0);

        ctl.end_scrub(0.9);
        ctl.pause();
        assert_eq!(ctl.status().transport, Transport::Paused);
    }

    #[test]
    fn shutdown_cancels_refresh() {
        let (_clock, timer, mut ctl) = controller(100.0);
        ctl.play();
        ctl.shutdown();
        assert!(!timer.is_running());
        assert!(!ctl.is_playing());
    }

    #[test]
    fn drop_cancels_refresh() {
        let (_clock, timer, mut ctl) = controller(100.0);
        ctl.play();
        drop(ctl);
        assert!(!timer.is_running());
    }
}
