/// Transport position of the controller, independent of scrubbing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transport {
    /// Not playing and positioned at the start.
    Idle,
    Playing,
    /// Not playing at a non-zero position.
    Paused,
}

impl Transport {
    pub fn label(self) -> &'static str {
        match self {
            Transport::Idle => "idle",
            Transport::Playing => "playing",
            Transport::Paused => "paused",
        }
    }
}

/// Snapshot of controller state for display.
///
/// `transport` and `scrubbing` are orthogonal: every transport state can be combined with an
/// active scrub, which only freezes the displayed `progress`.
#[derive(Clone, Debug, PartialEq)]
pub struct ControllerStatus {
    /// `false` when the asset failed to load; every command is then a no-op.
    pub loaded: bool,
    pub transport: Transport,
    pub scrubbing: bool,
    pub progress: f64,
    pub current_secs: f64,
    pub duration_secs: f64,
    pub bookmark_secs: f64,
}

impl ControllerStatus {
    pub(crate) fn unloaded(progress: f64) -> Self {
        Self {
            loaded: false,
            transport: Transport::Idle,
            scrubbing: false,
            progress,
            current_secs: 0.0,
            duration_secs: 0.0,
            bookmark_secs: 0.0,
        }
    }

    /// Position implied by the displayed progress (the scrub target while scrubbing).
    pub fn display_secs(&self) -> f64 {
        if self.scrubbing {
            self.progress * self.duration_secs
        } else {
            self.current_secs
        }
    }
}

/// Map the two controller flags onto a [`Transport`].
pub(crate) fn transport_for(is_playing: bool, current_secs: f64) -> Transport {
    match (is_playing, current_secs > 0.0) {
        (true, _) => Transport::Playing,
        (false, true) => Transport::Paused,
        (false, false) => Transport::Idle,
    }
}
