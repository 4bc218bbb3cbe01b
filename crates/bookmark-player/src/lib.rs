//! Single-asset playback with one bookmark and a normalized progress indicator.
//!
//! [`controller::PlaybackController`] is the only stateful component callers talk to.
//! It drives an [`source::AudioSource`] (a real [`device_player::DevicePlayer`] or a
//! clock-driven [`source::SimulatedSource`]) and owns the periodic progress refresh
//! ([`ticker::RepeatingTask`]).

pub mod config;
pub mod controller;
pub mod decode;
pub mod device;
pub mod device_player;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod queue;
pub mod resample;
pub mod source;
pub mod status;
pub mod ticker;

#[cfg(test)]
mod test_wav;
