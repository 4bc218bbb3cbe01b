//! Ratatui UI loop.
//!
//! The loop owns the playback controller: key presses and refresh ticks are applied to it on
//! this thread only.

mod app;
mod render;

pub(crate) use app::run_tui;
