//! `bookmark-player`: play one audio asset with a single bookmark.
//!
//! Keys:
//! - p: play, Space: pause, r: rewind
//! - b: set bookmark, g: play from bookmark
//! - ←/→: scrub, Enter: commit scrub
//! - l: logs, q/Esc/Ctrl-C: quit

mod cli;
mod logs;
mod ui;

use anyhow::Result;
use bookmark_player::device;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

fn main() -> Result<()> {
    let args = cli::Args::parse();

    if args.list_devices {
        let host = cpal::default_host();
        device::list_devices(&host)?;
        return Ok(());
    }

    let (log_tx, log_rx) = crossbeam_channel::unbounded();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,bookmark_player=info,bookmark_tui=info")
        }))
        .with(logs::LogLayer::new(log_tx))
        .init();

    ui::run_tui(args, log_rx)
}
