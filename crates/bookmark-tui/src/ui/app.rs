use std::collections::VecDeque;
use std::io;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use bookmark_player::controller::PlaybackController;
use bookmark_player::device;
use bookmark_player::device_player::DevicePlayer;
use bookmark_player::error::LoadError;
use bookmark_player::source::{AudioSource, MonotonicClock, SimulatedSource};
use bookmark_player::ticker::{RepeatingTask, Tick};
use crossbeam_channel::Receiver;
use crossterm::{
    event::{self, Event as CEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::cli::Args;

use super::render;

pub(crate) type Controller = PlaybackController<Box<dyn AudioSource>, RepeatingTask>;

/// Load the asset, build the controller, and drive the event loop until quit.
pub(crate) fn run_tui(args: Args, log_rx: Receiver<String>) -> Result<()> {
    let (source, output) = load_source(&args);
    let (timer, tick_rx) = RepeatingTask::with_channel();
    let controller = PlaybackController::from_load(source, timer, args.controller_config());

    let mut app = App::new(
        controller,
        tick_rx,
        args.path.display().to_string(),
        output,
        args.scrub_step,
        args.scrub_commit_delay(),
        log_rx,
    );

    let mut term = init_terminal()?;
    let result = ui_loop(&mut term, &mut app);
    app.controller.shutdown();

    restore_terminal(&mut term)?;
    result
}

/// Open the configured source and describe where its audio goes.
fn load_source(args: &Args) -> (Result<Box<dyn AudioSource>, LoadError>, String) {
    if let Some(secs) = args.simulate {
        let source = SimulatedSource::new(MonotonicClock::new(), secs)
            .map(|s| Box::new(s) as Box<dyn AudioSource>);
        return (source, "simulated".to_string());
    }

    let host = cpal::default_host();
    let output = match device::activate_output(&host, args.device.as_deref()) {
        Ok(name) => name,
        Err(e) => {
            tracing::warn!("audio output unavailable: {e:#}");
            "-".to_string()
        }
    };
    let source = DevicePlayer::open(&args.path, args.device.clone(), args.playback_config())
        .map(|p| Box::new(p) as Box<dyn AudioSource>);
    (source, output)
}

/// In-memory UI state for rendering + interaction.
pub(crate) struct App {
    pub(crate) controller: Controller,
    tick_rx: Receiver<Tick>,
    pub(crate) asset_label: String,
    pub(crate) output_label: String,
    /// Last user-visible action.
    pub(crate) status: String,
    scrub_step: f64,
    scrub_commit_delay: Duration,
    /// Time of the last scrub key press while a scrub is open.
    scrub_last_input: Option<Instant>,

    pub(crate) logs_open: bool,
    pub(crate) logs: VecDeque<String>,
    pub(crate) logs_scroll: usize,
    log_rx: Receiver<String>,
}

impl App {
    fn new(
        controller: Controller,
        tick_rx: Receiver<Tick>,
        asset_label: String,
        output_label: String,
        scrub_step: f64,
        scrub_commit_delay: Duration,
        log_rx: Receiver<String>,
    ) -> Self {
        let status = if controller.is_loaded() {
            "Ready".to_string()
        } else {
            "Asset unavailable (see logs)".to_string()
        };
        Self {
            controller,
            tick_rx,
            asset_label,
            output_label,
            status,
            scrub_step,
            scrub_commit_delay,
            scrub_last_input: None,
            logs_open: false,
            logs: VecDeque::new(),
            logs_scroll: 0,
            log_rx,
        }
    }

    /// Apply a key press. Returns `true` when the app should quit.
    fn handle_key(&mut self, key: KeyEvent, now: Instant) -> bool {
        if key.kind != KeyEventKind::Press {
            return false;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return true;
        }

        if self.logs_open {
            match key.code {
                KeyCode::Char('q') => return true,
                KeyCode::Esc | KeyCode::Char('l') => self.toggle_logs(),
                KeyCode::Up => self.scroll_logs_up(),
                KeyCode::Down => self.scroll_logs_down(),
                _ => {}
            }
            return false;
        }

        if self.controller.is_scrubbing()
            && matches!(
                key.code,
                KeyCode::Char('p') | KeyCode::Char(' ') | KeyCode::Char('r') | KeyCode::Char('g')
            )
        {
            // Transport commands win over a scrub still waiting for its commit.
            self.cancel_scrub();
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('p') => {
                self.controller.play();
                self.status = "Play".into();
            }
            KeyCode::Char(' ') => {
                self.controller.pause();
                self.status = "Pause".into();
            }
            KeyCode::Char('r') => {
                self.controller.rewind();
                self.status = "Rewind".into();
            }
            KeyCode::Char('b') => {
                self.controller.set_bookmark();
                self.status = format!(
                    "Bookmark set at {}",
                    render::format_clock(self.controller.bookmark_secs())
                );
            }
            KeyCode::Char('g') => {
                self.controller.play_from_bookmark();
                self.status = format!(
                    "Play from bookmark at {}",
                    render::format_clock(self.controller.bookmark_secs())
                );
            }
            KeyCode::Left => self.scrub(-self.scrub_step, now),
            KeyCode::Right => self.scrub(self.scrub_step, now),
            KeyCode::Enter => self.commit_scrub(),
            KeyCode::Char('l') => self.toggle_logs(),
            _ => {}
        }
        false
    }

    /// Move the scrub position by `delta`, opening a scrub on the first press.
    fn scrub(&mut self, delta: f64, now: Instant) {
        if !self.controller.is_loaded() {
            return;
        }
        let value = (self.controller.progress() + delta).clamp(0.0, 1.0);
        if self.controller.is_scrubbing() {
            self.controller.update_scrub(value);
        } else {
            self.controller.begin_scrub(value);
        }
        self.scrub_last_input = Some(now);
        self.status = "Scrubbing (Enter to seek)".into();
    }

    fn commit_scrub(&mut self) {
        if !self.controller.is_scrubbing() {
            return;
        }
        let value = self.controller.progress();
        self.controller.end_scrub(value);
        self.scrub_last_input = None;
        self.status = format!(
            "Seek to {}",
            render::format_clock(value * self.controller.duration_secs())
        );
    }

    fn cancel_scrub(&mut self) {
        self.controller.cancel_scrub();
        self.scrub_last_input = None;
    }

    /// Commit an open scrub once no scrub key has been pressed for the commit delay.
    fn maybe_commit_idle_scrub(&mut self, now: Instant) {
        let Some(last) = self.scrub_last_input else {
            return;
        };
        if now.saturating_duration_since(last) >= self.scrub_commit_delay {
            self.commit_scrub();
        }
    }

    fn pump_ticks(&mut self) {
        while let Ok(tick) = self.tick_rx.try_recv() {
            self.controller.on_timer(tick);
        }
    }

    fn toggle_logs(&mut self) {
        self.logs_open = !self.logs_open;
        if !self.logs_open {
            self.logs_scroll = 0;
        }
    }

    fn scroll_logs_up(&mut self) {
        let max = self.logs.len().saturating_sub(1);
        self.logs_scroll = (self.logs_scroll + 1).min(max);
    }

    fn scroll_logs_down(&mut self) {
        self.logs_scroll = self.logs_scroll.saturating_sub(1);
    }

    fn push_log_line(&mut self, line: String) {
        const LOG_CAP: usize = 500;
        if self.logs.len() >= LOG_CAP {
            self.logs.pop_front();
        }
        self.logs.push_back(line);
    }

    fn drain_logs(&mut self) {
        while let Ok(line) = self.log_rx.try_recv() {
            self.push_log_line(line);
        }
    }
}

fn ui_loop(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    let frame = Duration::from_millis(33);

    loop {
        app.pump_ticks();
        app.maybe_commit_idle_scrub(Instant::now());
        app.drain_logs();
        terminal.draw(|f| render::draw(f, app))?;

        if event::poll(frame).context("poll terminal events")? {
            if let CEvent::Key(k) = event::read().context("read terminal event")? {
                if app.handle_key(k, Instant::now()) {
                    return Ok(());
                }
            }
        }
    }
}

fn init_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("create terminal")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();
    Ok(())
}
