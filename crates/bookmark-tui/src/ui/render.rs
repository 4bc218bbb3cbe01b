use bookmark_player::status::ControllerStatus;
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph},
};

use super::app::App;

const KEYS: &str =
    "keys: p play | Space pause | r rewind | b bookmark | g play bookmark | ←/→ scrub | Enter seek | l logs | q quit";

pub(crate) fn draw(f: &mut ratatui::Frame, app: &App) {
    let status = app.controller.status();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(f.area());

    let header = Paragraph::new(vec![
        Line::from(format!("asset: {}", app.asset_label)),
        Line::from(format!("output: {}", app.output_label)),
        Line::from(state_line(&status)),
    ])
    .block(Block::default().borders(Borders::ALL).title("Bookmark Player"));
    f.render_widget(header, chunks[0]);

    let gauge_color = if status.scrubbing {
        Color::Yellow
    } else {
        Color::Cyan
    };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Progress"))
        .gauge_style(Style::default().fg(gauge_color).bg(Color::Black))
        .ratio(status.progress.clamp(0.0, 1.0))
        .label(gauge_label(&status));
    f.render_widget(gauge, chunks[1]);

    let bookmark = if status.loaded {
        format_clock(status.bookmark_secs)
    } else {
        "-".to_string()
    };
    let info = Paragraph::new(vec![
        Line::from(vec![
            Span::styled("bookmark: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(bookmark),
        ]),
        Line::from(format!("status: {}", app.status)),
    ])
    .block(Block::default().borders(Borders::NONE));
    f.render_widget(info, chunks[2]);

    f.render_widget(Paragraph::new(Line::from(KEYS)), chunks[4]);

    if app.logs_open {
        let area = centered_rect(90, 80, f.area());
        f.render_widget(Clear, area);
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Logs (Esc to close, ↑/↓ scroll)");
        let inner = block.inner(area);
        let height = inner.height as usize;
        let total = app.logs.len();
        let end = total.saturating_sub(app.logs_scroll);
        let start = end.saturating_sub(height);
        let mut items = Vec::new();
        for line in app.logs.iter().skip(start).take(end.saturating_sub(start)) {
            items.push(ListItem::new(line.clone()));
        }
        if items.is_empty() {
            items.push(ListItem::new("<no logs>"));
        }
        f.render_widget(List::new(items).block(block), area);
    }
}

fn state_line(status: &ControllerStatus) -> String {
    if !status.loaded {
        return "state: unavailable".to_string();
    }
    let mut line = format!("state: {}", status.transport.label());
    if status.scrubbing {
        line.push_str(" + scrubbing");
    }
    line
}

/// `elapsed / total [state]`; while scrubbing the elapsed side shows the scrub target.
pub(crate) fn gauge_label(status: &ControllerStatus) -> String {
    if !status.loaded {
        return "asset unavailable".to_string();
    }
    let elapsed = format_clock(status.display_secs());
    let total = format_clock(status.duration_secs);
    let state = status.transport.label();
    if status.scrubbing {
        format!("→ {elapsed} / {total} [{state}, scrubbing]")
    } else {
        format!("{elapsed} / {total} [{state}]")
    }
}

pub(crate) fn format_clock(secs: f64) -> String {
    let total_secs = if secs.is_finite() && secs > 0.0 {
        secs.floor() as u64
    } else {
        0
    };
    let mins = total_secs / 60;
    let secs = total_secs % 60;
    format!("{mins}:{secs:02}")
}

fn centered_rect(percent_x: u16, percent_y: u16, r: ratatui::layout::Rect) -> ratatui::layout::Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookmark_player::status::Transport;

    fn status(transport: Transport, scrubbing: bool) -> ControllerStatus {
        ControllerStatus {
            loaded: true,
            transport,
            scrubbing,
            progress: 0.5,
            current_secs: 42.0,
            duration_secs: 200.0,
            bookmark_secs: 0.0,
        }
    }

    #[test]
    fn format_clock_minutes_and_seconds() {
        assert_eq!(format_clock(0.0), "0:00");
        assert_eq!(format_clock(59.9), "0:59");
        assert_eq!(format_clock(61.0), "1:01");
        assert_eq!(format_clock(3725.0), "62:05");
    }

    #[test]
    fn format_clock_rejects_bad_input() {
        assert_eq!(format_clock(-4.0), "0:00");
        assert_eq!(format_clock(f64::NAN), "0:00");
    }

    #[test]
    fn gauge_label_shows_position_and_state() {
        assert_eq!(gauge_label(&status(Transport::Playing, false)), "0:42 / 3:20 [playing]");
        assert_eq!(gauge_label(&status(Transport::Paused, false)), "0:42 / 3:20 [paused]");
    }

    #[test]
    fn gauge_label_follows_scrub_target() {
        assert_eq!(
            gauge_label(&status(Transport::Playing, true)),
            "→ 1:40 / 3:20 [playing, scrubbing]"
        );
    }

    #[test]
    fn unloaded_status_labels() {
        let mut s = status(Transport::Idle, false);
        s.loaded = false;
        assert_eq!(gauge_label(&s), "asset unavailable");
        assert_eq!(state_line(&s), "state: unavailable");
    }

    #[test]
    fn state_line_combines_scrubbing() {
        assert_eq!(state_line(&status(Transport::Idle, true)), "state: idle + scrubbing");
    }
}
