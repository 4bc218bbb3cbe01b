//! Tracing layer feeding the in-app log panel.
//!
//! The terminal belongs to the UI while it runs, so log lines are formatted here and sent
//! over a channel for the UI loop to drain.

use crossbeam_channel::Sender;
use tracing::Subscriber;
use tracing::field::{Field, Visit};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

pub struct LogLayer {
    tx: Sender<String>,
}

impl LogLayer {
    pub fn new(tx: Sender<String>) -> Self {
        Self { tx }
    }
}

impl<S> Layer<S> for LogLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = LogVisitor::default();
        event.record(&mut visitor);
        let meta = event.metadata();
        let line = format_line(meta.level(), meta.target(), visitor);
        // The UI may already be gone during shutdown.
        let _ = self.tx.send(line);
    }
}

fn format_line(level: &tracing::Level, target: &str, visitor: LogVisitor) -> String {
    let mut message = visitor.message.unwrap_or_else(|| "log event".to_string());
    if !visitor.fields.is_empty() {
        message = format!("{message} {}", visitor.fields.join(" "));
    }
    let level = level.to_string();
    format!("{level:>5} {target}: {message}")
}

#[derive(Default)]
struct LogVisitor {
    message: Option<String>,
    fields: Vec<String>,
}

impl Visit for LogVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let formatted = format!("{value:?}");
        if field.name() == "message" {
            self.message = Some(formatted.trim_matches('"').to_string());
        } else {
            self.fields.push(format!("{}={}", field.name(), formatted));
        }
    }
}
