//! Event sink that prints user-facing events to the terminal.

use std::sync::Mutex;

use indicatif::ProgressBar;
use presetsync_core::events::{EventSink, LogEvent, TracingSink};

use crate::style;

/// Prints every event to stderr and forwards it to `tracing`.
///
/// Output goes through the attached progress bar, if any, so that lines do
/// not tear the spinner.
pub struct ConsoleSink {
    progress: Mutex<ProgressBar>,
    tracing: TracingSink,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            progress: Mutex::new(ProgressBar::hidden()),
            tracing: TracingSink,
        }
    }

    pub fn attach(&self, progress: &ProgressBar) {
        if let Ok(mut slot) = self.progress.lock() {
            *slot = progress.clone();
        }
    }

    pub fn detach(&self) {
        self.attach(&ProgressBar::hidden());
    }

    fn render(event: &LogEvent) -> String {
        let line = match (event.is_error(), event.alert.is_some()) {
            (true, true) => style::error(&style::header(&event.message)),
            (true, false) => style::error(&event.message),
            (false, true) => style::success(&style::header(&event.message)),
            (false, false) => style::info(&event.message),
        };
        if event.append_to_log {
            line
        } else {
            format!("{} {}", line, style::dim("(alert)"))
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for ConsoleSink {
    fn emit(&self, event: LogEvent) {
        let line = Self::render(&event);
        match self.progress.lock() {
            Ok(progress) => progress.suspend(|| eprintln!("{}", line)),
            Err(_) => eprintln!("{}", line),
        }
        self.tracing.emit(event);
    }
}
