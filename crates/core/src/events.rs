//! Log and alert events emitted by the sync orchestrator.
//!
//! The orchestrator never logs user-facing outcomes directly; it hands a
//! [`LogEvent`] to an [`EventSink`]. Sinks decide where events go: the
//! tracing pipeline, an in-memory buffer, a terminal.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Error,
}

/// A transient user-facing alert attached to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Alert {
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEvent {
    pub level: EventLevel,
    pub message: String,
    pub alert: Option<Alert>,
    /// False for alert summaries that duplicate a detailed log entry.
    pub append_to_log: bool,
    pub at: DateTime<Utc>,
}

impl LogEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(EventLevel::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EventLevel::Error, message)
    }

    fn new(level: EventLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            alert: None,
            append_to_log: true,
            at: Utc::now(),
        }
    }

    /// Also raise an alert shown for `duration`.
    pub fn with_alert(mut self, duration: Duration) -> Self {
        self.alert = Some(Alert { duration });
        self
    }

    /// Show only as an alert; keep it out of the persistent log.
    pub fn alert_only(mut self) -> Self {
        self.append_to_log = false;
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == EventLevel::Error
    }
}

/// Destination for [`LogEvent`]s.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: LogEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: LogEvent) {
        let alert_ms = event.alert.map(|a| a.duration.as_millis() as u64);
        match event.level {
            EventLevel::Info => info!(
                target: "presetsync::events",
                alert_ms,
                append_to_log = event.append_to_log,
                "{}",
                event.message
            ),
            EventLevel::Error => error!(
                target: "presetsync::events",
                alert_ms,
                append_to_log = event.append_to_log,
                "{}",
                event.message
            ),
        }
    }
}

/// Buffers events in memory, for hosts that render them later.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LogEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all events emitted so far.
    pub fn events(&self) -> Vec<LogEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Remove and return all buffered events.
    pub fn drain(&self) -> Vec<LogEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<LogEvent> {
        self.events().into_iter().filter(LogEvent::is_error).collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: LogEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}
