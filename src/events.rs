//! Structured event emission.
//!
//! Jobs never log directly; they emit [`Event`]s through an [`EventSink`]
//! handed to them at construction. The production sink forwards to
//! `tracing`, tests record into memory.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RunStarted,
    RunFinished,
    FetchFailed,
    WatermarkLoaded,
    WatermarkAdvanced,
    WatermarkWriteFailed,
    NewProjectDetected,
    BalanceFetchFailed,
    ReminderDue,
    LikedProjectMissing,
    InvalidTimestamp,
    NotificationSent,
    NotificationFailed,
    NotificationSkipped,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::RunStarted => "run_started",
            EventKind::RunFinished => "run_finished",
            EventKind::FetchFailed => "fetch_failed",
            EventKind::WatermarkLoaded => "watermark_loaded",
            EventKind::WatermarkAdvanced => "watermark_advanced",
            EventKind::WatermarkWriteFailed => "watermark_write_failed",
            EventKind::NewProjectDetected => "new_project_detected",
            EventKind::BalanceFetchFailed => "balance_fetch_failed",
            EventKind::ReminderDue => "reminder_due",
            EventKind::LikedProjectMissing => "liked_project_missing",
            EventKind::InvalidTimestamp => "invalid_timestamp",
            EventKind::NotificationSent => "notification_sent",
            EventKind::NotificationFailed => "notification_failed",
            EventKind::NotificationSkipped => "notification_skipped",
        }
    }

    fn severity(&self) -> Severity {
        match self {
            EventKind::FetchFailed
            | EventKind::WatermarkWriteFailed
            | EventKind::NotificationFailed => Severity::Error,
            EventKind::BalanceFetchFailed
            | EventKind::LikedProjectMissing
            | EventKind::InvalidTimestamp
            | EventKind::NotificationSkipped => Severity::Warn,
            EventKind::WatermarkLoaded => Severity::Debug,
            _ => Severity::Info,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Severity {
    Error,
    Warn,
    Info,
    Debug,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub fields: Map<String, Value>,
    pub at: DateTime<Utc>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            fields: Map::new(),
            at: Utc::now(),
        }
    }

    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Forwards events to `tracing`, one line per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: Event) {
        let kind = event.kind.as_str();
        let fields = Value::Object(event.fields);
        match event.kind.severity() {
            Severity::Error => error!(event = kind, %fields),
            Severity::Warn => warn!(event = kind, %fields),
            Severity::Info => info!(event = kind, %fields),
            Severity::Debug => debug!(event = kind, %fields),
        }
    }
}

/// Keeps every event in memory; cloning shares the buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn of_kind(&self, kind: EventKind) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind == kind)
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: Event) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_fields() {
        let ev = Event::new(EventKind::WatermarkAdvanced)
            .field("from", 112)
            .field("to", 115)
            .field("key", "last_project_id");
        assert_eq!(ev.get("from"), Some(&Value::from(112)));
        assert_eq!(ev.get("key").and_then(Value::as_str), Some("last_project_id"));
    }

    #[test]
    fn memory_sink_shares_buffer_between_clones() {
        let sink = MemorySink::new();
        let other = sink.clone();
        other.emit(Event::new(EventKind::RunStarted));
        other.emit(Event::new(EventKind::FetchFailed));
        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.of_kind(EventKind::FetchFailed).len(), 1);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let ev = Event::new(EventKind::NotificationFailed);
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["kind"], "notification_failed");
        assert_eq!(EventKind::NotificationFailed.as_str(), "notification_failed");
    }
}
