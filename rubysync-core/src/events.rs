//! Leveled, stage-tagged event reporting.
//!
//! Core components never log through a global; they emit events through an
//! injected sink so callers decide where output goes. The CLI installs
//! [`TracingSink`]; tests install [`MemorySink`] and assert on what was
//! recorded.

use std::sync::Mutex;

/// Severity of an emitted event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Pipeline stage an event originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discover,
    Catalog,
    Mutate,
    Publish,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Discover => "discover",
            Stage::Catalog => "catalog",
            Stage::Mutate => "mutate",
            Stage::Publish => "publish",
        }
    }
}

/// Injected structured-output sink
pub trait EventSink: Send + Sync {
    fn emit(&self, level: EventLevel, stage: Stage, message: &str);

    fn debug(&self, stage: Stage, message: &str) {
        self.emit(EventLevel::Debug, stage, message);
    }

    fn info(&self, stage: Stage, message: &str) {
        self.emit(EventLevel::Info, stage, message);
    }

    fn warn(&self, stage: Stage, message: &str) {
        self.emit(EventLevel::Warn, stage, message);
    }

    fn error(&self, stage: Stage, message: &str) {
        self.emit(EventLevel::Error, stage, message);
    }
}

/// Forwards events to the `tracing` subscriber installed by the binary
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, level: EventLevel, stage: Stage, message: &str) {
        let stage = stage.as_str();
        match level {
            EventLevel::Debug => tracing::debug!(stage, "{message}"),
            EventLevel::Info => tracing::info!(stage, "{message}"),
            EventLevel::Warn => tracing::warn!(stage, "{message}"),
            EventLevel::Error => tracing::error!(stage, "{message}"),
        }
    }
}

/// An event captured by [`MemorySink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub level: EventLevel,
    pub stage: Stage,
    pub message: String,
}

/// Records events in memory for assertions
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().expect("sink lock poisoned").clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.message).collect()
    }

    /// True if any recorded message contains `needle`
    pub fn saw(&self, needle: &str) -> bool {
        self.events()
            .iter()
            .any(|e| e.message.contains(needle))
    }
}

impl EventSink for MemorySink {
    fn emit(&self, level: EventLevel, stage: Stage, message: &str) {
        self.events
            .lock()
            .expect("sink lock poisoned")
            .push(RecordedEvent {
                level,
                stage,
                message: message.to_string(),
            });
    }
}
