//! Leveled reporting for the transaction engine.
//!
//! The engine owns a [`Reporter`] instead of reaching for a global logger, so
//! a harness can hand it a [`MemoryReporter`] and inspect what was said.

use std::sync::{Arc, Mutex, PoisonError};

pub use log::Level;

/// Sink for engine messages. Implementations must neither block nor fail.
pub trait Reporter: Send {
    fn report(&self, level: Level, text: &str);
}

/// Forwards every message to the `log` facade.
#[derive(Debug, Clone)]
pub struct LogReporter {
    target: &'static str,
}

impl LogReporter {
    pub fn with_target(target: &'static str) -> Self {
        Self { target }
    }
}

impl Default for LogReporter {
    fn default() -> Self {
        Self::with_target("sunpower_lib::cryocooler")
    }
}

impl Reporter for LogReporter {
    fn report(&self, level: Level, text: &str) {
        log::log!(target: self.target, level, "{}", text);
    }
}

/// Keeps messages in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryReporter {
    entries: Arc<Mutex<Vec<(Level, String)>>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True if a message at `level` contains `needle`.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|(l, text)| *l == level && text.contains(needle))
    }

    pub fn count(&self, level: Level) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(l, _)| *l == level)
            .count()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, level: Level, text: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, text.to_string()));
    }
}

/// A reporter plus the most recent warning-or-worse message.
pub struct MessageLog {
    sink: Box<dyn Reporter>,
    last: Option<(Level, String)>,
}

impl MessageLog {
    pub fn new(sink: Box<dyn Reporter>) -> Self {
        Self { sink, last: None }
    }

    pub fn emit<S: AsRef<str>>(&mut self, level: Level, text: S) {
        let text = text.as_ref();
        self.sink.report(level, text);
        if level <= Level::Warn {
            self.last = Some((level, text.to_string()));
        }
    }

    pub fn last_message(&self) -> Option<&str> {
        self.last.as_ref().map(|(_, text)| text.as_str())
    }

    pub fn last_level(&self) -> Option<Level> {
        self.last.as_ref().map(|(level, _)| *level)
    }
}
