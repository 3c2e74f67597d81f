//! Logging capability injected into the scheduler.
//!
//! `TracingLog` forwards to `tracing`. `LogBuffer` additionally keeps the
//! most recent entries for a host UI; clones share the same storage.

use chrono::Local;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::Level;

const LOG_BUFFER_MAX: usize = 500;

pub trait AdLog {
    fn record(&self, level: Level, message: &str);
}

/// Forwards every record to `tracing` under the `adbreak` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl AdLog for TracingLog {
    fn record(&self, level: Level, message: &str) {
        emit(level, message);
    }
}

fn emit(level: Level, message: &str) {
    if level == Level::ERROR {
        tracing::error!(target: "adbreak", "{message}");
    } else if level == Level::WARN {
        tracing::warn!(target: "adbreak", "{message}");
    } else if level == Level::INFO {
        tracing::info!(target: "adbreak", "{message}");
    } else if level == Level::DEBUG {
        tracing::debug!(target: "adbreak", "{message}");
    } else {
        tracing::trace!(target: "adbreak", "{message}");
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    entries: Rc<RefCell<VecDeque<LogEntry>>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, level: Level, message: impl Into<String>) {
        let timestamp = Local::now().format("%H:%M:%S").to_string();
        let mut entries = self.entries.borrow_mut();
        entries.push_back(LogEntry {
            timestamp,
            level: level.as_str().to_lowercase(),
            message: message.into(),
        });
        while entries.len() > LOG_BUFFER_MAX {
            entries.pop_front();
        }
    }

    pub fn get(&self, since_index: usize) -> Vec<LogEntry> {
        self.entries.borrow().iter().skip(since_index).cloned().collect()
    }

    /// Whether any entry at `level` contains `needle`.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        let level = level.as_str().to_lowercase();
        self.entries
            .borrow()
            .iter()
            .any(|e| e.level == level && e.message.contains(needle))
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl AdLog for LogBuffer {
    fn record(&self, level: Level, message: &str) {
        emit(level, message);
        self.push(level, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_entries() {
        let log = LogBuffer::new();
        let handle = log.clone();
        log.record(Level::WARN, "ignored");
        assert_eq!(handle.len(), 1);
        assert!(handle.contains(Level::WARN, "ignored"));
        assert!(!handle.contains(Level::ERROR, "ignored"));
    }

    #[test]
    fn buffer_is_bounded() {
        let log = LogBuffer::new();
        for i in 0..(LOG_BUFFER_MAX + 20) {
            log.push(Level::INFO, format!("entry {i}"));
        }
        assert_eq!(log.len(), LOG_BUFFER_MAX);
        assert_eq!(log.get(0)[0].message, "entry 20");
    }

    #[test]
    fn get_since_index_and_clear() {
        let log = LogBuffer::new();
        log.push(Level::INFO, "one");
        log.push(Level::DEBUG, "two");
        let tail = log.get(1);
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].level, "debug");
        log.clear();
        assert!(log.is_empty());
    }
}
