//! # Log Buffer
//!
//! Keeps the last N log lines in memory so a host can show or export them
//! after the fact. The buffer is an ordinary value handed to whoever needs
//! it; nothing here installs itself globally.
//!
//! [`RingLogger`] adapts a [`LogBuffer`] to the `log` facade and can wrap
//! another logger (for example `env_logger`) so records are both printed
//! and retained.

use chrono::Local;
use log::{Level, Log, Metadata, Record};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Default number of retained entries.
pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// A single retained log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Local wall-clock time, `HH:MM:SS`.
    pub timestamp: String,
    pub level: Level,
    pub target: String,
    pub message: String,
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.timestamp, self.level, self.message)
    }
}

/// A bounded ring of log entries; the oldest entry is evicted first.
///
/// Clones share the same storage.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Appends an entry stamped with the current local time.
    pub fn push(&self, level: Level, target: &str, message: impl Into<String>) {
        self.push_entry(LogEntry {
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            level,
            target: target.to_string(),
            message: message.into(),
        });
    }

    pub fn push_entry(&self, entry: LogEntry) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Snapshot of the retained entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Renders the retained entries, one per line.
    pub fn render(&self) -> String {
        self.entries
            .lock()
            .iter()
            .map(|entry| entry.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Writes [`render`](Self::render) to a file.
    pub fn write_to(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        fs::write(path, self.render())
    }
}

/// A `log::Log` that retains records in a [`LogBuffer`] and optionally
/// forwards them to another logger.
pub struct RingLogger {
    buffer: LogBuffer,
    inner: Option<Box<dyn Log>>,
    level: log::LevelFilter,
}

impl RingLogger {
    pub fn new(buffer: LogBuffer, level: log::LevelFilter) -> Self {
        Self {
            buffer,
            inner: None,
            level,
        }
    }

    /// Forwards every record to `inner` as well.
    pub fn with_inner(mut self, inner: Box<dyn Log>) -> Self {
        self.inner = Some(inner);
        self
    }

    pub fn buffer(&self) -> &LogBuffer {
        &self.buffer
    }

    /// Installs this logger as the process-wide `log` backend.
    pub fn install(self) -> Result<(), log::SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }
}

impl Log for RingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.buffer
            .push(record.level(), record.target(), record.args().to_string());
        if let Some(inner) = &self.inner {
            if inner.enabled(record.metadata()) {
                inner.log(record);
            }
        }
    }

    fn flush(&self) {
        if let Some(inner) = &self.inner {
            inner.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_first() {
        let buffer = LogBuffer::new(3);
        for i in 0..5 {
            buffer.push(Level::Info, "test", format!("message {}", i));
        }
        let messages: Vec<String> = buffer.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["message 2", "message 3", "message 4"]);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn clones_share_storage() {
        let buffer = LogBuffer::default();
        let handle = buffer.clone();
        handle.push(Level::Warn, "test", "shared");
        assert_eq!(buffer.len(), 1);
        buffer.clear();
        assert!(handle.is_empty());
        assert_eq!(handle.capacity(), DEFAULT_LOG_CAPACITY);
    }

    #[test]
    fn render_format() {
        let buffer = LogBuffer::new(4);
        buffer.push_entry(LogEntry {
            timestamp: "12:00:00".into(),
            level: Level::Error,
            target: "test".into(),
            message: "boom".into(),
        });
        buffer.push_entry(LogEntry {
            timestamp: "12:00:01".into(),
            level: Level::Info,
            target: "test".into(),
            message: "ok".into(),
        });
        assert_eq!(buffer.render(), "[12:00:00] ERROR: boom\n[12:00:01] INFO: ok");
    }

    #[test]
    fn ring_logger_filters_by_level() {
        let buffer = LogBuffer::new(10);
        let logger = RingLogger::new(buffer.clone(), log::LevelFilter::Info);

        logger.log(
            &Record::builder()
                .level(Level::Debug)
                .target("test")
                .args(format_args!("hidden"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(Level::Warn)
                .target("test")
                .args(format_args!("kept {}", 1))
                .build(),
        );

        let entries = buffer.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "kept 1");
        assert_eq!(entries[0].level, Level::Warn);
    }

    #[test]
    fn installed_logger_captures_macros() {
        // The only test in this crate that installs a global logger.
        let buffer = LogBuffer::new(1000);
        RingLogger::new(buffer.clone(), log::LevelFilter::Info)
            .install()
            .unwrap();
        log::info!(target: "install-test", "routed through log");
        assert!(
            buffer
                .entries()
                .iter()
                .any(|e| e.target == "install-test" && e.message == "routed through log")
        );
    }

    #[test]
    fn write_to_file() {
        let buffer = LogBuffer::new(2);
        buffer.push(Level::Info, "test", "saved");
        let path = std::env::temp_dir().join(format!("pitchmatch-log-{}.txt", std::process::id()));
        buffer.write_to(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert!(text.ends_with("INFO: saved"));
    }
}
