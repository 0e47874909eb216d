//! Host Log Forwarding
//!
//! Structured log entries the client mirrors into the host's own logging
//! pipeline (Logcat, the engine console, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Structured log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    /// Emitting module
    pub target: String,
    pub message: String,
    pub fields: HashMap<String, String>,
    /// Name of the innermost active span, if any
    pub span: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: HashMap::new(),
            span: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_span(mut self, span: impl Into<String>) -> Self {
        self.span = Some(span.into());
        self
    }
}

/// Forwards structured logs from the client to the host.
///
/// Implementations are called from arbitrary threads and must not block for
/// long; the tracing layer drives them from the async runtime when one is
/// available.
#[async_trait::async_trait]
pub trait LoggerSink: Send + Sync {
    /// Forward a log entry to the host logging system
    async fn log(&self, entry: LogEntry) -> Result<()>;

    /// Entries below this level are dropped before reaching the sink.
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

/// Writes entries to stdout. Useful for the loopback host and demos.
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    pub min_level: LogLevel,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
        }
    }
}

#[async_trait::async_trait]
impl LoggerSink for ConsoleLogger {
    async fn log(&self, entry: LogEntry) -> Result<()> {
        if entry.level < self.min_level {
            return Ok(());
        }

        println!(
            "[{}] {:>5} {}: {}",
            entry.timestamp.format("%H:%M:%S%.3f"),
            entry.level.as_str().to_uppercase(),
            entry.target,
            entry.message
        );
        if !entry.fields.is_empty() {
            println!("  fields: {:?}", entry.fields);
        }
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_entry_builder() {
        let entry = LogEntry::new(LogLevel::Warn, "core_preflight", "Permission denied")
            .with_field("permission", "android.permission.BLUETOOTH_SCAN")
            .with_span("request_required");

        assert_eq!(entry.level, LogLevel::Warn);
        assert_eq!(entry.target, "core_preflight");
        assert_eq!(
            entry.fields.get("permission"),
            Some(&"android.permission.BLUETOOTH_SCAN".to_string())
        );
        assert_eq!(entry.span.as_deref(), Some("request_required"));
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Error > LogLevel::Warn);
        assert!(LogLevel::Trace < LogLevel::Info);
    }

    #[tokio::test]
    async fn test_console_logger_accepts_entries() {
        let logger = ConsoleLogger {
            min_level: LogLevel::Debug,
        };
        logger
            .log(LogEntry::new(LogLevel::Info, "test", "hello"))
            .await
            .unwrap();
        assert_eq!(logger.min_level(), LogLevel::Debug);
    }
}
