//! # Logging & Tracing Infrastructure
//!
//! Provides structured logging with the `tracing` crate, supporting:
//! - JSON, pretty-print and compact output formats
//! - Crate-level filtering
//! - Integration with host logging (Logcat, engine console) via `LoggerSink`
//! - Span contexts around correlated requests
//!
//! ## Overview
//!
//! This module configures the `tracing-subscriber` infrastructure. When a
//! sink is configured, every event that survives filtering is mirrored to the
//! host logger while still flowing through the standard `tracing` layers.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_traits::{ConsoleLogger, LogLevel};
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = LoggingConfig::default()
//!         .with_format(LogFormat::Pretty)
//!         .with_level(LogLevel::Debug)
//!         .with_logger_sink(Arc::new(ConsoleLogger::default()));
//!
//!     init_logging(config).expect("Failed to initialize logging");
//!
//!     tracing::info!("Client started");
//! }
//! ```

use crate::error::{Error, Result};

use bridge_traits::{LogEntry, LogLevel, LoggerSink};

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    filter::EnvFilter,
    fmt::format::FmtSpan,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer,
};

/// Crates whose events pass the default filter at the configured level.
const CLIENT_CRATES: &[&str] = &[
    "bridge_loopback",
    "core_runtime",
    "core_correlation",
    "core_preflight",
    "core_connection",
    "core_service",
];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable pretty format with colors
    Pretty,
    /// Structured JSON format for machine parsing
    Json,
    /// Compact format for production
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        #[cfg(debug_assertions)]
        return Self::Pretty;

        #[cfg(not(debug_assertions))]
        return Self::Json;
    }
}

/// Logging configuration
#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Minimum level for the client crates
    pub level: LogLevel,
    /// Custom filter string (e.g., "core_connection=trace,core_preflight=debug")
    pub filter: Option<String>,
    /// Optional logger sink for forwarding logs to the host
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    pub enable_spans: bool,
    pub display_target: bool,
    pub display_thread_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            logger_sink: None,
            enable_spans: true,
            display_target: true,
            // Foreign callbacks hop threads; useful when diagnosing hand-offs.
            display_thread_info: cfg!(debug_assertions),
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("filter", &self.filter)
            .field("logger_sink", &self.logger_sink.is_some())
            .field("enable_spans", &self.enable_spans)
            .field("display_target", &self.display_target)
            .field("display_thread_info", &self.display_thread_info)
            .finish()
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Set logger sink for host integration
    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }

    pub fn with_thread_info(mut self, display: bool) -> Self {
        self.display_thread_info = display;
        self
    }
}

/// Install the global subscriber described by `config`.
///
/// Call once, early in host start-up. A second call fails because a global
/// subscriber is already set.
///
/// # Errors
///
/// `Error::Config` if the filter does not parse or a subscriber is already
/// installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;
    let output = fmt_layer(&config);

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .with(LoggerSinkLayer::new(config.logger_sink))
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directives = match &config.filter {
        Some(custom) => custom.clone(),
        None => default_directives(config.level),
    };

    EnvFilter::try_new(directives).map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
}

/// Client crates at `level`, everything else at warn.
fn default_directives(level: LogLevel) -> String {
    let mut directives = String::from("warn");
    for name in CLIENT_CRATES {
        directives.push_str(&format!(",{}={}", name, level.as_str()));
    }
    directives
}

fn fmt_layer<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let base = tracing_subscriber::fmt::layer()
        .with_target(config.display_target)
        .with_thread_ids(config.display_thread_info)
        .with_thread_names(config.display_thread_info)
        .with_writer(io::stdout);

    match config.format {
        LogFormat::Pretty => base.pretty().with_span_events(span_events).boxed(),
        LogFormat::Compact => base.compact().with_span_events(span_events).boxed(),
        LogFormat::Json => base
            .json()
            .flatten_event(true)
            .with_current_span(config.enable_spans)
            .with_span_list(config.enable_spans)
            .boxed(),
    }
}

/// Layer that mirrors events to a host [`LoggerSink`].
///
/// Inside a tokio runtime the sink is driven on a spawned task. Foreign
/// callback threads have no runtime, so there the sink is driven to
/// completion in place. Each entry records the emitting thread and the span
/// scope (outermost first, joined with `::`).
pub struct LoggerSinkLayer {
    sink: Option<Arc<dyn LoggerSink>>,
}

impl LoggerSinkLayer {
    pub fn new(sink: Option<Arc<dyn LoggerSink>>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for LoggerSinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };

        let metadata = event.metadata();
        let level = log_level(*metadata.level());
        if level < sink.min_level() {
            return;
        }

        let mut visitor = EntryVisitor::default();
        event.record(&mut visitor);

        let message = visitor
            .message
            .unwrap_or_else(|| metadata.name().to_string());
        let mut entry = LogEntry::new(level, metadata.target(), message);
        for (key, value) in visitor.fields {
            entry = entry.with_field(key, value);
        }
        if let Some(name) = std::thread::current().name() {
            entry = entry.with_field("thread", name);
        }
        if let Some(scope) = ctx.event_scope(event) {
            let path: Vec<&str> = scope.from_root().map(|span| span.name()).collect();
            entry = entry.with_span(path.join("::"));
        }

        let sink = Arc::clone(sink);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = sink.log(entry).await {
                        eprintln!("LoggerSink error: {}", err);
                    }
                });
            }
            Err(_) => {
                if let Err(err) = futures::executor::block_on(sink.log(entry)) {
                    eprintln!("LoggerSink error: {}", err);
                }
            }
        }
    }
}

/// Splits an event into its message and the remaining fields.
#[derive(Default)]
struct EntryVisitor {
    message: Option<String>,
    fields: HashMap<String, String>,
}

impl Visit for EntryVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{:?}", value));
    }
}

fn log_level(level: tracing::Level) -> LogLevel {
    match level {
        tracing::Level::TRACE => LogLevel::Trace,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::ERROR => LogLevel::Error,
    }
}

impl EntryVisitor {
    fn insert(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}
