//! Logging and tracing configuration
//!
//! This module provides centralized logging configuration for the publisher.
//! Console output always goes to stderr so that stdout stays free for the
//! NDJSON stream written by the stdout transport.

use std::io;
use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::types::LoggingSection;

/// Prefix of rolling log file names
pub const LOG_FILE_PREFIX: &str = "appstore-traffic-simulator";

/// Boxed error returned by subscriber initialisation
pub type LoggingInitError = Box<dyn std::error::Error + Send + Sync>;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level for the application
    pub level: Level,
    /// Whether to enable JSON formatting on the console
    pub json_format: bool,
    /// Log file directory; file logging is enabled when set
    pub log_directory: Option<String>,
    /// Whether to emit span close events with timings
    pub enable_span_events: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            json_format: false,
            log_directory: None,
            enable_span_events: false,
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the level from the `--verbose` / `--debug` CLI flags
    pub fn from_cli_flags(verbose: bool, debug: bool) -> Self {
        if debug {
            Self::new().with_level(Level::DEBUG).with_span_events()
        } else if verbose {
            Self::new().with_level(Level::INFO)
        } else {
            Self::new()
        }
    }

    /// Apply the `logging` section of the publisher configuration
    pub fn with_section(mut self, section: &LoggingSection) -> Self {
        if section.json {
            self = self.with_json_format();
        }
        if let Some(directory) = &section.directory {
            self = self.with_file_logging(directory.clone());
        }
        self
    }

    /// Set the log level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Enable JSON formatting
    pub fn with_json_format(mut self) -> Self {
        self.json_format = true;
        self
    }

    /// Enable daily rolling file logging (always JSON)
    pub fn with_file_logging(mut self, directory: impl Into<String>) -> Self {
        self.log_directory = Some(directory.into());
        self
    }

    /// Enable span events
    pub fn with_span_events(mut self) -> Self {
        self.enable_span_events = true;
        self
    }

    fn span_events(&self) -> FmtSpan {
        if self.enable_span_events {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    /// Filter used when `RUST_LOG` is not set
    pub fn default_directive(&self) -> String {
        format!("{}={}", env!("CARGO_PKG_NAME").replace('-', "_"), self.level)
    }

    /// Non-blocking writer onto the daily rolling log file in `directory`
    ///
    /// Buffered lines are flushed when the returned guard is dropped.
    pub fn file_writer(directory: impl AsRef<Path>) -> (NonBlocking, WorkerGuard) {
        non_blocking(rolling::daily(directory, LOG_FILE_PREFIX))
    }

    /// Initialize the global tracing subscriber
    ///
    /// With file logging enabled the returned guard must be held until the
    /// process exits, otherwise buffered file lines are lost.
    pub fn init(self) -> Result<Option<WorkerGuard>, LoggingInitError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.default_directive()));

        let console_layer = if self.json_format {
            fmt::layer()
                .json()
                .with_writer(io::stderr)
                .with_span_events(self.span_events())
                .boxed()
        } else {
            fmt::layer()
                .with_writer(io::stderr)
                .with_span_events(self.span_events())
                .boxed()
        };

        let (file_layer, guard) = match &self.log_directory {
            Some(directory) => {
                let (writer, guard) = Self::file_writer(directory);
                let layer = fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_span_events(self.span_events())
                    .boxed();
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        Registry::default()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()?;

        tracing::debug!("Logging initialized: {:?}", self);
        Ok(guard)
    }
}

/// Macro for structured log events tagged with the delivery tallies
#[macro_export]
macro_rules! tally_event {
    ($level:ident, $tally:expr, $message:expr) => {
        tracing::$level!(
            component = "delivery",
            published = $tally.published(),
            failed = $tally.failed(),
            "{}",
            $message
        );
    };
}
