//! Structured logging for the ingest pipeline.
//!
//! Components never log through global state directly. Each one receives a
//! `&dyn Reporter` at construction and reports events tagged with a
//! `DataSource` and an optional subject (station code, file path, blob key).
//! `TracingReporter` forwards those events to `tracing`; `RecordingReporter`
//! keeps them in memory so tests can assert on what was reported.

use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// HidroWeb API
    Ana,
    /// Local filesystem sink
    Local,
    /// Azure Blob sink
    Azure,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Ana => write!(f, "ANA"),
            DataSource::Local => write!(f, "LOCAL"),
            DataSource::Azure => write!(f, "AZURE"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Reporter
// ---------------------------------------------------------------------------

/// Sink for pipeline events, injected into every component.
pub trait Reporter {
    fn report(&self, level: LogLevel, source: DataSource, subject: Option<&str>, message: &str);

    fn debug(&self, source: DataSource, subject: Option<&str>, message: &str) {
        self.report(LogLevel::Debug, source, subject, message);
    }

    fn info(&self, source: DataSource, subject: Option<&str>, message: &str) {
        self.report(LogLevel::Info, source, subject, message);
    }

    fn warn(&self, source: DataSource, subject: Option<&str>, message: &str) {
        self.report(LogLevel::Warning, source, subject, message);
    }

    fn error(&self, source: DataSource, subject: Option<&str>, message: &str) {
        self.report(LogLevel::Error, source, subject, message);
    }
}

/// Forwards events to the installed `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, level: LogLevel, source: DataSource, subject: Option<&str>, message: &str) {
        let subject = subject.unwrap_or("-");
        match level {
            LogLevel::Debug => tracing::debug!(%source, subject, "{}", message),
            LogLevel::Info => tracing::info!(%source, subject, "{}", message),
            LogLevel::Warning => tracing::warn!(%source, subject, "{}", message),
            LogLevel::Error => tracing::error!(%source, subject, "{}", message),
        }
    }
}

/// One event captured by `RecordingReporter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub level: LogLevel,
    pub source: DataSource,
    pub subject: Option<String>,
    pub message: String,
}

/// Keeps every reported event in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<LogEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Messages reported at exactly `level`, in order.
    pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.level == level)
            .map(|e| e.message)
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, level: LogLevel, source: DataSource, subject: Option<&str>, message: &str) {
        if let Ok(mut events) = self.events.lock() {
            events.push(LogEvent {
                level,
                source,
                subject: subject.map(String::from),
                message: message.to_string(),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Subscriber setup
// ---------------------------------------------------------------------------

/// Install the process-wide `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `level`. Output is appended to
/// `log_file` when one is given, otherwise it goes to stderr. A log file that
/// cannot be opened is an error and no subscriber is installed. Calling this
/// twice is harmless; the second call is ignored.
pub fn init(level: &str, log_file: Option<&Path>) -> io::Result<()> {
    let file = match log_file {
        Some(path) => Some(OpenOptions::new().create(true).append(true).open(path)?),
        None => None,
    };

    let (writer, ansi) = match file {
        Some(file) => (BoxMakeWriter::new(Mutex::new(file)), false),
        None => (BoxMakeWriter::new(io::stderr), true),
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hidropipeline={}", level.to_ascii_lowercase())));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(false)
        .try_init()
        .ok();
    Ok(())
}

// ---------------------------------------------------------------------------
// Run Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of one pipeline run.
pub fn log_run_summary(reporter: &dyn Reporter, saved: usize, skipped: usize, failed: usize) {
    let total = saved + skipped + failed;
    let message = format!(
        "Run complete: {}/{} datasets saved, {} skipped, {} failed",
        saved, total, skipped, failed
    );

    if failed == 0 {
        reporter.info(DataSource::System, None, &message);
    } else if saved == 0 {
        reporter.error(DataSource::System, None, &message);
    } else {
        reporter.warn(DataSource::System, None, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_recording_reporter_keeps_order_and_subject() {
        let reporter = RecordingReporter::new();
        reporter.info(DataSource::Ana, Some("66945000"), "first");
        reporter.warn(DataSource::Local, None, "second");

        let events = reporter.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].subject.as_deref(), Some("66945000"));
        assert_eq!(events[1].level, LogLevel::Warning);
        assert_eq!(reporter.messages_at(LogLevel::Info), ["first"]);
    }

    #[test]
    fn test_run_summary_level_follows_failures() {
        let reporter = RecordingReporter::new();
        log_run_summary(&reporter, 2, 0, 0);
        log_run_summary(&reporter, 1, 0, 1);
        log_run_summary(&reporter, 0, 1, 1);

        let levels: Vec<_> = reporter.events().iter().map(|e| e.level).collect();
        assert_eq!(levels, [LogLevel::Info, LogLevel::Warning, LogLevel::Error]);
    }

    #[test]
    fn test_unopenable_log_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing/pipeline.log");

        let err = init("info", Some(&path)).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!path.exists());
    }
}
