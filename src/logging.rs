/// Structured logging for the pegelalarm service
///
/// Backend for the `log` facade. Produces context-rich lines with a source
/// tag, timestamp and severity, on the console and optionally appended to a
/// file. Call sites use the helpers below so every line carries its source
/// and, where relevant, the slot or station it concerns.

use chrono::{DateTime, Utc};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use crate::model::FetchError;

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Api,
    Store,
    Sweep,
    System,
}

impl Source {
    /// `log` target used for records from this source.
    pub fn target(self) -> &'static str {
        match self {
            Source::Api => "pegel::api",
            Source::Store => "pegel::store",
            Source::Sweep => "pegel::sweep",
            Source::System => "pegel::sys",
        }
    }

    fn from_target(target: &str) -> Option<Self> {
        match target {
            "pegel::api" => Some(Source::Api),
            "pegel::store" => Some(Source::Store),
            "pegel::sweep" => Some(Source::Sweep),
            "pegel::sys" => Some(Source::System),
            _ => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Api => write!(f, "API"),
            Source::Store => write!(f, "STORE"),
            Source::Sweep => write!(f, "SWEEP"),
            Source::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Unexpected failure - configuration issue or the API changed shape
    Unexpected,
    /// Unknown - probably transient, worth watching if it repeats
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classify a fetch failure for log severity.
pub fn classify_fetch_failure(err: &FetchError) -> FailureType {
    match err {
        // Timeouts and server-side errors usually clear up by the next run
        FetchError::Transport(_) => FailureType::Unknown,
        FetchError::HttpStatus(code) if *code >= 500 => FailureType::Unknown,
        FetchError::HttpStatus(_) => FailureType::Unexpected,
        FetchError::MalformedEnvelope(_) => FailureType::Unexpected,
        FetchError::ApiStatus(_) => FailureType::Unexpected,
    }
}

// ---------------------------------------------------------------------------
// Logger
// ---------------------------------------------------------------------------

pub struct Logger {
    /// Minimum level for our own sources
    min_level: LevelFilter,
    /// Optional file path for logging
    log_file: Option<Mutex<std::fs::File>>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

/// Formats one log line as written to the log file.
pub fn format_entry(timestamp: DateTime<Utc>, level: Level, source: &str, message: &str) -> String {
    format!(
        "{} {} {}: {}",
        timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        level,
        source,
        message
    )
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        match Source::from_target(metadata.target()) {
            Some(_) => metadata.level() <= self.min_level,
            // Dependencies only get through when something is wrong
            None => metadata.level() <= Level::Warn,
        }
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let source = Source::from_target(record.target())
            .map(|s| s.to_string())
            .unwrap_or_else(|| record.target().to_string());
        let message = record.args().to_string();
        let entry = format_entry(Utc::now(), record.level(), &source, &message);

        // Console output
        if self.console_timestamps {
            match record.level() {
                Level::Error | Level::Warn => eprintln!("{}", entry),
                _ => println!("{}", entry),
            }
        } else {
            match record.level() {
                Level::Error => eprintln!("   ✗ {}: {}", source, message),
                Level::Warn => eprintln!("   ⚠ {}: {}", source, message),
                Level::Info => println!("   {}", message),
                Level::Debug | Level::Trace => println!("   [DEBUG] {}", message),
            }
        }

        // File output
        if let Some(file) = &self.log_file {
            if let Ok(mut file) = file.lock() {
                if let Err(e) = writeln!(file, "{}", entry) {
                    eprintln!("Failed to write to log file: {}", e);
                }
            }
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.log_file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
    }
}

/// Install the logger as the global `log` backend.
pub fn init_logger(
    min_level: LevelFilter,
    log_file: Option<&str>,
    console_timestamps: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let log_file = match log_file {
        Some(path) => Some(Mutex::new(
            OpenOptions::new().create(true).append(true).open(path)?,
        )),
        None => None,
    };

    let logger = Logger {
        min_level,
        log_file,
        console_timestamps,
    };

    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(min_level.max(LevelFilter::Warn));
    Ok(())
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

fn with_context(context: Option<&str>, message: &str) -> String {
    match context {
        Some(ctx) => format!("[{}] {}", ctx, message),
        None => message.to_string(),
    }
}

/// Log a general informational message
pub fn info(source: Source, context: Option<&str>, message: &str) {
    log::info!(target: source.target(), "{}", with_context(context, message));
}

/// Log a warning message
pub fn warn(source: Source, context: Option<&str>, message: &str) {
    log::warn!(target: source.target(), "{}", with_context(context, message));
}

/// Log an error message
pub fn error(source: Source, context: Option<&str>, message: &str) {
    log::error!(target: source.target(), "{}", with_context(context, message));
}

/// Log a debug message
pub fn debug(source: Source, context: Option<&str>, message: &str) {
    log::debug!(target: source.target(), "{}", with_context(context, message));
}

/// Log a failed slot fetch with automatic classification
pub fn log_fetch_failure(slot: usize, err: &FetchError) {
    let failure_type = classify_fetch_failure(err);
    let context = format!("slot {}", slot);
    let message = format!("fetch failed [{}]: {}", failure_type, err);

    match failure_type {
        FailureType::Unexpected => error(Source::Api, Some(&context), &message),
        FailureType::Unknown => warn(Source::Api, Some(&context), &message),
    }
}

// ---------------------------------------------------------------------------
// Cycle Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of one poll cycle
pub fn log_cycle_summary(polled: usize, failed: usize, stations: usize) {
    let message = format!(
        "Cycle complete: {}/{} slots successful, {} stations written",
        polled - failed,
        polled,
        stations
    );

    if failed == 0 {
        info(Source::System, None, &message);
    } else if failed == polled {
        error(Source::System, None, &message);
    } else {
        warn(Source::System, None, &message);
    }
}
