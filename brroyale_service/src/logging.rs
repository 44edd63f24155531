/// Structured logging for the leaderboard service.
///
/// Installs a `log` backend that tags every entry with the data source it
/// concerns, adds UTC timestamps, and optionally appends to a log file for
/// scheduled (cron) runs. Modules log through the usual `log` macros.

use crate::model::FetchError;
use chrono::Utc;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Noaa,
    Registry,
    Snapshot,
    System,
}

impl DataSource {
    /// Maps a `log` target (normally the module path) to its source label.
    pub fn from_target(target: &str) -> Self {
        if target.contains("ingest") {
            DataSource::Noaa
        } else if target.contains("stations") {
            DataSource::Registry
        } else if target.contains("snapshot") {
            DataSource::Snapshot
        } else {
            DataSource::System
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Noaa => write!(f, "NOAA"),
            DataSource::Registry => write!(f, "REG"),
            DataSource::Snapshot => write!(f, "SNAP"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Unexpected failure - no connection at all (network outage, DNS, TLS)
    /// or a client that could not be built; needs attention
    Unexpected,
    /// Unknown - connection made but the exchange broke off; usually clears
    /// on the next run
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

/// Classify a NOAA fetch failure.
///
/// Statuses, malformed bodies and timeouts never get here: the client turns
/// those into "no data" for the page.
pub fn classify_fetch_failure(err: &FetchError) -> FailureType {
    match err {
        FetchError::ClientBuild(_) => FailureType::Unexpected,
        FetchError::Transport { source, .. } if source.is_connect() || source.is_builder() => {
            FailureType::Unexpected
        }
        FetchError::Transport { .. } => FailureType::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Logger
// ---------------------------------------------------------------------------

pub struct Logger {
    /// Minimum log level to display
    min_level: LevelFilter,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    pub fn new(min_level: LevelFilter, log_file: Option<String>, console_timestamps: bool) -> Self {
        Self {
            min_level,
            log_file,
            console_timestamps,
        }
    }

    /// Renders the file/timestamped form of an entry.
    pub fn format_entry(level: Level, source: DataSource, message: &str) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        format!("{} {} {}: {}", timestamp, level, source, message)
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.min_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let source = DataSource::from_target(record.target());
        let message = record.args().to_string();
        let log_entry = Self::format_entry(record.level(), source, &message);

        if self.console_timestamps {
            match record.level() {
                Level::Error => eprintln!("{}", log_entry),
                Level::Warn => eprintln!("   {}", log_entry),
                _ => println!("   {}", log_entry),
            }
        } else {
            match record.level() {
                Level::Error => eprintln!("   ✗ {}: {}", source, message),
                Level::Warn => eprintln!("   ⚠ {}: {}", source, message),
                Level::Info => println!("   {}", message),
                Level::Debug | Level::Trace => println!("   [DEBUG] {}", message),
            }
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn flush(&self) {}
}

/// Install the global logger. Fails if a logger is already installed.
pub fn init_logger(
    min_level: LevelFilter,
    log_file: Option<&str>,
    console_timestamps: bool,
) -> Result<(), SetLoggerError> {
    let logger = Logger::new(min_level, log_file.map(String::from), console_timestamps);
    log::set_logger(Box::leak(Box::new(logger)))?;
    log::set_max_level(min_level);
    Ok(())
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a per-station fetch failure with automatic classification.
pub fn log_fetch_failure(station_id: &str, operation: &str, err: &FetchError) {
    let mut error_msg = err.to_string();
    if let Some(source) = std::error::Error::source(err) {
        error_msg = format!("{}: {}", error_msg, source);
    }
    let failure_type = classify_fetch_failure(err);

    let message = format!("[{}] {} failed [{}]: {}", station_id, operation, failure_type, error_msg);

    match failure_type {
        FailureType::Unexpected => log::error!(target: "ingest", "{}", message),
        FailureType::Unknown => log::warn!(target: "ingest", "{}", message),
    }
}

// ---------------------------------------------------------------------------
// Run Summary Logging
// ---------------------------------------------------------------------------

/// Log how many cities of a category came back with data.
pub fn log_run_summary(category: &str, total: usize, with_data: usize) {
    let missing = total.saturating_sub(with_data);
    let message = format!(
        "{} complete: {}/{} cities with data, {} without",
        category, with_data, total, missing
    );

    if missing == 0 {
        log::info!("{}", message);
    } else if with_data == 0 && total > 0 {
        log::error!("{}", message);
    } else {
        log::warn!("{}", message);
    }
}
