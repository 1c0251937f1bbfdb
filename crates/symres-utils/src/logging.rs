//! # Logging Utilities
//!
//! `tracing` subscriber setup for symres tools and tests.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use symres_utils::init_logging;
//!
//! let _guard = init_logging().expect("Failed to initialize logging");
//! tracing::info!("processing started");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: level filter (e.g. `RUST_LOG=debug`, `RUST_LOG=symres_core=trace`)
//! - `SYMRES_LOG_FORMAT`: `json` or `pretty` (default: `pretty`)
//! - `SYMRES_LOG_FILE`: optional log file, rotated daily, written in addition to stdout
//!
//! ## Guards
//!
//! File output goes through a non-blocking writer. Keep the returned
//! [`LogGuard`] alive for as long as logging is needed; dropping it flushes
//! and closes the file.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, fs, io};

use chrono::Utc;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

const FORMAT_VAR: &str = "SYMRES_LOG_FORMAT";
const FILE_VAR: &str = "SYMRES_LOG_FILE";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Human-readable output
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    Error,
    Warn,
    /// Default
    Info,
    Debug,
    /// Includes per-frame lookups
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Keeps the non-blocking file writer alive.
///
/// Holds nothing when logging goes to stdout only.
#[derive(Debug, Default)]
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard
{
    _worker: Option<WorkerGuard>,
}

/// Initialize logging from the environment.
///
/// `SYMRES_LOG_FORMAT` selects the format, `RUST_LOG` the filter (default
/// `info`), and `SYMRES_LOG_FILE` adds a daily-rotated file next to stdout.
///
/// ## Errors
///
/// Returns an error if:
/// - `SYMRES_LOG_FORMAT` is set to an unknown format
/// - A global subscriber is already installed
pub fn init_logging() -> Result<LogGuard, LoggingError>
{
    let format = match env::var(FORMAT_VAR) {
        Ok(value) => value.parse()?,
        Err(_) => LogFormat::default(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));
    let log_file = env::var(FILE_VAR).ok().map(PathBuf::from);

    install(format, filter, log_file.as_deref())
}

/// Initialize logging with an explicit level and format.
///
/// `RUST_LOG` is ignored; `SYMRES_LOG_FILE` is still honoured.
///
/// ## Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<LogGuard, LoggingError>
{
    let filter = EnvFilter::new(Level::from(level).to_string());
    let log_file = env::var(FILE_VAR).ok().map(PathBuf::from);

    install(format, filter, log_file.as_deref())
}

/// Log to a dated file in `directory` only, keeping stdout free for reports.
///
/// The file is named `YYYY-MM-DD-symres.log`. `level` overrides `RUST_LOG`;
/// without either, `info` is used.
///
/// ## Errors
///
/// Returns an error if the directory cannot be created or a global subscriber
/// is already installed.
pub fn init_file_logging(directory: impl AsRef<Path>, level: Option<LogLevel>) -> Result<(PathBuf, LogGuard), LoggingError>
{
    let directory = directory.as_ref();
    fs::create_dir_all(directory)?;

    let file_name = format!("{}-symres.log", Utc::now().format("%Y-%m-%d"));
    let filter = match level {
        Some(level) => EnvFilter::new(Level::from(level).to_string()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string())),
    };

    let appender = tracing_appender::rolling::never(directory, &file_name);
    let (writer, worker) = tracing_appender::non_blocking(appender);
    Registry::default()
        .with(file_layer(LogFormat::Pretty, writer).with_filter(filter))
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;

    Ok((directory.join(file_name), LogGuard { _worker: Some(worker) }))
}

/// Route log output through the test harness' captured writer.
///
/// Safe to call from every test; only the first call installs a subscriber.
/// The filter comes from `RUST_LOG`, defaulting to `debug`.
pub fn init_test_logging()
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::DEBUG.to_string()));
    // A subscriber installed by an earlier test is fine.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_test_writer()
        .try_init();
}

fn install(format: LogFormat, filter: EnvFilter, log_file: Option<&Path>) -> Result<LogGuard, LoggingError>
{
    let mut layers = vec![console_layer(format).with_filter(filter.clone()).boxed()];

    let worker = log_file.map(|path| {
        let (writer, worker) = tracing_appender::non_blocking(daily_appender(path));
        layers.push(file_layer(format, writer).with_filter(filter).boxed());
        worker
    });

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;

    Ok(LogGuard { _worker: worker })
}

fn daily_appender(path: &Path) -> RollingFileAppender
{
    let directory = path.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let file_name = path.file_name().unwrap_or_default();
    tracing_appender::rolling::daily(directory, file_name)
}

fn console_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync>
{
    let layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(io::stdout);

    match format {
        LogFormat::Pretty => layer.with_ansi(true).boxed(),
        LogFormat::Json => layer.json().with_current_span(true).with_span_list(true).boxed(),
    }
}

fn file_layer<W>(format: LogFormat, writer: W) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_ansi(false);

    match format {
        LogFormat::Pretty => layer.boxed(),
        LogFormat::Json => layer.json().with_current_span(true).with_span_list(true).boxed(),
    }
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    #[error("Unknown log format: {0}. Use 'pretty' or 'json'")]
    InvalidFormat(String),

    #[error("Unknown log level: {0}. Use 'error', 'warn', 'info', 'debug', or 'trace'")]
    InvalidLevel(String),

    /// A global subscriber was already installed
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_log_format_from_str()
    {
        assert_eq!(LogFormat::from_str("pretty").unwrap(), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("JSON").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str("prod").unwrap(), LogFormat::Json);
        assert!(matches!(
            LogFormat::from_str("xml"),
            Err(LoggingError::InvalidFormat(value)) if value == "xml"
        ));
    }

    #[test]
    fn test_log_level_from_str()
    {
        assert_eq!(LogLevel::from_str("warning").unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::from_str("dbg").unwrap(), LogLevel::Debug);
        assert_eq!(LogLevel::from_str("trace").unwrap(), LogLevel::Trace);
        assert!(matches!(LogLevel::from_str("loud"), Err(LoggingError::InvalidLevel(_))));
    }

    #[test]
    fn test_log_level_to_tracing_level()
    {
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
        assert_eq!(Level::from(LogLevel::Info), Level::INFO);
        assert_eq!(Level::from(LogLevel::Trace), Level::TRACE);
    }

    #[test]
    fn test_init_test_logging_is_idempotent()
    {
        init_test_logging();
        init_test_logging();
        tracing::debug!("still logging");
    }

    #[test]
    fn test_daily_appender_accepts_bare_file_name()
    {
        let dir = std::env::temp_dir().join("symres-logging-test");
        fs::create_dir_all(&dir).unwrap();
        let _ = daily_appender(&dir.join("resolver.log"));
    }
}
