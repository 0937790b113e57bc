//! # Logging Utilities
//!
//! Structured logging for Emmy built on `tracing`:
//! - Pretty output for people, JSON for log collectors
//! - Environment variable configuration
//! - Console output for the CLI, file-only output for the injected engine
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use emmy_utils::init_logging;
//!
//! init_logging().expect("Failed to initialize logging");
//! tracing::info!("Front-end listening");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: level filter (e.g. `RUST_LOG=debug`, `RUST_LOG=emmy_protocol=trace`)
//! - `EMMY_LOG_FORMAT`: `json` or `pretty` (default: `pretty`)
//! - `EMMY_LOG_FILE`: optional extra log file for console logging

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use chrono::{NaiveDate, Utc};
use tracing::Level;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Selects the output format.
pub const ENV_LOG_FORMAT: &str = "EMMY_LOG_FORMAT";
/// Optional extra log file for [`init_logging`].
pub const ENV_LOG_FILE: &str = "EMMY_LOG_FILE";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat
{
    /// Human-readable (default)
    Pretty,
    /// One JSON object per line
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
            _ => Err(LoggingError::InvalidFormat(format!("{s}. Use 'pretty' or 'json'"))),
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
    /// Most verbose; includes every frame
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
            _ => Err(LoggingError::InvalidLevel(format!(
                "{s}. Use 'error', 'warn', 'info', 'debug', or 'trace'"
            ))),
        }
    }
}

/// Initialize console logging from the environment.
///
/// Logs go to stderr so that command output on stdout stays clean. When
/// `EMMY_LOG_FILE` is set, the same events are also written to that file.
///
/// ## Errors
///
/// - `InitializationFailed`: a global subscriber is already installed
/// - `FileError`: the `EMMY_LOG_FILE` directory cannot be created
pub fn init_logging() -> Result<(), LoggingError>
{
    let default_level = env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse::<LogLevel>().ok())
        .map_or(Level::INFO, Into::into);

    init_console(format_from_env(), filter_from_env(default_level))
}

/// Initialize console logging with an explicit level and format.
///
/// `RUST_LOG` is ignored: an explicit level (typically `--log-level`) wins.
///
/// ## Errors
///
/// - `InitializationFailed`: a global subscriber is already installed
/// - `FileError`: the `EMMY_LOG_FILE` directory cannot be created
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<(), LoggingError>
{
    init_console(format, EnvFilter::new(Level::from(level).to_string()))
}

/// Initialize file-only logging for the engine inside a target process.
///
/// The file is `<temp_dir>/emmy/YYYY-MM-DD-emmy-<pid>.log`; its path is
/// returned so it can be reported to the front-end.
///
/// ## Errors
///
/// - `InitializationFailed`: the host process already installed a subscriber
/// - `FileError`: the log directory cannot be created
pub fn init_logging_to_file(level: Option<LogLevel>) -> Result<PathBuf, LoggingError>
{
    let log_file = engine_log_path(&env::temp_dir(), Utc::now().date_naive(), std::process::id());
    if let Some(dir) = log_file.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let filter = match level {
        Some(level) => EnvFilter::new(Level::from(level).to_string()),
        None => filter_from_env(Level::INFO),
    };
    let layer = build_layer(format_from_env(), file_writer(&log_file), false, filter);
    install(vec![layer])?;
    Ok(log_file)
}

/// Where the engine of process `pid` logs on `date`.
pub fn engine_log_path(temp_dir: &Path, date: NaiveDate, pid: u32) -> PathBuf
{
    temp_dir
        .join("emmy")
        .join(format!("{}-emmy-{pid}.log", date.format("%Y-%m-%d")))
}

fn format_from_env() -> LogFormat
{
    env::var(ENV_LOG_FORMAT)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LogFormat::Pretty)
}

/// `RUST_LOG` may carry per-module directives, so it is parsed as a filter
/// rather than a bare level.
fn filter_from_env(default_level: Level) -> EnvFilter
{
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level.to_string()))
}

fn init_console(format: LogFormat, filter: EnvFilter) -> Result<(), LoggingError>
{
    let mut layers = vec![build_layer(format, io::stderr, true, filter.clone())];

    if let Some(path) = env::var_os(ENV_LOG_FILE).map(PathBuf::from) {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        layers.push(build_layer(format, file_writer(&path), false, filter));
    }

    install(layers)
}

/// Non-blocking writer appending to `path`.
///
/// The worker guard is leaked: the subscriber lives for the rest of the
/// process and dropping the guard would stop the writer thread.
fn file_writer(path: &Path) -> tracing_appender::non_blocking::NonBlocking
{
    let appender = tracing_appender::rolling::never(
        path.parent().unwrap_or_else(|| Path::new(".")),
        path.file_name().unwrap_or_default(),
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    std::mem::forget(guard);
    non_blocking
}

fn build_layer<W>(format: LogFormat, writer: W, ansi: bool, filter: EnvFilter) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339());

    match format {
        LogFormat::Pretty => base.with_ansi(ansi).with_filter(filter).boxed(),
        LogFormat::Json => base
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
    }
}

fn install(layers: Vec<BoxedLayer>) -> Result<(), LoggingError>
{
    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| LoggingError::InitializationFailed(e.to_string()))
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0}")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    /// A global subscriber is already installed
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
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
        assert!(matches!(LogFormat::from_str("xml"), Err(LoggingError::InvalidFormat(_))));
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
    fn test_engine_log_path()
    {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let path = engine_log_path(Path::new("/tmp"), date, 4242);
        assert_eq!(path, Path::new("/tmp/emmy/2024-03-09-emmy-4242.log"));
    }
}
