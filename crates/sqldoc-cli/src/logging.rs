//! Logging for the sqldoc binary
//!
//! Console output goes to stderr so stdout carries only the run summary. An
//! optional JSON layer writes daily rolling files for later inspection.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Crates whose debug output drowns ours
const QUIET_DEPENDENCIES: &str = "tiberius=warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for JSON log files; none disables the file layer
    pub log_dir: Option<PathBuf>,

    /// Default filter, used when RUST_LOG is not set
    pub default_filter: String,

    /// Whether to include file/line information on the console
    pub include_location: bool,
}

impl LoggingConfig {
    pub fn new(level: &str, verbosity: Verbosity, log_dir: Option<PathBuf>) -> Self {
        let level = match verbosity {
            Verbosity::Quiet => "warn",
            Verbosity::Normal => level,
            Verbosity::Verbose => "debug",
        };
        Self {
            log_dir,
            default_filter: format!("{},{}", level, QUIET_DEPENDENCIES),
            include_location: verbosity == Verbosity::Verbose,
        }
    }
}

/// Default directory for JSON logs
pub fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sqldoc")
        .join("logs")
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer when dropped and must be held
/// until the program exits.
pub fn init(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    // RUST_LOG takes precedence over the configured filter
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let console_layer = fmt::layer()
        .with_target(config.include_location)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_writer(std::io::stderr)
        .with_filter(env_filter.clone())
        .boxed();
    let mut layers = vec![console_layer];

    let mut guard = None;
    if let Some(log_dir) = &config.log_dir {
        std::fs::create_dir_all(log_dir)?;
        let file_appender = tracing_appender::rolling::daily(log_dir, "sqldoc.log");
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(worker_guard);

        let json_layer = fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(non_blocking)
            .with_filter(env_filter)
            .boxed();
        layers.push(json_layer);
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::debug!(
        filter = %config.default_filter,
        log_dir = ?config.log_dir,
        "logging initialized"
    );
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_picks_filter() {
        assert_eq!(
            LoggingConfig::new("info", Verbosity::Normal, None).default_filter,
            "info,tiberius=warn"
        );
        assert_eq!(
            LoggingConfig::new("info", Verbosity::Quiet, None).default_filter,
            "warn,tiberius=warn"
        );
        let verbose = LoggingConfig::new("info", Verbosity::Verbose, None);
        assert_eq!(verbose.default_filter, "debug,tiberius=warn");
        assert!(verbose.include_location);
    }

    #[test]
    fn test_log_directory_is_app_scoped() {
        assert!(log_directory().ends_with("sqldoc/logs"));
    }
}
