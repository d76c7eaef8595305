//! Logging setup for the client runtime
//!
//! The host picks a severity at `startup`; `PSMOVE_LOG` (or `RUST_LOG`) can
//! override it with a full `tracing` filter directive.

use std::str::FromStr;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Minimum severity of log output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LogSeverity {
    Trace,
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Fatal,
}

impl LogSeverity {
    /// Equivalent `tracing` filter. `Fatal` maps to errors only.
    pub fn level_filter(self) -> LevelFilter {
        match self {
            LogSeverity::Trace => LevelFilter::TRACE,
            LogSeverity::Debug => LevelFilter::DEBUG,
            LogSeverity::Info => LevelFilter::INFO,
            LogSeverity::Warning => LevelFilter::WARN,
            LogSeverity::Error | LogSeverity::Fatal => LevelFilter::ERROR,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            LogSeverity::Trace => "trace",
            LogSeverity::Debug => "debug",
            LogSeverity::Info => "info",
            LogSeverity::Warning => "warning",
            LogSeverity::Error => "error",
            LogSeverity::Fatal => "fatal",
        }
    }
}

impl std::fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogSeverity {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogSeverity::Trace),
            "debug" => Ok(LogSeverity::Debug),
            "info" => Ok(LogSeverity::Info),
            "warn" | "warning" => Ok(LogSeverity::Warning),
            "error" => Ok(LogSeverity::Error),
            "fatal" => Ok(LogSeverity::Fatal),
            other => Err(LoggingError::InvalidSeverity(other.to_string())),
        }
    }
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("Unknown log severity: {0}")]
    InvalidSeverity(String),
}

/// Install a stderr subscriber at the given severity
///
/// Does nothing if a global subscriber is already installed, whether by an
/// earlier call or by the host application.
pub fn init_logging(severity: LogSeverity) -> Result<(), LoggingError> {
    if is_initialized() {
        return Ok(());
    }

    let filter = create_env_filter(severity)?;

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .compact()
        .try_init();

    match result {
        Ok(()) => Ok(()),
        // Lost a race with another initializer
        Err(_) if is_initialized() => Ok(()),
        Err(e) => Err(LoggingError::TracingInit(e.to_string())),
    }
}

/// Check if a global subscriber has been installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}

/// `PSMOVE_LOG`, then `RUST_LOG`, then the requested severity
fn create_env_filter(severity: LogSeverity) -> Result<EnvFilter, LoggingError> {
    let directive = std::env::var("PSMOVE_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| severity.level_filter().to_string());

    EnvFilter::try_new(&directive).map_err(|e| LoggingError::InvalidFilter(e.to_string()))
}
