//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while configuring or initializing telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The supplied `LogConfig` could not be turned into a filter.
    #[error("telemetry configuration error: {0}")]
    ConfigError(String),

    /// `tracing_subscriber`'s global subscriber could not be installed.
    #[error("telemetry initialization error: {0}")]
    InitError(String),

    /// Creating the log directory or file appender failed.
    #[error("telemetry IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
