//! Configuration load and validation errors.

use thiserror::Error;

/// Errors that can occur loading or validating the daemon's configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read from disk.
    #[error("failed to read config file {path}: {source}")]
    IoError {
        /// Path that could not be read.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file's contents were not valid YAML for this schema.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path that failed to parse.
        path: String,
        /// Underlying parse error.
        #[source]
        source: serde_yaml::Error,
    },

    /// A deserialized configuration failed a cross-field or referential
    /// validation rule.
    #[error("invalid configuration at {field}: {message}")]
    ValidationError {
        /// Dotted path to the offending field, e.g. `"servers[1].policy.deny_tools[0]"`.
        field: String,
        /// Human-readable description of the problem.
        message: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
