//! Single-file configuration loading.

use std::path::Path;

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::model::Config;
use crate::validate;

/// Load and validate the daemon's configuration from a single YAML file.
///
/// There is no precedence chain and no hot reload: spec §6 names
/// configuration as "loaded once at startup; reloadable only via full
/// restart", so a fresh process re-running this function is the only
/// supported reload path.
///
/// # Errors
///
/// Returns [`ConfigError::IoError`] if the file cannot be read,
/// [`ConfigError::ParseError`] if it is not valid YAML for this schema, or
/// [`ConfigError::ValidationError`] if it parses but fails a cross-field
/// check (duplicate `server_id`, a `policy` tool reference naming an
/// unconfigured server, and so on).
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let display_path = path.display().to_string();
    debug!(path = %display_path, "loading configuration");

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
        path: display_path.clone(),
        source,
    })?;

    let config: Config = serde_yaml::from_str(&raw).map_err(|source| ConfigError::ParseError {
        path: display_path.clone(),
        source,
    })?;

    validate::validate(&config)?;

    info!(path = %display_path, server_count = config.servers.len(), "configuration loaded");
    Ok(config)
}
