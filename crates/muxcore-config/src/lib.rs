//! Muxcore Config - single-file startup configuration.
//!
//! Loads the `servers`/`runs`/`sessions` YAML document spec §6 describes,
//! validates it, and hands back plain types other crates convert into
//! their own runtime handles (`muxcore_registry::ServerDescriptor`,
//! `muxcore_connection::ConnectionConfig`, ...). A single-file contract
//! rather than a layered defaults/system/user/workspace/env precedence
//! merge: there is no hot reload, so a second `load_file` call from a
//! restarted process is the only reload path.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod loader;
mod model;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::load_file;
pub use model::{
    ArtefactsConfig, Config, RateConfig, RetryConfig, RunsConfig, ServerConfigEntry,
    ServerPolicyConfig, SessionsConfig, StopConfig,
};
