//! Muxcore Telemetry - logging and tracing setup for the daemon.
//!
//! Provides configurable `tracing` subscriber construction (pretty/compact/
//! json/full formats, stdout/stderr/rolling-file targets) and a
//! `RequestContext`/`RequestGuard` pair for correlating spans across the
//! Router, Connection Manager, and Run Executor.
//!
//! # Example
//!
//! ```rust,no_run
//! use muxcore_telemetry::{LogConfig, LogFormat, setup_logging, RequestContext};
//!
//! # fn main() -> Result<(), muxcore_telemetry::TelemetryError> {
//! let config = LogConfig::new("info").with_format(LogFormat::Json);
//! setup_logging(&config)?;
//!
//! let ctx = RequestContext::new("router").with_operation("route_tool_call");
//! let _guard = ctx.span().entered();
//! tracing::info!("routing tool call");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod context;
mod error;
mod logging;

pub use context::{RequestContext, RequestGuard};
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
