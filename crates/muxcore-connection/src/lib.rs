//! Muxcore Connection - owns session lifecycles for every configured tool
//! server: initial connect, capability discovery, heartbeats, reconnect
//! with exponential backoff, circuit breaker, and graceful shutdown.
//!
//! One worker task per [`muxcore_registry::ServerDescriptor`] runs the
//! connect/discover/heartbeat loop and publishes every observation into the
//! shared [`muxcore_registry::Registry`]; the Router reads that registry
//! and never talks to a worker directly.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
mod manager;
#[cfg(test)]
mod tests;
mod worker;

pub use config::ConnectionConfig;
pub use manager::ConnectionManager;
