//! Muxcore Registry - server registry and capability cache.
//!
//! One entry per configured tool server: its immutable descriptor, current
//! session, discovered tool schemas, heartbeat health, and circuit breaker
//! state. Readers (the Router) observe a consistent, versioned snapshot;
//! writers (the Connection Manager) publish a whole new snapshot under one
//! commit so no reader ever sees, say, refreshed schemas paired with a
//! stale breaker state.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod descriptor;
pub mod entry;
pub mod error;
pub mod health;
#[allow(clippy::module_inception)]
mod registry;
pub mod schema;
pub mod snapshot;

pub use descriptor::{AuthMaterialRef, ServerDescriptor, ServerPolicy};
pub use entry::ServerEntry;
pub use error::{RegistryError, RegistryResult};
pub use health::{BreakerState, Health};
pub use registry::Registry;
pub use schema::ToolSchema;
pub use snapshot::RegistrySnapshot;
