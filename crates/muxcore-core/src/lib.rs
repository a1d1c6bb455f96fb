//! Muxcore Core - foundation types shared across the coordination core.
//!
//! This crate provides:
//! - Opaque stable identifiers (`RunId`, `StepId`, `ServerId`, ...)
//! - Monotonic deadlines and wall-clock timestamps
//! - The core error taxonomy (`ErrorKind`, `CoreError`)
//! - Exponential backoff with jitter

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod ids;
pub mod prelude;
pub mod retry;
pub mod time;

pub use error::{CoreError, CoreResult, ErrorKind};
pub use ids::{ArtefactId, ApprovalId, CitationId, QualifiedToolName, RunId, ServerId, StepId};
pub use retry::BackoffConfig;
pub use time::{Deadline, Jitter, Stopwatch, Timestamp};
