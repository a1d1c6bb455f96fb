//! Muxcore Admission - the Admission Interface (spec §4.10).
//!
//! Five operations over shared handles to the Run Store, the Run
//! Executor's supervisor, and the event bus: `start_run`, `cancel_run`,
//! `resolve_approval`, `get_run`, `stream_events`. This crate has no
//! HTTP or transport code of its own - it is the boundary an outer
//! gateway layer (out of scope per spec §1) calls into, not the gateway
//! itself.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod admission;
mod error;
mod history;
mod snapshot;
#[cfg(test)]
mod tests;

pub use admission::{Admission, EventStream};
pub use error::{AdmissionError, AdmissionResult};
pub use snapshot::RunSnapshot;
