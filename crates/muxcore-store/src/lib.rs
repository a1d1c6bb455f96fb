//! Muxcore Store - durable, append-only log of runs, steps, approvals,
//! artefacts, and citations (spec §4.6).
//!
//! Backed by `SurrealDB` (`SurrealKV` embedded engine in production, an
//! in-memory engine for tests) behind a shared `Database` wrapper. A
//! run is either fully committed at each step
//! append or not at all; `ordinal` is enforced dense and monotonic within
//! a run; a run's `status` may only move through the graph in
//! [`is_allowed_transition`]; approvals resolve at most once.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod model;
mod store;

pub use error::{StoreError, StoreResult};
pub use model::{
    ApprovalDecision, ApprovalRecord, ArtefactRecord, CitationRecord, RunBudgets, RunRecord, RunStatus, RunTotals,
    StepOutcome, StepRecord,
};
pub use store::{RunStore, is_allowed_transition};
