//! Muxcore Executor - the Run Executor (spec §4.8).
//!
//! Drives an admitted run through its plan/critic/dispatch loop to a
//! terminal status: `Queued -> Running -> (PausedForApproval -> Running)*
//! -> Succeeded | Failed | Cancelled`. One [`supervisor::ExecutorSupervisor`]
//! owns one [`worker`] task per in-flight run; a [`plan::PlanSource`]
//! supplies the ordered steps a run executes, and a [`critic::Critic`]
//! checks each proposed step's citation and approval prerequisites
//! before it is ever dispatched through the Router.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod critic;
pub mod error;
pub mod plan;
pub mod supervisor;
pub mod worker;

pub use critic::{Critic, RejectionCode, Verdict};
pub use error::{ExecutorError, ExecutorResult};
pub use plan::{PlanSource, ProposedStep, StaticPlan};
pub use supervisor::ExecutorSupervisor;
pub use worker::WorkerConfig;
