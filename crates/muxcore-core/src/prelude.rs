//! Convenience re-exports for crates that depend on `muxcore-core`.

pub use crate::error::{CoreError, CoreResult, ErrorKind};
pub use crate::ids::{
    ArtefactId, ApprovalId, CitationId, QualifiedToolName, RunId, ServerId, StepId,
};
pub use crate::retry::BackoffConfig;
pub use crate::time::{Deadline, Jitter, Stopwatch, Timestamp, now};
