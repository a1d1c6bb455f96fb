//! Muxcore Artefacts - content-addressed blob store (spec §4.7).
//!
//! `put` hashes bytes with `blake3` and is idempotent; `get` returns the
//! full blob or `NotFound`, never a partial one, because a blob's chunks
//! are all written before its manifest, and only the manifest's presence
//! makes a `get` succeed. Retention is swept explicitly and is
//! independent of which runs still reference an artefact.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod retention;
mod store;

pub use error::{ArtefactError, ArtefactResult};
pub use retention::RetentionPolicy;
pub use store::ArtefactStore;
