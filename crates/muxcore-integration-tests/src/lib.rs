#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]
//! Integration test crate for the coordination core.
//!
//! This crate exists solely for end-to-end testing. It is `publish =
//! false` and has no library code — all tests live in `tests/`.
