//! Regression detection module.
//!
//! Builds per-network test-result snapshots and diffs consecutive
//! snapshots into per-client, per-test-type regressions.

pub mod detector;
pub mod summary;

pub use detector::*;
pub use summary::*;
