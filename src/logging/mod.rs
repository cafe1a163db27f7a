//! Structured logging module.
//!
//! Every log line carries the evaluation's check ID and target so a single
//! evaluation can be followed through the queue, classifier and decision engine.

pub mod structured;

pub use structured::*;
