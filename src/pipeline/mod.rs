//! Evaluation pipeline module.
//!
//! Runs one target evaluation end to end:
//! - Checks and correlation
//! - Snapshot persistence and regression detection
//! - Notification decision and delivery
//! - Scheduled enqueueing of enabled targets

pub mod context;
pub mod evaluator;
pub mod trigger;

pub use context::*;
pub use evaluator::*;
pub use trigger::*;
