//! Notification decision module.
//!
//! Decides whether an evaluation warrants alerting operators:
//! - Suppressed: target not implicated, nothing failing, or only
//!   infrastructure/unrelated instances affected
//! - Sent: payload with instance buckets, regressions and mentions

pub mod engine;
pub mod payload;
pub mod sink;

pub use engine::*;
pub use payload::*;
pub use sink::*;
