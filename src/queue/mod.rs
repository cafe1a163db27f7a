//! Evaluation queue module.
//!
//! Serializes evaluations per target and runs them on a bounded worker pool.

pub mod evaluation;
pub mod metrics;
pub mod request;

pub use evaluation::*;
pub use metrics::*;
pub use request::*;
