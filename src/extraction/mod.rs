//! Instance extraction module.
//!
//! Pulls affected node names for a target client out of check details.

pub mod instances;

pub use instances::*;
