//! Storage module.
//!
//! Object-store backed repositories for monitored targets and historical
//! test-result snapshots.

pub mod keys;
pub mod models;
pub mod object;
pub mod snapshots;
pub mod targets;

pub use keys::*;
pub use models::*;
pub use object::*;
pub use snapshots::*;
pub use targets::*;
