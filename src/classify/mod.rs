//! Instance classification module.
//!
//! Separates instances that need operator attention from those explained
//! by infrastructure outages or by other, already-known failing clients.

pub mod classifier;
pub mod instance;
pub mod probe;

pub use classifier::*;
pub use instance::*;
pub use probe::*;
