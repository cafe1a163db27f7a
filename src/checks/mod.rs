//! Health check module.
//!
//! Check results, the client catalog, root-cause correlation and the
//! check executor seam.

pub mod clients;
pub mod correlator;
pub mod result;
pub mod runner;

pub use clients::*;
pub use correlator::*;
pub use result::*;
pub use runner::*;
