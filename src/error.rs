//! Error types.
//!
//! State conditions (a target already in flight, a network without enough
//! history) are not errors and are modelled as statuses elsewhere. The one
//! exception is `SnapshotError::InsufficientHistory`, which callers match on
//! and treat as "nothing to compare".

use thiserror::Error;

/// Failure of a single evaluation.
#[derive(Debug, Error)]
pub enum PulseError {
    #[error("check execution failed: {0}")]
    CheckExecution(String),

    #[error("test result fetch failed: {0}")]
    TestResults(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("unsupported client type for evaluation: {0}")]
    UnsupportedClientType(String),

    #[error("evaluation cancelled")]
    Cancelled,

    #[error("evaluation panicked: {0}")]
    Panicked(String),
}

/// Object-store level failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("failed to encode or decode {key}: {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Historical snapshot failures.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("insufficient history for network {network}: found {found} snapshot(s)")]
    InsufficientHistory { network: String, found: usize },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, PulseError>;
