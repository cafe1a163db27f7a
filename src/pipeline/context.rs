//! Evaluation context management.
//!
//! Provides the check ID, target and cancellation token for one evaluation.

use std::future::Future;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{PulseError, Result};
use crate::logging::structured::LogContext;

/// Context for one evaluation of a target.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub check_id: String,
    pub network: String,
    pub client: String,
    pub started_at: DateTime<Utc>,
    cancel: CancellationToken,
}

impl EvaluationContext {
    pub fn new(network: &str, client: &str) -> Self {
        Self::with_cancellation(network, client, CancellationToken::new())
    }

    pub fn with_cancellation(network: &str, client: &str, cancel: CancellationToken) -> Self {
        let started_at = Utc::now();
        Self {
            check_id: generate_check_id(started_at),
            network: network.to_string(),
            client: client.to_string(),
            started_at,
            cancel,
        }
    }

    pub fn log_context(&self) -> LogContext {
        LogContext::new(&self.check_id).with_target(&self.network, &self.client)
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `fut` to completion unless the evaluation is cancelled first.
    pub async fn run_until_cancelled<F>(&self, fut: F) -> Result<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PulseError::Cancelled),
            output = fut => Ok(output),
        }
    }
}

/// Check ID: UTC `YYYYMMDD-HHMMSS` followed by 8 random bytes in hex.
pub fn generate_check_id(at: DateTime<Utc>) -> String {
    let random = Uuid::new_v4();
    format!(
        "{}-{}",
        at.format("%Y%m%d-%H%M%S"),
        hex::encode(&random.as_bytes()[..8])
    )
}
