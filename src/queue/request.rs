//! Evaluation requests and outcomes.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::checks::clients::ClientType;
use crate::error::PulseError;
use crate::storage::models::MonitoredTarget;

/// Identity used for in-flight deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetKey {
    pub network: String,
    pub client: String,
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.network, self.client)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub network: String,
    pub client: String,
    pub client_type: ClientType,
    pub channel: String,
}

impl EvaluationRequest {
    pub fn new(network: &str, client: &str, client_type: ClientType, channel: &str) -> Self {
        Self {
            network: network.to_string(),
            client: client.to_string(),
            client_type,
            channel: channel.to_string(),
        }
    }

    pub fn key(&self) -> TargetKey {
        TargetKey {
            network: self.network.clone(),
            client: self.client.clone(),
        }
    }
}

impl From<&MonitoredTarget> for EvaluationRequest {
    fn from(target: &MonitoredTarget) -> Self {
        Self::new(&target.network, &target.client, target.client_type, &target.channel)
    }
}

/// Terminal result of one accepted request.
#[derive(Debug)]
pub struct EvaluationOutcome {
    pub key: TargetKey,
    /// `None` when the request never started.
    pub check_id: Option<String>,
    pub notification_sent: bool,
    pub error: Option<PulseError>,
    pub duration: Duration,
}

impl EvaluationOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
