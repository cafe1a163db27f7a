//! Persisted models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checks::clients::ClientType;

/// A registered (network, client) pair and where to deliver its alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredTarget {
    pub network: String,
    pub client: String,
    pub client_type: ClientType,
    pub channel: String,
    /// Cron expression consumed by the external scheduler.
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(default)]
    pub last_check_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn enabled_default() -> bool {
    true
}

impl MonitoredTarget {
    pub fn new(network: &str, client: &str, client_type: ClientType, channel: &str) -> Self {
        let now = Utc::now();
        Self {
            network: network.to_string(),
            client: client.to_string(),
            client_type,
            channel: channel.to_string(),
            schedule: None,
            enabled: true,
            last_check_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a completed evaluation.
    pub fn record_check(&mut self, check_id: &str, at: DateTime<Utc>) {
        self.last_check_id = Some(check_id.to_string());
        self.updated_at = at;
    }
}
