//! Runtime configuration.
//!
//! Loaded from a JSON file with per-field defaults, then overlaid with
//! `PULSE_*` environment variables.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::checks::clients::ClientCatalog;
use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub queue: QueueConfig,
    pub probe: ProbeConfig,
    pub notifications: NotificationConfig,
    pub storage: StorageConfig,
    pub clients: ClientCatalog,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub workers: usize,
    pub capacity: usize,
    pub shutdown_grace_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            capacity: 100,
            shutdown_grace_secs: 30,
        }
    }
}

impl QueueConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Reachability probe against an instance's SSH port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub port: u16,
    pub domain: String,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub banner_prefix: String,
    pub banner_len: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            port: 22,
            domain: "ethpandaops.io".to_string(),
            connect_timeout_ms: 2_000,
            read_timeout_ms: 3_000,
            banner_prefix: "SSH-".to_string(),
            banner_len: 8,
        }
    }
}

impl ProbeConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub ssh_user: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            ssh_user: "devops".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            prefix: "pulse".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub namespace: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            namespace: "pulse".to_string(),
        }
    }
}

impl PulseConfig {
    /// Load from a JSON file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config: PulseConfig = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config
            .apply_env(|key| std::env::var(key).ok())
            .context("invalid environment override")?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = PulseConfig::default();
        config
            .apply_env(|key| std::env::var(key).ok())
            .context("invalid environment override")?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PULSE_WORKERS") {
            self.queue.workers = parse_env("PULSE_WORKERS", &v)?;
        }
        if let Some(v) = lookup("PULSE_QUEUE_CAPACITY") {
            self.queue.capacity = parse_env("PULSE_QUEUE_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("PULSE_SHUTDOWN_GRACE_SECS") {
            self.queue.shutdown_grace_secs = parse_env("PULSE_SHUTDOWN_GRACE_SECS", &v)?;
        }
        if let Some(v) = lookup("PULSE_PROBE_DOMAIN") {
            self.probe.domain = v;
        }
        if let Some(v) = lookup("PULSE_PROBE_PORT") {
            self.probe.port = parse_env("PULSE_PROBE_PORT", &v)?;
        }
        if let Some(v) = lookup("PULSE_SSH_USER") {
            self.notifications.ssh_user = v;
        }
        if let Some(v) = lookup("PULSE_STORAGE_PREFIX") {
            self.storage.prefix = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.workers == 0 {
            return Err(ConfigError::Invalid("queue.workers must be at least 1".to_string()));
        }
        if self.queue.capacity == 0 {
            return Err(ConfigError::Invalid("queue.capacity must be at least 1".to_string()));
        }
        if self.probe.banner_len < self.probe.banner_prefix.len() {
            return Err(ConfigError::Invalid(
                "probe.banner_len must cover probe.banner_prefix".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = PulseConfig::default();
        assert_eq!(config.queue.workers, 4);
        assert_eq!(config.queue.capacity, 100);
        assert_eq!(config.probe.port, 22);
        assert_eq!(config.probe.connect_timeout(), Duration::from_secs(2));
        assert_eq!(config.probe.read_timeout(), Duration::from_secs(3));
        assert_eq!(config.probe.banner_prefix, "SSH-");
        assert_eq!(config.notifications.ssh_user, "devops");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: PulseConfig =
            serde_json::from_str(r#"{"queue": {"workers": 8}, "probe": {"domain": "example.org"}}"#)
                .unwrap();
        assert_eq!(config.queue.workers, 8);
        assert_eq!(config.queue.capacity, 100);
        assert_eq!(config.probe.domain, "example.org");
        assert_eq!(config.probe.port, 22);
        assert!(config.clients.is_pre_production("ethereumjs"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [("PULSE_WORKERS", "2"), ("PULSE_SSH_USER", "ops")]
            .into_iter()
            .collect();
        let mut config = PulseConfig::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.queue.workers, 2);
        assert_eq!(config.notifications.ssh_user, "ops");
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = PulseConfig::default();
        let err = config
            .apply_env(|k| (k == "PULSE_QUEUE_CAPACITY").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = PulseConfig::default();
        config.queue.workers = 0;
        assert!(config.validate().is_err());
    }
}
