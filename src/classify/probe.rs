//! Reachability probing.
//!
//! An instance is reachable when its SSH port accepts a TCP connection and
//! answers with an SSH banner within the read timeout.

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use crate::config::ProbeConfig;

use super::instance::Instance;

/// Result of probing one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable,
    ConnectFailed(String),
    ConnectTimeout,
    ReadTimeout,
    ReadFailed(String),
    UnexpectedBanner(String),
}

impl ProbeOutcome {
    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeOutcome::Reachable)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeOutcome::Reachable => "reachable",
            ProbeOutcome::ConnectFailed(_) => "connect_failed",
            ProbeOutcome::ConnectTimeout => "connect_timeout",
            ProbeOutcome::ReadTimeout => "read_timeout",
            ProbeOutcome::ReadFailed(_) => "read_failed",
            ProbeOutcome::UnexpectedBanner(_) => "unexpected_banner",
        }
    }
}

/// Probes whether an instance host is up.
///
/// Implementations never fail: every error is an outcome.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self, instance: &Instance) -> ProbeOutcome;
}

/// TCP connect plus banner check against the instance's SSH port.
#[derive(Debug, Clone)]
pub struct TcpBannerProbe {
    config: ProbeConfig,
}

impl TcpBannerProbe {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    pub fn address_for(&self, instance: &Instance) -> String {
        format!("{}:{}", instance.hostname(&self.config.domain), self.config.port)
    }

    /// Probe an explicit `host:port`.
    pub async fn probe_address(&self, address: &str) -> ProbeOutcome {
        let mut stream =
            match tokio::time::timeout(self.config.connect_timeout(), TcpStream::connect(address)).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => return ProbeOutcome::ConnectFailed(e.to_string()),
                Err(_) => return ProbeOutcome::ConnectTimeout,
            };

        let prefix = self.config.banner_prefix.as_bytes();
        let mut banner = vec![0u8; self.config.banner_len.max(prefix.len())];

        let read = tokio::time::timeout(self.config.read_timeout(), async {
            let mut filled = 0;
            while filled < prefix.len() {
                let n = stream.read(&mut banner[filled..]).await?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            Ok::<usize, std::io::Error>(filled)
        })
        .await;

        match read {
            Err(_) => ProbeOutcome::ReadTimeout,
            Ok(Err(e)) => ProbeOutcome::ReadFailed(e.to_string()),
            Ok(Ok(filled)) if banner[..filled].starts_with(prefix) => ProbeOutcome::Reachable,
            Ok(Ok(filled)) => {
                ProbeOutcome::UnexpectedBanner(String::from_utf8_lossy(&banner[..filled]).into_owned())
            }
        }
    }
}

#[async_trait]
impl ReachabilityProbe for TcpBannerProbe {
    async fn probe(&self, instance: &Instance) -> ProbeOutcome {
        let address = self.address_for(instance);
        let outcome = self.probe_address(&address).await;
        log::debug!(
            "PROBE_COMPLETE instance={} address={} outcome={}",
            instance.name,
            address,
            outcome.as_str()
        );
        outcome
    }
}
