//! Client catalog and node-name parsing.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Layer a monitored client runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    Consensus,
    Execution,
    /// Wildcard used when running checks across every client.
    All,
}

impl ClientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientType::Consensus => "consensus",
            ClientType::Execution => "execution",
            ClientType::All => "all",
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientType::Consensus => write!(f, "Consensus"),
            ClientType::Execution => write!(f, "Execution"),
            ClientType::All => write!(f, ".*"),
        }
    }
}

/// The (consensus, execution) pair encoded in a node name such as
/// `lighthouse-geth-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientPair {
    pub consensus: String,
    pub execution: String,
}

impl ClientPair {
    /// Parse the first two hyphen components. Names with fewer than two
    /// non-empty components yield `None`.
    pub fn parse(node_name: &str) -> Option<Self> {
        let mut parts = node_name.split('-');
        let consensus = parts.next().filter(|p| !p.is_empty())?;
        let execution = parts.next().filter(|p| !p.is_empty())?;
        Some(Self {
            consensus: consensus.to_string(),
            execution: execution.to_string(),
        })
    }

    pub fn components(&self) -> [&str; 2] {
        [&self.consensus, &self.execution]
    }
}

/// Static client tables: known clients per layer, pre-production clients
/// and team roles used for mentions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientCatalog {
    pub consensus: Vec<String>,
    pub execution: Vec<String>,
    pub pre_production: BTreeSet<String>,
    pub team_roles: BTreeMap<String, String>,
}

impl Default for ClientCatalog {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            consensus: owned(&["lighthouse", "prysm", "lodestar", "nimbus", "teku", "grandine"]),
            execution: owned(&["nethermind", "besu", "geth", "reth", "erigon", "ethereumjs"]),
            pre_production: ["ethereumjs", "nimbusel", "erigonTwo"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            team_roles: [
                ("lighthouse", "sigmaprime"),
                ("prysm", "prysmatic"),
                ("lodestar", "chainsafe"),
                ("nimbus", "nimbus"),
                ("teku", "teku"),
                ("grandine", "grandine"),
                ("nethermind", "nethermind"),
                ("nimbusel", "nimbus"),
                ("besu", "besu"),
                ("geth", "geth"),
                ("reth", "reth"),
                ("erigon", "erigon"),
                ("ethereumjs", "ethereumjs"),
            ]
            .iter()
            .map(|(client, role)| (client.to_string(), role.to_string()))
            .collect(),
        }
    }
}

impl ClientCatalog {
    pub fn is_consensus(&self, client: &str) -> bool {
        self.consensus.iter().any(|c| c == client)
    }

    pub fn is_execution(&self, client: &str) -> bool {
        self.execution.iter().any(|c| c == client)
    }

    pub fn is_pre_production(&self, client: &str) -> bool {
        self.pre_production.contains(client)
    }

    /// Resolve the layer of a known client.
    pub fn client_type(&self, client: &str) -> Option<ClientType> {
        if self.is_consensus(client) {
            Some(ClientType::Consensus)
        } else if self.is_execution(client) {
            Some(ClientType::Execution)
        } else {
            None
        }
    }

    pub fn team_role(&self, client: &str) -> Option<&str> {
        self.team_roles.get(client).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_client_pair() {
        let pair = ClientPair::parse("lighthouse-geth-1").unwrap();
        assert_eq!(pair.consensus, "lighthouse");
        assert_eq!(pair.execution, "geth");
        assert_eq!(pair.components(), ["lighthouse", "geth"]);

        assert!(ClientPair::parse("lighthouse").is_none());
        assert!(ClientPair::parse("-geth").is_none());
        assert!(ClientPair::parse("").is_none());
    }

    #[test]
    fn test_catalog_defaults() {
        let catalog = ClientCatalog::default();
        assert_eq!(catalog.client_type("nimbus"), Some(ClientType::Consensus));
        assert_eq!(catalog.client_type("geth"), Some(ClientType::Execution));
        assert_eq!(catalog.client_type("unknown"), None);
        assert!(catalog.is_pre_production("ethereumjs"));
        assert!(!catalog.is_pre_production("geth"));
        assert_eq!(catalog.team_role("lighthouse"), Some("sigmaprime"));
        assert_eq!(catalog.team_role("nimbusel"), Some("nimbus"));
    }

    #[test]
    fn test_client_type_display() {
        assert_eq!(ClientType::Consensus.to_string(), "Consensus");
        assert_eq!(ClientType::All.to_string(), ".*");
        assert_eq!(ClientType::Execution.as_str(), "execution");
    }
}
