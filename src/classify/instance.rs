//! Instance identity.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::checks::clients::ClientPair;

/// A running node, addressable by name within its network.
///
/// Equality and ordering use the name only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    pub network: String,
    pub client: String,
}

impl Instance {
    pub fn new(name: &str, network: &str, client: &str) -> Self {
        Self {
            name: name.to_string(),
            network: network.to_string(),
            client: client.to_string(),
        }
    }

    /// Fully-qualified host name, e.g. `nimbus-geth-1.devnet-7.ethpandaops.io`.
    pub fn hostname(&self, domain: &str) -> String {
        format!("{}.{}.{}", self.name, self.network, domain)
    }

    /// Access hint shown next to regular instances.
    pub fn ssh_command(&self, user: &str, domain: &str) -> String {
        format!("ssh {}@{}", user, self.hostname(domain))
    }

    pub fn client_pair(&self) -> Option<ClientPair> {
        ClientPair::parse(&self.name)
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Instance {}

impl PartialOrd for Instance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Instance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl std::hash::Hash for Instance {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostname_and_ssh_command() {
        let instance = Instance::new("nimbus-geth-1", "devnet-7", "nimbus");
        assert_eq!(
            instance.hostname("ethpandaops.io"),
            "nimbus-geth-1.devnet-7.ethpandaops.io"
        );
        assert_eq!(
            instance.ssh_command("devops", "ethpandaops.io"),
            "ssh devops@nimbus-geth-1.devnet-7.ethpandaops.io"
        );
    }

    #[test]
    fn test_equality_by_name() {
        let a = Instance::new("nimbus-geth-1", "devnet-7", "nimbus");
        let b = Instance::new("nimbus-geth-1", "devnet-8", "geth");
        assert_eq!(a, b);
        assert_eq!(a.client_pair().unwrap().execution, "geth");
    }
}
