//! Root-cause correlation.
//!
//! Aggregates failing nodes across a check run into root-cause clients and
//! unexplained issues:
//! - Consensus target: an execution client failing alongside more than
//!   `MIN_FAILURES_FOR_ROOT_CAUSE` distinct consensus clients is a root cause.
//! - Execution target: more than `MIN_FAILURES_FOR_ROOT_CAUSE` failing target
//!   nodes make the target itself the root cause.
//!
//! Failing target nodes that no root cause explains become unexplained issues.

use std::collections::{BTreeMap, BTreeSet};

use crate::logging::structured::LogContext;

use super::clients::{ClientPair, ClientType};
use super::result::AnalysisResult;

/// Failures must exceed this count to name a root cause.
pub const MIN_FAILURES_FOR_ROOT_CAUSE: usize = 2;

#[derive(Debug, Clone)]
struct NodeStatus {
    name: String,
    healthy: bool,
}

/// Correlator for one target client.
#[derive(Debug)]
pub struct Correlator {
    target: String,
    client_type: ClientType,
    nodes: BTreeMap<ClientPair, Vec<NodeStatus>>,
}

impl Correlator {
    pub fn new(target: &str, client_type: ClientType) -> Self {
        Self {
            target: target.to_string(),
            client_type,
            nodes: BTreeMap::new(),
        }
    }

    /// Record a node observation. Names that carry no client pair are ignored.
    pub fn add_node_status(&mut self, node_name: &str, healthy: bool) {
        let Some(pair) = ClientPair::parse(node_name) else {
            return;
        };
        self.nodes.entry(pair).or_default().push(NodeStatus {
            name: node_name.to_string(),
            healthy,
        });
    }

    pub fn analyze(&self, ctx: &LogContext) -> AnalysisResult {
        let (root_cause, root_cause_evidence) = match self.client_type {
            ClientType::Consensus => self.root_causes_for_consensus(),
            ClientType::Execution => self.root_causes_for_execution(),
            ClientType::All => {
                crate::log_warn!(ctx, "CORRELATION_SKIPPED", reason = "wildcard_client_type");
                (BTreeSet::new(), BTreeMap::new())
            }
        };

        let unexplained_issues = self.unexplained_issues(&root_cause);

        for cause in &root_cause {
            log::info!(
                "{} ROOT_CAUSE_IDENTIFIED client={} evidence={:?}",
                ctx,
                cause,
                root_cause_evidence.get(cause)
            );
        }
        crate::log_info!(
            ctx,
            "CORRELATION_COMPLETE",
            root_causes = root_cause.len(),
            unexplained = unexplained_issues.len()
        );

        AnalysisResult {
            root_cause,
            unexplained_issues,
            root_cause_evidence,
        }
    }

    fn is_target_pair(&self, pair: &ClientPair) -> bool {
        match self.client_type {
            ClientType::Consensus => pair.consensus == self.target,
            ClientType::Execution => pair.execution == self.target,
            ClientType::All => false,
        }
    }

    fn root_causes_for_consensus(&self) -> (BTreeSet<String>, BTreeMap<String, String>) {
        // execution client -> consensus peers it fails with, first-seen order
        let mut failing: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (pair, statuses) in &self.nodes {
            let peers = failing.entry(pair.execution.as_str()).or_default();
            if statuses.iter().any(|s| !s.healthy) && !peers.contains(&pair.consensus.as_str()) {
                peers.push(pair.consensus.as_str());
            }
        }

        let mut causes = BTreeSet::new();
        let mut evidence = BTreeMap::new();
        for (execution, peers) in failing {
            if peers.len() > MIN_FAILURES_FOR_ROOT_CAUSE {
                causes.insert(execution.to_string());
                evidence.insert(
                    execution.to_string(),
                    format!("Failing with {} CL clients: {}", peers.len(), peers.join(", ")),
                );
            }
        }
        (causes, evidence)
    }

    fn root_causes_for_execution(&self) -> (BTreeSet<String>, BTreeMap<String, String>) {
        let failures: Vec<&str> = self
            .nodes
            .iter()
            .filter(|(pair, _)| self.is_target_pair(pair))
            .flat_map(|(_, statuses)| statuses.iter())
            .filter(|s| !s.healthy)
            .map(|s| s.name.as_str())
            .collect();

        let mut causes = BTreeSet::new();
        let mut evidence = BTreeMap::new();
        if failures.len() > MIN_FAILURES_FOR_ROOT_CAUSE {
            causes.insert(self.target.clone());
            evidence.insert(
                self.target.clone(),
                format!("Failing with {} nodes: {}", failures.len(), failures.join(", ")),
            );
        }
        (causes, evidence)
    }

    fn is_explained(&self, pair: &ClientPair, root_causes: &BTreeSet<String>) -> bool {
        match self.client_type {
            ClientType::Consensus => root_causes.contains(&pair.execution),
            ClientType::Execution => {
                root_causes.contains(&self.target) || root_causes.contains(&pair.consensus)
            }
            ClientType::All => false,
        }
    }

    fn unexplained_issues(&self, root_causes: &BTreeSet<String>) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut issues = Vec::new();
        for (pair, statuses) in &self.nodes {
            if !self.is_target_pair(pair) || self.is_explained(pair, root_causes) {
                continue;
            }
            for status in statuses.iter().filter(|s| !s.healthy) {
                if seen.insert(status.name.clone()) {
                    issues.push(status.name.clone());
                }
            }
        }
        issues
    }
}
