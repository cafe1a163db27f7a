//! Check execution.
//!
//! `CheckExecutor` is the seam the evaluation pipeline calls. `CheckRunner`
//! is the stock executor: it runs every registered check across all
//! clients of the network, correlates the failing nodes, then narrows the
//! failing results down to the target client.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{PulseError, Result};
use crate::pipeline::context::EvaluationContext;

use super::clients::ClientType;
use super::correlator::Correlator;
use super::result::{AnalysisResult, Category, CheckResult};

/// Matches every client in a check query.
pub const CLIENT_WILDCARD: &str = ".*";

/// Detail key that is kept verbatim when narrowing results.
const QUERY_DETAIL_KEY: &str = "query";

/// What to evaluate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    pub network: String,
    pub client: String,
    pub client_type: ClientType,
}

/// Node selectors handed to individual checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckConfig {
    pub network: String,
    pub consensus_node: String,
    pub execution_node: String,
}

/// Output of one check run.
#[derive(Debug, Clone, Default)]
pub struct CheckRun {
    pub results: Vec<CheckResult>,
    pub analysis: AnalysisResult,
}

/// Produces check results and correlation for a target.
#[async_trait]
pub trait CheckExecutor: Send + Sync {
    async fn execute(&self, ctx: &EvaluationContext, request: &CheckRequest) -> Result<CheckRun>;
}

/// A single health check against the metrics backend.
#[async_trait]
pub trait Check: Send + Sync {
    fn name(&self) -> &str;

    fn category(&self) -> Category;

    async fn run(&self, ctx: &EvaluationContext, config: &CheckConfig) -> Result<CheckResult>;
}

/// Runs registered checks and correlates their failures.
#[derive(Default)]
pub struct CheckRunner {
    checks: Vec<Arc<dyn Check>>,
}

impl CheckRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, check: Arc<dyn Check>) {
        self.checks.push(check);
    }

    pub fn with_check(mut self, check: Arc<dyn Check>) -> Self {
        self.register(check);
        self
    }

    pub fn check_count(&self) -> usize {
        self.checks.len()
    }
}

#[async_trait]
impl CheckExecutor for CheckRunner {
    async fn execute(&self, ctx: &EvaluationContext, request: &CheckRequest) -> Result<CheckRun> {
        if request.client_type == ClientType::All {
            return Err(PulseError::UnsupportedClientType(request.client_type.to_string()));
        }

        let log_ctx = ctx.log_context();
        let mut correlator = Correlator::new(&request.client, request.client_type);

        let config = CheckConfig {
            network: request.network.clone(),
            consensus_node: CLIENT_WILDCARD.to_string(),
            execution_node: CLIENT_WILDCARD.to_string(),
        };

        log::info!("{} CHECKS_START checks={}", log_ctx, self.checks.len());

        let mut all_results = Vec::with_capacity(self.checks.len());
        for check in &self.checks {
            let result = ctx
                .run_until_cancelled(check.run(ctx, &config))
                .await?
                .map_err(|e| {
                    PulseError::CheckExecution(format!("failed to run check {}: {}", check.name(), e))
                })?;

            log::debug!(
                "{} CHECK_COMPLETE name={} category={} status={:?} affected={}",
                log_ctx,
                check.name(),
                check.category().as_str(),
                result.status,
                result.affected_nodes.len()
            );

            if result.is_failing() {
                for node in &result.affected_nodes {
                    correlator.add_node_status(node, false);
                }
            }
            all_results.push(result);
        }

        let analysis = correlator.analyze(&log_ctx);
        let results: Vec<CheckResult> = all_results
            .iter()
            .filter_map(|r| narrow_to_client(r, &request.client))
            .collect();

        log::info!(
            "{} CHECKS_COMPLETE total={} failing_for_client={}",
            log_ctx,
            all_results.len(),
            results.len()
        );

        Ok(CheckRun { results, analysis })
    }
}

/// Keep a failing result only if some affected node mentions `client`, and
/// trim its node list and textual details to the lines that do.
pub fn narrow_to_client(result: &CheckResult, client: &str) -> Option<CheckResult> {
    if !result.is_failing() {
        return None;
    }

    let affected_nodes: Vec<String> = result
        .affected_nodes
        .iter()
        .filter(|node| node.contains(client))
        .cloned()
        .collect();
    if affected_nodes.is_empty() {
        return None;
    }

    let details = result
        .details
        .iter()
        .filter_map(|(key, value)| {
            if key == QUERY_DETAIL_KEY {
                return Some((key.clone(), value.clone()));
            }
            value
                .retain_lines(|line| line.contains(client))
                .map(|kept| (key.clone(), kept))
        })
        .collect();

    Some(CheckResult {
        affected_nodes,
        details,
        ..result.clone()
    })
}
