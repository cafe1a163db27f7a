//! Notification decision logic.
//!
//! # Decision Tree
//! 1. Target neither a root cause nor named by an unexplained issue -> Suppress
//! 2. No failing check -> Suppress
//! 3. Affected instances found and none of them regular -> Suppress
//! 4. Otherwise -> Send

use std::collections::BTreeSet;

use chrono::Utc;

use crate::checks::clients::ClientCatalog;
use crate::checks::result::{AnalysisResult, Category, CheckResult};
use crate::classify::classifier::{ClassifiedInstances, InstanceClassifier};
use crate::classify::instance::Instance;
use crate::extraction::instances::extract_instances;
use crate::pipeline::context::EvaluationContext;
use crate::regression::detector::ClientRegression;

use super::payload::{
    color_for, title_case, CategoryIssues, InstanceBuckets, NotificationPayload, RegularInstance,
};

/// Why no notification is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    NotImplicated,
    NoFailingChecks,
    OnlyInfraOrUnrelated,
}

impl SuppressReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuppressReason::NotImplicated => "not_implicated",
            SuppressReason::NoFailingChecks => "no_failing_checks",
            SuppressReason::OnlyInfraOrUnrelated => "only_infra_or_unrelated",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Suppress(SuppressReason),
    Send(Box<NotificationPayload>),
}

impl Verdict {
    pub fn should_send(&self) -> bool {
        matches!(self, Verdict::Send(_))
    }
}

/// Everything the engine needs about one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct DecisionInput<'a> {
    pub results: &'a [CheckResult],
    pub analysis: &'a AnalysisResult,
    pub regression: Option<&'a ClientRegression>,
}

/// Whether the target is implicated by the correlation.
pub fn is_eligible(client: &str, analysis: &AnalysisResult) -> bool {
    analysis.is_root_cause(client) || analysis.has_unexplained_issue_for(client)
}

pub struct NotificationDecisionEngine {
    classifier: InstanceClassifier,
    catalog: std::sync::Arc<ClientCatalog>,
    ssh_user: String,
    domain: String,
}

impl NotificationDecisionEngine {
    pub fn new(
        classifier: InstanceClassifier,
        catalog: std::sync::Arc<ClientCatalog>,
        ssh_user: &str,
        domain: &str,
    ) -> Self {
        Self {
            classifier,
            catalog,
            ssh_user: ssh_user.to_string(),
            domain: domain.to_string(),
        }
    }

    pub async fn decide(&self, ctx: &EvaluationContext, input: DecisionInput<'_>) -> Verdict {
        let log_ctx = ctx.log_context();
        let client = ctx.client.as_str();

        if !is_eligible(client, input.analysis) {
            log::info!("{} DECISION verdict=suppress reason=not_implicated", log_ctx);
            return Verdict::Suppress(SuppressReason::NotImplicated);
        }

        let failing: Vec<&CheckResult> = input.results.iter().filter(|r| r.is_failing()).collect();
        if failing.is_empty() {
            log::info!("{} DECISION verdict=suppress reason=no_failing_checks", log_ctx);
            return Verdict::Suppress(SuppressReason::NoFailingChecks);
        }

        let instances: Vec<Instance> = extract_instances(input.results, client, &log_ctx)
            .into_iter()
            .map(|name| Instance::new(&name, &ctx.network, client))
            .collect();

        let classified = self
            .classifier
            .classify_all(instances, client, &input.analysis.root_cause, &log_ctx)
            .await;

        if classified.has_only_infra_or_unrelated_issues() {
            log::info!(
                "{} DECISION verdict=suppress reason=only_infra_or_unrelated infrastructure={} unrelated={}",
                log_ctx,
                classified.infrastructure.len(),
                classified.unrelated.len()
            );
            return Verdict::Suppress(SuppressReason::OnlyInfraOrUnrelated);
        }

        let payload = self.build_payload(ctx, &failing, classified, input.regression);
        log::info!(
            "{} DECISION verdict=send active_issues={} regular={} regression={}",
            log_ctx,
            payload.active_issues,
            payload.instances.regular.len(),
            payload.regression.is_some()
        );
        Verdict::Send(Box::new(payload))
    }

    fn build_payload(
        &self,
        ctx: &EvaluationContext,
        failing: &[&CheckResult],
        classified: ClassifiedInstances,
        regression: Option<&ClientRegression>,
    ) -> NotificationPayload {
        let active_issues = failing.iter().map(|r| r.name.as_str()).collect::<BTreeSet<_>>().len();

        let categories = Category::ORDERED
            .iter()
            .filter_map(|category| {
                let mut checks: Vec<String> = Vec::new();
                for result in failing.iter().filter(|r| r.category == *category) {
                    if !checks.contains(&result.name) {
                        checks.push(result.name.clone());
                    }
                }
                (!checks.is_empty()).then_some(CategoryIssues {
                    category: *category,
                    checks,
                })
            })
            .collect();

        let instances = InstanceBuckets {
            regular: classified
                .regular
                .iter()
                .map(|i| RegularInstance {
                    name: i.name.clone(),
                    ssh_command: i.ssh_command(&self.ssh_user, &self.domain),
                })
                .collect(),
            unrelated: classified.unrelated.iter().map(|i| i.name.clone()).collect(),
            infrastructure: classified.infrastructure.iter().map(|i| i.name.clone()).collect(),
        };

        let mentions = self
            .catalog
            .team_role(&ctx.client)
            .map(|role| vec![role.to_string()])
            .unwrap_or_default();

        NotificationPayload {
            title: title_case(&ctx.client),
            network: ctx.network.clone(),
            client: ctx.client.clone(),
            check_id: ctx.check_id.clone(),
            color: color_for(&ctx.network),
            timestamp: Utc::now(),
            active_issues,
            categories,
            instances,
            regression: regression.cloned(),
            mentions,
            attachment: None,
        }
    }
}
