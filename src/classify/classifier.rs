//! Instance classification.
//!
//! Decision order for one instance:
//! 1. Probe fails -> `Infrastructure`
//! 2. Target client is a root cause -> `Regular`
//! 3. A paired client other than the target is pre-production or a root cause -> `Unrelated`
//! 4. Otherwise -> `Regular`

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::checks::clients::ClientCatalog;
use crate::logging::structured::LogContext;

use super::instance::Instance;
use super::probe::{ProbeOutcome, ReachabilityProbe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Regular,
    Unrelated,
    Infrastructure,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Regular => "regular",
            Classification::Unrelated => "unrelated",
            Classification::Infrastructure => "infrastructure",
        }
    }
}

/// Classify from an already-known probe outcome.
pub fn classify_with_outcome(
    outcome: &ProbeOutcome,
    instance: &Instance,
    target: &str,
    root_causes: &BTreeSet<String>,
    catalog: &ClientCatalog,
) -> Classification {
    if !outcome.is_reachable() {
        return Classification::Infrastructure;
    }
    if root_causes.contains(target) {
        return Classification::Regular;
    }

    let Some(pair) = instance.client_pair() else {
        return Classification::Regular;
    };
    let explained_elsewhere = pair.components().iter().any(|component| {
        *component != target
            && (catalog.is_pre_production(component) || root_causes.contains(*component))
    });

    if explained_elsewhere {
        Classification::Unrelated
    } else {
        Classification::Regular
    }
}

/// Instances of one evaluation, bucketed and sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedInstances {
    pub regular: Vec<Instance>,
    pub unrelated: Vec<Instance>,
    pub infrastructure: Vec<Instance>,
}

impl ClassifiedInstances {
    pub fn push(&mut self, instance: Instance, classification: Classification) {
        match classification {
            Classification::Regular => self.regular.push(instance),
            Classification::Unrelated => self.unrelated.push(instance),
            Classification::Infrastructure => self.infrastructure.push(instance),
        }
    }

    pub fn total(&self) -> usize {
        self.regular.len() + self.unrelated.len() + self.infrastructure.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// True when instances were found but none of them is regular.
    pub fn has_only_infra_or_unrelated_issues(&self) -> bool {
        !self.is_empty() && self.regular.is_empty()
    }

    fn sort(&mut self) {
        self.regular.sort();
        self.unrelated.sort();
        self.infrastructure.sort();
    }
}

/// Labels affected instances using a live probe and the static client tables.
#[derive(Clone)]
pub struct InstanceClassifier {
    probe: Arc<dyn ReachabilityProbe>,
    catalog: Arc<ClientCatalog>,
}

impl InstanceClassifier {
    pub fn new(probe: Arc<dyn ReachabilityProbe>, catalog: Arc<ClientCatalog>) -> Self {
        Self { probe, catalog }
    }

    pub async fn classify(
        &self,
        instance: &Instance,
        target: &str,
        root_causes: &BTreeSet<String>,
    ) -> Classification {
        let outcome = self.probe.probe(instance).await;
        classify_with_outcome(&outcome, instance, target, root_causes, &self.catalog)
    }

    /// Probe all instances concurrently and bucket them.
    pub async fn classify_all(
        &self,
        instances: Vec<Instance>,
        target: &str,
        root_causes: &BTreeSet<String>,
        ctx: &LogContext,
    ) -> ClassifiedInstances {
        let outcomes = join_all(instances.iter().map(|instance| self.probe.probe(instance))).await;

        let mut classified = ClassifiedInstances::default();
        for (instance, outcome) in instances.into_iter().zip(outcomes) {
            let classification =
                classify_with_outcome(&outcome, &instance, target, root_causes, &self.catalog);
            crate::log_debug!(
                ctx,
                "INSTANCE_CLASSIFIED",
                instance = instance.name,
                probe = outcome.as_str(),
                classification = classification.as_str()
            );
            classified.push(instance, classification);
        }
        classified.sort();

        crate::log_info!(
            ctx,
            "INSTANCES_CLASSIFIED",
            regular = classified.regular.len(),
            unrelated = classified.unrelated.len(),
            infrastructure = classified.infrastructure.len()
        );
        classified
    }
}
