//! Pulse Core - alert evaluation pipeline for test-network health monitoring
//!
//! This crate decides, for each monitored (network, client) target, whether
//! the current health of the network warrants notifying the client's team.
//! The implementation prioritizes:
//!
//! 1. **Precision** - Alerts only when the target itself is implicated
//! 2. **Logging** - Every decision point logged with full context
//! 3. **Isolation** - At most one evaluation per target at a time
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `queue` - Bounded, deduplicating evaluation queue and its metrics
//! - `pipeline` - Single-target evaluation and scheduled triggering
//! - `checks` - Check results, client catalog, correlation, check runner
//! - `extraction` - Affected-instance extraction from check details
//! - `classify` - Reachability probing and instance classification
//! - `decision` - Notification verdicts and payloads
//! - `regression` - Test-result summaries and regression detection
//! - `storage` - Object-store backed targets and snapshots
//! - `logging` - Structured logging with evaluation context

use std::sync::Arc;

use anyhow::Context;
use prometheus::Registry;

pub mod checks;
pub mod classify;
pub mod config;
pub mod decision;
pub mod error;
pub mod extraction;
pub mod logging;
pub mod pipeline;
pub mod queue;
pub mod regression;
pub mod storage;

use checks::runner::CheckExecutor;
use classify::classifier::InstanceClassifier;
use classify::probe::{ReachabilityProbe, TcpBannerProbe};
use config::PulseConfig;
use decision::engine::NotificationDecisionEngine;
use decision::sink::{AttachmentRenderer, NotificationSink};
use error::StorageError;
use pipeline::evaluator::{Evaluator, TestResultSource};
use pipeline::trigger::enqueue_enabled_targets;
use queue::evaluation::{EnqueueStatus, EvaluationQueue};
use queue::metrics::QueueMetrics;
use queue::request::TargetKey;
use storage::object::ObjectStore;
use storage::snapshots::SnapshotRepo;
use storage::targets::{TargetRepo, TargetStore};

/// Initialize the process-wide logger. `RUST_LOG` overrides the default level.
pub fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}

/// External systems the pipeline talks to.
pub struct Collaborators {
    pub executor: Arc<dyn CheckExecutor>,
    pub sink: Arc<dyn NotificationSink>,
    pub store: Arc<dyn ObjectStore>,
    /// Defaults to the TCP banner probe from `PulseConfig::probe`.
    pub probe: Option<Arc<dyn ReachabilityProbe>>,
    /// Regression detection is disabled without a source.
    pub test_results: Option<Arc<dyn TestResultSource>>,
    pub attachments: Option<Arc<dyn AttachmentRenderer>>,
}

/// A wired evaluation queue plus the target registry feeding it.
pub struct Pulse {
    pub queue: EvaluationQueue,
    pub targets: Arc<dyn TargetStore>,
}

impl Pulse {
    /// Validate `config` and wire every component.
    pub fn build(config: &PulseConfig, collaborators: Collaborators, registry: Registry) -> anyhow::Result<Self> {
        config.validate().context("invalid pulse configuration")?;

        let catalog = Arc::new(config.clients.clone());
        let probe: Arc<dyn ReachabilityProbe> = match collaborators.probe {
            Some(probe) => probe,
            None => Arc::new(TcpBannerProbe::new(config.probe.clone())),
        };
        let classifier = InstanceClassifier::new(probe, catalog.clone());
        let engine = NotificationDecisionEngine::new(
            classifier,
            catalog,
            &config.notifications.ssh_user,
            &config.probe.domain,
        );

        let prefix = config.storage.prefix.as_str();
        let targets: Arc<dyn TargetStore> = Arc::new(TargetRepo::new(collaborators.store.clone(), prefix));
        let snapshots = Arc::new(SnapshotRepo::new(collaborators.store, prefix));

        let mut evaluator = Evaluator::new(collaborators.executor, engine, collaborators.sink, snapshots)
            .with_targets(targets.clone());
        if let Some(source) = collaborators.test_results {
            evaluator = evaluator.with_test_results(source);
        }
        if let Some(renderer) = collaborators.attachments {
            evaluator = evaluator.with_attachments(renderer);
        }

        let metrics = QueueMetrics::new(&config.metrics.namespace, registry)
            .context("failed to register queue metrics")?;
        let queue = EvaluationQueue::new(config.queue.clone(), Arc::new(evaluator), metrics);

        log::info!(
            "PULSE_BUILT workers={} capacity={} prefix={} namespace={}",
            config.queue.workers,
            config.queue.capacity,
            prefix,
            config.metrics.namespace
        );
        Ok(Self { queue, targets })
    }

    /// Enqueue every enabled target.
    pub async fn trigger(&self) -> Result<Vec<(TargetKey, EnqueueStatus)>, StorageError> {
        enqueue_enabled_targets(&self.queue, self.targets.as_ref()).await
    }
}
