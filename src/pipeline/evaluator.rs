//! Single-target evaluation.
//!
//! Coordinates one evaluation end to end:
//! 1. Run checks and correlate (abort on error)
//! 2. Summarize test results, persist the snapshot, diff against the previous one
//! 3. Decide whether to notify
//! 4. Deliver the payload (best effort)
//! 5. Record the check ID on the target

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::checks::runner::{CheckExecutor, CheckRequest};
use crate::decision::engine::{DecisionInput, NotificationDecisionEngine, Verdict};
use crate::decision::payload::NotificationPayload;
use crate::decision::sink::{AttachmentRenderer, NotificationSink};
use crate::error::{PulseError, Result, SnapshotError};
use crate::logging::structured::LogContext;
use crate::queue::evaluation::EvaluationWorker;
use crate::queue::request::EvaluationRequest;
use crate::regression::detector::{detect, format_regressions, ClientRegression};
use crate::regression::summary::{build_summary, TestResult};
use crate::storage::snapshots::SnapshotStore;
use crate::storage::targets::TargetStore;

use super::context::EvaluationContext;

/// Raw test results for a network.
#[async_trait]
pub trait TestResultSource: Send + Sync {
    async fn fetch_test_results(&self, network: &str) -> anyhow::Result<Vec<TestResult>>;
}

/// One async lock per network, created on first use.
#[derive(Default)]
struct NetworkLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl NetworkLocks {
    fn for_network(&self, network: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(network.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// `EvaluationWorker` wiring the checks, regression detection, decision
/// engine and sink together.
pub struct Evaluator {
    executor: Arc<dyn CheckExecutor>,
    engine: NotificationDecisionEngine,
    sink: Arc<dyn NotificationSink>,
    snapshots: Arc<dyn SnapshotStore>,
    targets: Option<Arc<dyn TargetStore>>,
    test_results: Option<Arc<dyn TestResultSource>>,
    attachments: Option<Arc<dyn AttachmentRenderer>>,
    network_locks: NetworkLocks,
}

impl Evaluator {
    pub fn new(
        executor: Arc<dyn CheckExecutor>,
        engine: NotificationDecisionEngine,
        sink: Arc<dyn NotificationSink>,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            executor,
            engine,
            sink,
            snapshots,
            targets: None,
            test_results: None,
            attachments: None,
            network_locks: NetworkLocks::default(),
        }
    }

    /// Record each check ID on the stored target.
    pub fn with_targets(mut self, targets: Arc<dyn TargetStore>) -> Self {
        self.targets = Some(targets);
        self
    }

    /// Enable regression detection.
    pub fn with_test_results(mut self, source: Arc<dyn TestResultSource>) -> Self {
        self.test_results = Some(source);
        self
    }

    pub fn with_attachments(mut self, renderer: Arc<dyn AttachmentRenderer>) -> Self {
        self.attachments = Some(renderer);
        self
    }

    /// Regression of the target client, if any.
    ///
    /// The current snapshot is stored before the previous one is read; both
    /// happen under the network's lock.
    async fn find_regression(&self, ctx: &EvaluationContext) -> Result<Option<ClientRegression>> {
        let Some(source) = &self.test_results else {
            return Ok(None);
        };
        let log_ctx = ctx.log_context();

        let raw = ctx
            .run_until_cancelled(source.fetch_test_results(&ctx.network))
            .await?
            .map_err(|e| PulseError::TestResults(e.to_string()))?;

        let Some(current) = build_summary(&ctx.network, &raw) else {
            log::info!("{} REGRESSION_SKIPPED reason=no_test_results", log_ctx);
            return Ok(None);
        };

        let previous = {
            let lock = self.network_locks.for_network(&ctx.network);
            let _guard = lock.lock().await;

            self.snapshots.store_result(&current).await?;
            match self.snapshots.get_previous(&ctx.network).await {
                Ok(previous) => previous,
                Err(SnapshotError::InsufficientHistory { found, .. }) => {
                    log::info!("{} REGRESSION_SKIPPED reason=insufficient_history snapshots={}", log_ctx, found);
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        };

        if previous.date_key() >= current.date_key() {
            log::warn!(
                "{} REGRESSION_SKIPPED reason=previous_not_older previous={} current={}",
                log_ctx,
                previous.date_key(),
                current.date_key()
            );
            return Ok(None);
        }

        let mut regressions = detect(&current, &previous, &raw);
        log::info!(
            "{} REGRESSIONS_DETECTED clients={} previous={}",
            log_ctx,
            regressions.len(),
            previous.date_key()
        );
        if !regressions.is_empty() {
            log::debug!("{} REGRESSION_REPORT\n{}", log_ctx, format_regressions(&regressions));
        }
        Ok(regressions.remove(&ctx.client))
    }

    async fn deliver(&self, ctx: &EvaluationContext, channel: &str, mut payload: NotificationPayload) -> bool {
        let log_ctx = ctx.log_context();

        if let Some(renderer) = &self.attachments {
            match ctx.run_until_cancelled(renderer.render(ctx, &payload)).await {
                Ok(Ok(Some(attachment))) => payload = payload.with_attachment(attachment),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => log::warn!("{} ATTACHMENT_FAILED error={}", log_ctx, e),
                Err(_) => return false,
            }
        }

        match ctx.run_until_cancelled(self.sink.deliver(channel, &payload)).await {
            Ok(Ok(())) => {
                log::info!("{} NOTIFICATION_SENT channel={}", log_ctx, channel);
                true
            }
            Ok(Err(e)) => {
                log::error!("{} NOTIFICATION_FAILED channel={} error={}", log_ctx, channel, e);
                false
            }
            Err(_) => {
                log::warn!("{} NOTIFICATION_CANCELLED channel={}", log_ctx, channel);
                false
            }
        }
    }

    async fn record_check(&self, ctx: &EvaluationContext, log_ctx: &LogContext) {
        let Some(targets) = &self.targets else {
            return;
        };
        let result = match targets.get(&ctx.network, &ctx.client).await {
            Ok(Some(mut target)) => {
                target.record_check(&ctx.check_id, Utc::now());
                targets.persist(&target).await
            }
            Ok(None) => {
                log::debug!("{} TARGET_NOT_REGISTERED", log_ctx);
                return;
            }
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            log::warn!("{} TARGET_UPDATE_FAILED error={}", log_ctx, e);
        }
    }
}

#[async_trait]
impl EvaluationWorker for Evaluator {
    async fn evaluate(&self, ctx: &EvaluationContext, request: &EvaluationRequest) -> Result<bool> {
        let log_ctx = ctx.log_context();
        log::info!(
            "{} EVALUATION_BEGIN client_type={} channel={}",
            log_ctx,
            request.client_type,
            request.channel
        );

        let check_request = CheckRequest {
            network: request.network.clone(),
            client: request.client.clone(),
            client_type: request.client_type,
        };
        let run = self.executor.execute(ctx, &check_request).await?;

        let regression = self.find_regression(ctx).await?;

        let input = DecisionInput {
            results: &run.results,
            analysis: &run.analysis,
            regression: regression.as_ref(),
        };
        let verdict = ctx.run_until_cancelled(self.engine.decide(ctx, input)).await?;

        let sent = match verdict {
            Verdict::Send(payload) => self.deliver(ctx, &request.channel, *payload).await,
            Verdict::Suppress(_) => false,
        };

        self.record_check(ctx, &log_ctx).await;
        Ok(sent)
    }
}
