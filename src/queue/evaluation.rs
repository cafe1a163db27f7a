//! Evaluation queue.
//!
//! Bounded FIFO feeding a fixed pool of workers, with at most one queued or
//! running evaluation per target key.
//!
//! Per-key state machine (absent from the registry means idle):
//!
//! ```text
//! idle --enqueue--> Queued --dequeue--> Running --finish--> idle
//!                     |                                   ^
//!                     +----------stop (never started)-----+
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::QueueConfig;
use crate::error::{PulseError, Result};
use crate::pipeline::context::EvaluationContext;

use super::metrics::{QueueMetrics, QueueStats};
use super::request::{EvaluationOutcome, EvaluationRequest, TargetKey};

/// Runs one evaluation. Returns whether a notification was sent.
#[async_trait]
pub trait EvaluationWorker: Send + Sync {
    async fn evaluate(&self, ctx: &EvaluationContext, request: &EvaluationRequest) -> Result<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Queued,
    Running,
}

/// Receives the single outcome of an accepted request.
pub type OutcomeReceiver = oneshot::Receiver<EvaluationOutcome>;

#[derive(Debug)]
pub enum EnqueueStatus {
    Accepted(OutcomeReceiver),
    /// The key is already queued or running; nothing was enqueued.
    AlreadyInFlight(SlotState),
    QueueFull,
    Stopped,
}

impl EnqueueStatus {
    pub fn is_accepted(&self) -> bool {
        matches!(self, EnqueueStatus::Accepted(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnqueueStatus::Accepted(_) => "accepted",
            EnqueueStatus::AlreadyInFlight(_) => "already_in_flight",
            EnqueueStatus::QueueFull => "queue_full",
            EnqueueStatus::Stopped => "stopped",
        }
    }
}

struct Job {
    request: EvaluationRequest,
    reply: oneshot::Sender<EvaluationOutcome>,
    enqueued_at: Instant,
}

struct Slots {
    states: HashMap<TargetKey, SlotState>,
    accepting: bool,
}

struct Shared {
    worker: Arc<dyn EvaluationWorker>,
    metrics: QueueMetrics,
    slots: Mutex<Slots>,
    sender: mpsc::Sender<Job>,
    /// Workers stop dequeuing once cancelled.
    stopping: CancellationToken,
    /// Parent of every in-flight evaluation's token.
    cancel: CancellationToken,
}

pub struct EvaluationQueue {
    config: QueueConfig,
    shared: Arc<Shared>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl EvaluationQueue {
    pub fn new(config: QueueConfig, worker: Arc<dyn EvaluationWorker>, metrics: QueueMetrics) -> Self {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        Self {
            config,
            shared: Arc::new(Shared {
                worker,
                metrics,
                slots: Mutex::new(Slots {
                    states: HashMap::new(),
                    accepting: true,
                }),
                sender,
                stopping: CancellationToken::new(),
                cancel: CancellationToken::new(),
            }),
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the worker pool. Cancelling `parent` stops the queue and
    /// cancels in-flight evaluations.
    pub fn start(&self, parent: CancellationToken) {
        let mut handles = self.handles.lock();
        if !handles.is_empty() {
            log::warn!("QUEUE_ALREADY_STARTED workers={}", handles.len());
            return;
        }

        for id in 0..self.config.workers.max(1) {
            let shared = self.shared.clone();
            let receiver = self.receiver.clone();
            handles.push(tokio::spawn(worker_loop(id, shared, receiver)));
        }

        let shared = self.shared.clone();
        let receiver = self.receiver.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = parent.cancelled() => {
                    shared.slots.lock().accepting = false;
                    shared.stopping.cancel();
                    shared.cancel.cancel();
                    let drained = drain_pending(&shared, &receiver).await;
                    log::info!("QUEUE_CANCELLED drained={}", drained);
                }
                _ = shared.cancel.cancelled() => {}
            }
        });

        log::info!(
            "QUEUE_STARTED workers={} capacity={}",
            self.config.workers.max(1),
            self.config.capacity
        );
    }

    /// Offer a request. Never blocks.
    pub fn enqueue(&self, request: EvaluationRequest) -> EnqueueStatus {
        let key = request.key();
        let metrics = &self.shared.metrics;
        let mut slots = self.shared.slots.lock();

        if !slots.accepting {
            return EnqueueStatus::Stopped;
        }
        if let Some(state) = slots.states.get(&key) {
            metrics.skipped_total.inc();
            log::info!("EVALUATION_SKIPPED key={} state={:?}", key, state);
            return EnqueueStatus::AlreadyInFlight(*state);
        }

        let (reply, outcome) = oneshot::channel();
        let job = Job {
            request,
            reply,
            enqueued_at: Instant::now(),
        };
        match self.shared.sender.try_send(job) {
            Ok(()) => {
                slots.states.insert(key.clone(), SlotState::Queued);
                metrics.enqueued_total.inc();
                metrics.queue_length.inc();
                log::debug!("EVALUATION_QUEUED key={}", key);
                EnqueueStatus::Accepted(outcome)
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                metrics.rejected_total.inc();
                log::warn!("EVALUATION_REJECTED key={} reason=queue_full", key);
                EnqueueStatus::QueueFull
            }
            Err(mpsc::error::TrySendError::Closed(_)) => EnqueueStatus::Stopped,
        }
    }

    pub fn state_of(&self, key: &TargetKey) -> Option<SlotState> {
        self.shared.slots.lock().states.get(key).copied()
    }

    pub fn stats(&self) -> QueueStats {
        self.shared.metrics.snapshot()
    }

    pub fn metrics(&self) -> &QueueMetrics {
        &self.shared.metrics
    }

    /// Stop with the configured grace period.
    pub async fn stop(&self) {
        self.stop_with_grace(self.config.shutdown_grace()).await;
    }

    /// Stop accepting work and wait for in-flight evaluations, cancelling
    /// them once `grace` elapses. Requests that never started receive a
    /// cancelled outcome. Returns after every worker has exited.
    pub async fn stop_with_grace(&self, grace: Duration) {
        self.shared.slots.lock().accepting = false;
        self.shared.stopping.cancel();

        let handles = std::mem::take(&mut *self.handles.lock());
        log::info!("QUEUE_STOPPING workers={} grace_secs={}", handles.len(), grace.as_secs());

        let joined = join_all(handles);
        tokio::pin!(joined);
        if tokio::time::timeout(grace, joined.as_mut()).await.is_err() {
            log::warn!("QUEUE_GRACE_EXPIRED cancelling in-flight evaluations");
            self.shared.cancel.cancel();
            joined.await;
        }

        let drained = drain_pending(&self.shared, &self.receiver).await;
        self.shared.cancel.cancel();
        log::info!("QUEUE_STOPPED drained={}", drained);
    }
}

/// Close the channel and resolve every job still in it as cancelled.
/// Workers release the receiver once `stopping` is cancelled.
async fn drain_pending(shared: &Shared, receiver: &tokio::sync::Mutex<mpsc::Receiver<Job>>) -> usize {
    let mut receiver = receiver.lock().await;
    receiver.close();
    let mut drained = 0;
    while let Ok(job) = receiver.try_recv() {
        shared.abandon(job);
        drained += 1;
    }
    drained
}

async fn worker_loop(
    id: usize,
    shared: Arc<Shared>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
) {
    log::debug!("WORKER_STARTED worker={}", id);
    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                biased;
                _ = shared.stopping.cancelled() => None,
                job = receiver.recv() => job,
            }
        };
        let Some(job) = job else {
            break;
        };
        shared.run(id, job).await;
    }
    log::debug!("WORKER_STOPPED worker={}", id);
}

impl Shared {
    async fn run(&self, worker_id: usize, job: Job) {
        let key = job.request.key();
        self.slots.lock().states.insert(key.clone(), SlotState::Running);
        self.metrics.queue_length.dec();
        self.metrics.started_total.inc();
        self.metrics.in_flight.inc();

        let token = self.cancel.child_token();
        let ctx = EvaluationContext::with_cancellation(&job.request.network, &job.request.client, token.clone());
        let log_ctx = ctx.log_context();
        log::info!(
            "{} EVALUATION_STARTED worker={} waited_ms={}",
            log_ctx,
            worker_id,
            job.enqueued_at.elapsed().as_millis()
        );

        let timer = self.metrics.processing_seconds.start_timer();
        let started = Instant::now();

        let worker = self.worker.clone();
        let request = job.request.clone();
        let task_ctx = ctx.clone();
        let mut handle = tokio::spawn(async move { worker.evaluate(&task_ctx, &request).await });

        let result = tokio::select! {
            joined = &mut handle => match joined {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(PulseError::Panicked(panic_message(e.into_panic()))),
                Err(_) => Err(PulseError::Cancelled),
            },
            _ = token.cancelled() => {
                handle.abort();
                Err(PulseError::Cancelled)
            }
        };

        timer.observe_duration();
        self.slots.lock().states.remove(&key);
        self.metrics.in_flight.dec();

        let outcome = match result {
            Ok(sent) => {
                self.metrics.succeeded_total.inc();
                log::info!(
                    "{} EVALUATION_COMPLETE notification_sent={} duration_ms={}",
                    log_ctx,
                    sent,
                    started.elapsed().as_millis()
                );
                EvaluationOutcome {
                    key,
                    check_id: Some(ctx.check_id.clone()),
                    notification_sent: sent,
                    error: None,
                    duration: started.elapsed(),
                }
            }
            Err(error) => {
                self.metrics.failed_total.inc();
                log::error!("{} EVALUATION_FAILED error={}", log_ctx, error);
                EvaluationOutcome {
                    key,
                    check_id: Some(ctx.check_id.clone()),
                    notification_sent: false,
                    error: Some(error),
                    duration: started.elapsed(),
                }
            }
        };

        if job.reply.send(outcome).is_err() {
            log::debug!("{} OUTCOME_UNCLAIMED", log_ctx);
        }
    }

    /// Resolve a request that never reached a worker.
    fn abandon(&self, job: Job) {
        let key = job.request.key();
        self.slots.lock().states.remove(&key);
        self.metrics.queue_length.dec();
        self.metrics.failed_total.inc();
        log::info!("EVALUATION_ABANDONED key={}", key);
        let _ = job.reply.send(EvaluationOutcome {
            key,
            check_id: None,
            notification_sent: false,
            error: Some(PulseError::Cancelled),
            duration: Duration::ZERO,
        });
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
