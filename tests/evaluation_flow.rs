//! End-to-end evaluation flows against in-memory stores and fake collaborators.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use prometheus::Registry;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use pulse_core::checks::clients::ClientType;
use pulse_core::checks::result::{AnalysisResult, Category, CheckResult, Status};
use pulse_core::checks::runner::{CheckExecutor, CheckRequest, CheckRun};
use pulse_core::classify::instance::Instance;
use pulse_core::classify::probe::{ProbeOutcome, ReachabilityProbe};
use pulse_core::config::PulseConfig;
use pulse_core::decision::payload::NotificationPayload;
use pulse_core::decision::sink::NotificationSink;
use pulse_core::error::Result;
use pulse_core::pipeline::context::EvaluationContext;
use pulse_core::pipeline::evaluator::TestResultSource;
use pulse_core::queue::evaluation::EnqueueStatus;
use pulse_core::queue::request::{EvaluationOutcome, EvaluationRequest};
use pulse_core::regression::summary::TestResult;
use pulse_core::storage::models::MonitoredTarget;
use pulse_core::storage::object::MemoryObjectStore;
use pulse_core::{Collaborators, Pulse};

struct FakeExecutor {
    run: CheckRun,
    executions: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl FakeExecutor {
    fn new(run: CheckRun) -> Self {
        Self {
            run,
            executions: AtomicUsize::new(0),
            gate: None,
        }
    }
}

#[async_trait]
impl CheckExecutor for FakeExecutor {
    async fn execute(&self, _ctx: &EvaluationContext, _request: &CheckRequest) -> Result<CheckRun> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(self.run.clone())
    }
}

#[derive(Default)]
struct MapProbe {
    outcomes: BTreeMap<String, ProbeOutcome>,
}

#[async_trait]
impl ReachabilityProbe for MapProbe {
    async fn probe(&self, instance: &Instance) -> ProbeOutcome {
        self.outcomes
            .get(&instance.name)
            .cloned()
            .unwrap_or(ProbeOutcome::Reachable)
    }
}

#[derive(Default)]
struct RecordingSink {
    delivered: Mutex<Vec<NotificationPayload>>,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, _channel: &str, payload: &NotificationPayload) -> anyhow::Result<()> {
        self.delivered.lock().push(payload.clone());
        Ok(())
    }
}

/// Serves one batch per call, in order.
struct DailyResults(Mutex<Vec<Vec<TestResult>>>);

#[async_trait]
impl TestResultSource for DailyResults {
    async fn fetch_test_results(&self, _network: &str) -> anyhow::Result<Vec<TestResult>> {
        let mut batches = self.0.lock();
        if batches.is_empty() {
            anyhow::bail!("no more batches");
        }
        Ok(batches.remove(0))
    }
}

fn test_result(client: &str, passes: u64, fails: u64, day: u32) -> TestResult {
    TestResult {
        name: "consensus".to_string(),
        client: client.to_string(),
        version: "v1.0.0".to_string(),
        ntests: passes + fails,
        passes,
        fails,
        timestamp: Utc.with_ymd_and_hms(2025, 5, day, 6, 0, 0).unwrap(),
        test_suite_id: format!("suite-{}", day),
    }
}

fn not_synced_run(line: &str, root_cause: &[&str], unexplained: &[&str]) -> CheckRun {
    CheckRun {
        results: vec![CheckResult::new("Node is not synced", Category::Sync, Status::Fail)
            .with_detail("notSyncedNodes", line)],
        analysis: AnalysisResult {
            root_cause: root_cause.iter().map(|s| s.to_string()).collect(),
            unexplained_issues: unexplained.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        },
    }
}

struct Harness {
    pulse: Pulse,
    sink: Arc<RecordingSink>,
}

fn harness(
    executor: Arc<FakeExecutor>,
    probe: MapProbe,
    test_results: Option<Arc<dyn TestResultSource>>,
) -> Harness {
    let sink = Arc::new(RecordingSink::default());
    let collaborators = Collaborators {
        executor,
        sink: sink.clone(),
        store: Arc::new(MemoryObjectStore::new()),
        probe: Some(Arc::new(probe)),
        test_results,
        attachments: None,
    };
    let pulse = Pulse::build(&PulseConfig::default(), collaborators, Registry::new()).unwrap();
    pulse.queue.start(CancellationToken::new());
    Harness { pulse, sink }
}

async fn run_once(harness: &Harness, network: &str, client: &str, client_type: ClientType) -> EvaluationOutcome {
    let request = EvaluationRequest::new(network, client, client_type, "alerts");
    match harness.pulse.queue.enqueue(request) {
        EnqueueStatus::Accepted(outcome) => outcome.await.unwrap(),
        other => panic!("expected accepted, got {}", other.as_str()),
    }
}

#[tokio::test]
async fn test_root_cause_target_instance_is_regular_and_notified() {
    let executor = Arc::new(FakeExecutor::new(not_synced_run(
        "nimbus-geth-1 (peers: 0)\n",
        &["nimbus"],
        &[],
    )));
    let harness = harness(executor, MapProbe::default(), None);

    let outcome = run_once(&harness, "devnet-7", "nimbus", ClientType::Consensus).await;
    assert!(outcome.is_success());
    assert!(outcome.notification_sent);

    let delivered = harness.sink.delivered.lock();
    assert_eq!(delivered.len(), 1);
    let payload = &delivered[0];
    assert_eq!(payload.title, "Nimbus");
    assert_eq!(payload.check_id, outcome.check_id.clone().unwrap());
    assert_eq!(payload.instances.regular.len(), 1);
    assert_eq!(payload.instances.regular[0].name, "nimbus-geth-1");
    assert_eq!(
        payload.instances.regular[0].ssh_command,
        "ssh devops@nimbus-geth-1.devnet-7.ethpandaops.io"
    );
    assert!(payload.instances.infrastructure.is_empty());
}

#[tokio::test]
async fn test_unreachable_only_instance_is_suppressed() {
    let executor = Arc::new(FakeExecutor::new(not_synced_run(
        "nimbus-geth-1 (peers: 0)\n",
        &["nimbus"],
        &[],
    )));
    let probe = MapProbe {
        outcomes: [("nimbus-geth-1".to_string(), ProbeOutcome::ConnectTimeout)]
            .into_iter()
            .collect(),
    };
    let harness = harness(executor, probe, None);

    let outcome = run_once(&harness, "devnet-7", "nimbus", ClientType::Consensus).await;
    assert!(outcome.is_success());
    assert!(!outcome.notification_sent);
    assert!(harness.sink.delivered.lock().is_empty());
}

#[tokio::test]
async fn test_regression_from_two_to_five_failures() {
    let executor = Arc::new(FakeExecutor::new(not_synced_run(
        "lighthouse-geth-1 (peers: 0)",
        &[],
        &["lighthouse-geth-1 not synced"],
    )));
    let source: Arc<dyn TestResultSource> = Arc::new(DailyResults(Mutex::new(vec![
        vec![test_result("geth", 8, 2, 1)],
        vec![test_result("geth", 5, 5, 2)],
    ])));
    let harness = harness(executor, MapProbe::default(), Some(source));

    let first = run_once(&harness, "devnet-7", "geth", ClientType::Execution).await;
    assert!(first.notification_sent);
    let second = run_once(&harness, "devnet-7", "geth", ClientType::Execution).await;
    assert!(second.notification_sent);

    let delivered = harness.sink.delivered.lock();
    assert!(delivered[0].regression.is_none(), "cold start has no regressions");
    let regression = delivered[1].regression.as_ref().unwrap();
    assert_eq!(regression.client, "geth");
    assert_eq!(regression.previous_failed, 2);
    assert_eq!(regression.current_failed, 5);
    assert_eq!(regression.increase, 3);
    assert!(regression.describe().starts_with("3 new failures (from 2 to 5)"));
}

#[tokio::test]
async fn test_test_result_failure_fails_evaluation() {
    let executor = Arc::new(FakeExecutor::new(not_synced_run(
        "lighthouse-geth-1 (peers: 0)",
        &[],
        &["lighthouse-geth-1 not synced"],
    )));
    let source: Arc<dyn TestResultSource> = Arc::new(DailyResults(Mutex::new(Vec::new())));
    let harness = harness(executor, MapProbe::default(), Some(source));

    let outcome = run_once(&harness, "devnet-7", "geth", ClientType::Execution).await;
    assert!(!outcome.is_success());
    assert!(!outcome.notification_sent);
    assert!(harness.sink.delivered.lock().is_empty());
}

#[tokio::test]
async fn test_repeated_enqueues_execute_once() {
    let gate = Arc::new(Notify::new());
    let executor = Arc::new(FakeExecutor {
        run: not_synced_run("nimbus-geth-1", &["nimbus"], &[]),
        executions: AtomicUsize::new(0),
        gate: Some(gate.clone()),
    });
    let harness = harness(executor.clone(), MapProbe::default(), None);

    let request = EvaluationRequest::new("devnet-7", "nimbus", ClientType::Consensus, "alerts");
    let EnqueueStatus::Accepted(outcome) = harness.pulse.queue.enqueue(request.clone()) else {
        panic!("first enqueue must be accepted");
    };
    for _ in 0..10 {
        assert!(matches!(
            harness.pulse.queue.enqueue(request.clone()),
            EnqueueStatus::AlreadyInFlight(_)
        ));
    }

    gate.notify_one();
    let outcome = outcome.await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(executor.executions.load(Ordering::SeqCst), 1);
    assert_eq!(harness.pulse.queue.stats().skipped, 10);

    harness.pulse.queue.stop().await;
}

#[tokio::test]
async fn test_trigger_records_last_check_id() {
    let executor = Arc::new(FakeExecutor::new(not_synced_run("nimbus-geth-1", &["nimbus"], &[])));
    let harness = harness(executor, MapProbe::default(), None);
    harness
        .pulse
        .targets
        .persist(&MonitoredTarget::new("devnet-7", "nimbus", ClientType::Consensus, "alerts"))
        .await
        .unwrap();

    let mut statuses = harness.pulse.trigger().await.unwrap();
    assert_eq!(statuses.len(), 1);
    let (_, status) = statuses.remove(0);
    let EnqueueStatus::Accepted(outcome) = status else {
        panic!("expected accepted");
    };
    let outcome = outcome.await.unwrap();

    let target = harness.pulse.targets.get("devnet-7", "nimbus").await.unwrap().unwrap();
    assert_eq!(target.last_check_id, outcome.check_id);
}
