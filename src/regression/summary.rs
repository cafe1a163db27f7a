//! Test-result summaries.
//!
//! A `SummaryResult` is the historical snapshot of one network's test
//! results at a point in time. Totals count passes plus fails so that
//! `passed + failed == total` holds at every level.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One raw test-suite run for a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Test type, e.g. `consensus` or `rpc-compat`.
    pub name: String,
    pub client: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub ntests: u64,
    #[serde(default)]
    pub passes: u64,
    #[serde(default)]
    pub fails: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub test_suite_id: String,
}

impl TestResult {
    /// Fails as a percentage of tests run.
    pub fn fail_rate(&self) -> f64 {
        if self.ntests == 0 {
            0.0
        } else {
            self.fails as f64 / self.ntests as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSummary {
    pub client_name: String,
    pub client_version: String,
    pub total_tests: u64,
    pub passed_tests: u64,
    pub failed_tests: u64,
    pub pass_rate: f64,
    pub test_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub network: String,
    pub timestamp: DateTime<Utc>,
    pub total_tests: u64,
    pub total_passes: u64,
    pub total_fails: u64,
    pub overall_pass_rate: f64,
    pub client_results: BTreeMap<String, ClientSummary>,
    pub test_types: BTreeSet<String>,
    /// Latest raw result per (client, test type) this summary was built from.
    #[serde(default)]
    pub test_results: Vec<TestResult>,
}

impl SummaryResult {
    pub fn client(&self, client: &str) -> Option<&ClientSummary> {
        self.client_results.get(client)
    }

    /// Snapshot date used as the storage key.
    pub fn date_key(&self) -> String {
        self.timestamp.format("%Y-%m-%d").to_string()
    }
}

/// Keep only the newest result per (client, test type), ordered by client
/// then test type.
pub fn filter_latest_results(results: &[TestResult]) -> Vec<TestResult> {
    let mut latest: BTreeMap<(&str, &str), &TestResult> = BTreeMap::new();
    for result in results {
        let key = (result.client.as_str(), result.name.as_str());
        match latest.get(&key) {
            Some(existing) if existing.timestamp >= result.timestamp => {}
            _ => {
                latest.insert(key, result);
            }
        }
    }
    latest.into_values().cloned().collect()
}

fn pass_rate(passed: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        passed as f64 / total as f64 * 100.0
    }
}

/// Build a network snapshot from raw results. Returns `None` when there is
/// nothing to summarise.
pub fn build_summary(network: &str, results: &[TestResult]) -> Option<SummaryResult> {
    if results.is_empty() {
        return None;
    }

    let latest = filter_latest_results(results);
    let timestamp = latest
        .iter()
        .map(|r| r.timestamp)
        .max()
        .unwrap_or_else(Utc::now);

    let mut summary = SummaryResult {
        network: network.to_string(),
        timestamp,
        total_tests: 0,
        total_passes: 0,
        total_fails: 0,
        overall_pass_rate: 0.0,
        client_results: BTreeMap::new(),
        test_types: BTreeSet::new(),
        test_results: Vec::new(),
    };

    for result in &latest {
        summary.test_types.insert(result.name.clone());

        let client = summary
            .client_results
            .entry(result.client.clone())
            .or_insert_with(|| ClientSummary {
                client_name: result.client.clone(),
                client_version: "unknown".to_string(),
                total_tests: 0,
                passed_tests: 0,
                failed_tests: 0,
                pass_rate: 0.0,
                test_types: Vec::new(),
            });

        if client.client_version == "unknown" && !result.version.is_empty() {
            client.client_version = result.version.clone();
        }
        client.test_types.push(result.name.clone());
        client.passed_tests += result.passes;
        client.failed_tests += result.fails;
        client.total_tests += result.passes + result.fails;

        summary.total_passes += result.passes;
        summary.total_fails += result.fails;
        summary.total_tests += result.passes + result.fails;
    }

    for client in summary.client_results.values_mut() {
        client.pass_rate = pass_rate(client.passed_tests, client.total_tests);
    }
    summary.overall_pass_rate = pass_rate(summary.total_passes, summary.total_tests);
    summary.test_results = latest;

    Some(summary)
}
