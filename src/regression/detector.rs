//! Regression detection between two snapshots.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::summary::{SummaryResult, TestResult};

/// A test type whose failures grew.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestTypeRegression {
    pub test_type: String,
    pub increase: u64,
    /// Current fail rate, percent.
    pub fail_rate: f64,
}

/// A client whose failures grew.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRegression {
    pub client: String,
    pub previous_failed: u64,
    pub current_failed: u64,
    pub increase: u64,
    /// Ordered by test type.
    pub test_types: Vec<TestTypeRegression>,
}

impl ClientRegression {
    /// One-paragraph description, e.g.
    /// ``3 new failures (from 2 to 5)\n  Affected tests: `consensus` (+3, 33.3% fail rate)``.
    pub fn describe(&self) -> String {
        let mut message = format!(
            "{} new failures (from {} to {})",
            self.increase, self.previous_failed, self.current_failed
        );
        if !self.test_types.is_empty() {
            let affected: Vec<String> = self
                .test_types
                .iter()
                .map(|t| format!("`{}` (+{}, {:.1}% fail rate)", t.test_type, t.increase, t.fail_rate))
                .collect();
            let _ = write!(message, "\n  Affected tests: {}", affected.join(", "));
        }
        message
    }
}

/// Regressions keyed by client, in client order.
pub type Regressions = BTreeMap<String, ClientRegression>;

type GroupedResults<'a> = BTreeMap<&'a str, BTreeMap<&'a str, &'a TestResult>>;

/// Latest result per (client, test type), skipping runs with no tests.
fn group_by_client_and_test_type(results: &[TestResult]) -> GroupedResults<'_> {
    let mut grouped: GroupedResults<'_> = BTreeMap::new();
    for result in results.iter().filter(|r| r.ntests > 0) {
        let by_type = grouped.entry(result.client.as_str()).or_default();
        match by_type.get(result.name.as_str()) {
            Some(existing) if existing.timestamp >= result.timestamp => {}
            _ => {
                by_type.insert(result.name.as_str(), result);
            }
        }
    }
    grouped
}

fn test_type_regressions(
    client: &str,
    current: &GroupedResults<'_>,
    previous: &GroupedResults<'_>,
) -> Vec<TestTypeRegression> {
    let (Some(current), Some(previous)) = (current.get(client), previous.get(client)) else {
        return Vec::new();
    };

    current
        .iter()
        .filter(|(_, result)| result.fails > 0)
        .filter_map(|(test_type, result)| {
            let prior = previous.get(test_type)?;
            (result.fails > prior.fails).then(|| TestTypeRegression {
                test_type: test_type.to_string(),
                increase: result.fails - prior.fails,
                fail_rate: result.fail_rate(),
            })
        })
        .collect()
}

/// Compare `current` against `previous`.
///
/// `raw_results` are the current cycle's raw results; the previous side of
/// the per-test-type comparison uses `previous.test_results`.
pub fn detect(current: &SummaryResult, previous: &SummaryResult, raw_results: &[TestResult]) -> Regressions {
    let current_grouped = group_by_client_and_test_type(raw_results);
    let previous_grouped = group_by_client_and_test_type(&previous.test_results);

    let mut regressions = Regressions::new();
    for (client, summary) in &current.client_results {
        if summary.failed_tests == 0 {
            continue;
        }
        let Some(prior) = previous.client_results.get(client) else {
            continue;
        };
        if summary.failed_tests <= prior.failed_tests {
            continue;
        }

        regressions.insert(
            client.clone(),
            ClientRegression {
                client: client.clone(),
                previous_failed: prior.failed_tests,
                current_failed: summary.failed_tests,
                increase: summary.failed_tests - prior.failed_tests,
                test_types: test_type_regressions(client, &current_grouped, &previous_grouped),
            },
        );
    }
    regressions
}

/// Bullet list of all regressions, or a fixed line when there are none.
pub fn format_regressions(regressions: &Regressions) -> String {
    if regressions.is_empty() {
        return "No regressions detected".to_string();
    }
    regressions
        .values()
        .map(|r| format!("• **{}**: {}", r.client, r.describe()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regression::summary::build_summary;
    use crate::regression::summary::tests::result;
    use proptest::prelude::*;

    #[test]
    fn test_geth_regression() {
        let previous = build_summary("devnet-7", &[result("geth", "consensus", 10, 2, 1)]).unwrap();
        let raw = vec![result("geth", "consensus", 10, 5, 2)];
        let current = build_summary("devnet-7", &raw).unwrap();

        let regressions = detect(&current, &previous, &raw);
        let geth = &regressions["geth"];
        assert_eq!(geth.increase, 3);
        assert_eq!(geth.previous_failed, 2);
        assert_eq!(geth.current_failed, 5);
        assert_eq!(geth.test_types.len(), 1);
        assert_eq!(geth.test_types[0].test_type, "consensus");
        assert_eq!(geth.test_types[0].increase, 3);
        assert_eq!(
            geth.describe(),
            "3 new failures (from 2 to 5)\n  Affected tests: `consensus` (+3, 33.3% fail rate)"
        );
    }

    #[test]
    fn test_new_client_and_zero_failures_skipped() {
        let previous = build_summary("devnet-7", &[result("geth", "consensus", 10, 2, 1)]).unwrap();
        let raw = vec![
            result("geth", "consensus", 12, 0, 2),
            result("besu", "consensus", 10, 4, 2),
        ];
        let current = build_summary("devnet-7", &raw).unwrap();
        assert!(detect(&current, &previous, &raw).is_empty());
    }

    #[test]
    fn test_improvement_is_not_regression() {
        let previous = build_summary("devnet-7", &[result("geth", "consensus", 10, 5, 1)]).unwrap();
        let raw = vec![result("geth", "consensus", 10, 2, 2)];
        let current = build_summary("devnet-7", &raw).unwrap();
        assert!(detect(&current, &previous, &raw).is_empty());
    }

    #[test]
    fn test_new_test_type_not_attributed() {
        let previous = build_summary("devnet-7", &[result("geth", "consensus", 10, 2, 1)]).unwrap();
        let raw = vec![
            result("geth", "consensus", 10, 2, 2),
            result("geth", "rpc", 5, 3, 2),
        ];
        let current = build_summary("devnet-7", &raw).unwrap();

        let regressions = detect(&current, &previous, &raw);
        assert_eq!(regressions["geth"].increase, 3);
        assert!(regressions["geth"].test_types.is_empty());
        assert_eq!(regressions["geth"].describe(), "3 new failures (from 2 to 5)");
    }

    #[test]
    fn test_output_is_ordered() {
        let previous = build_summary(
            "devnet-7",
            &[
                result("reth", "rpc", 10, 1, 1),
                result("besu", "sync", 10, 1, 1),
                result("besu", "consensus", 10, 1, 1),
            ],
        )
        .unwrap();
        let raw = vec![
            result("reth", "rpc", 10, 4, 2),
            result("besu", "sync", 10, 2, 2),
            result("besu", "consensus", 10, 3, 2),
        ];
        let current = build_summary("devnet-7", &raw).unwrap();

        let regressions = detect(&current, &previous, &raw);
        let clients: Vec<&String> = regressions.keys().collect();
        assert_eq!(clients, vec!["besu", "reth"]);
        let besu_types: Vec<&str> = regressions["besu"]
            .test_types
            .iter()
            .map(|t| t.test_type.as_str())
            .collect();
        assert_eq!(besu_types, vec!["consensus", "sync"]);

        let formatted = format_regressions(&regressions);
        assert!(formatted.starts_with("• **besu**: 3 new failures (from 2 to 5)"));
        assert!(formatted.contains("• **reth**: 3 new failures (from 1 to 4)"));
    }

    #[test]
    fn test_format_empty() {
        assert_eq!(format_regressions(&Regressions::new()), "No regressions detected");
    }

    proptest! {
        #[test]
        fn prop_regression_monotonicity(previous_fails in 0u64..50, current_fails in 0u64..50) {
            let previous = build_summary("devnet-7", &[result("geth", "consensus", 100, previous_fails, 1)]).unwrap();
            let raw = vec![result("geth", "consensus", 100, current_fails, 2)];
            let current = build_summary("devnet-7", &raw).unwrap();

            let regressions = detect(&current, &previous, &raw);
            if current_fails > previous_fails {
                prop_assert_eq!(regressions["geth"].increase, current_fails - previous_fails);
            } else {
                prop_assert!(!regressions.contains_key("geth"));
            }
        }
    }
}
