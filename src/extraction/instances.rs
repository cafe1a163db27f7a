//! Instance extraction from failing check details.
//!
//! Node lists live under a fixed set of detail keys, one node per line,
//! with free-form annotations after the name:
//!
//! ```text
//! nimbus-geth-1 (peers: 0)
//! (stuck) teku-besu-2
//! ```
//!
//! Tokens shaped like `<a>-<b>[-<c>...]` are instance candidates;
//! parenthesized annotations are not. The first candidate with a hyphen
//! component equal to the target client is the instance name.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;

use crate::checks::result::CheckResult;
use crate::logging::structured::LogContext;

/// Detail keys that carry node lists.
pub const RELEVANT_DETAIL_KEYS: [&str; 4] =
    ["lowPeerNodes", "notSyncedNodes", "stuckNodes", "behindNodes"];

lazy_static! {
    static ref INSTANCE_TOKEN: Regex = Regex::new(r"^[A-Za-z0-9_.]+(?:-[A-Za-z0-9_.]+)+$").unwrap();
}

/// Characters stripped from the edges of a token before matching.
const TOKEN_PUNCTUATION: &[char] = &['(', ')', '[', ']', ',', ';', ':', '"', '\''];

fn instance_candidates(line: &str) -> impl Iterator<Item = &str> {
    line.split_whitespace()
        .filter(|token| !token.starts_with('('))
        .map(|token| token.trim_matches(TOKEN_PUNCTUATION))
        .filter(|token| INSTANCE_TOKEN.is_match(token))
}

/// Parse the instance name out of one detail line.
pub fn parse_instance_from_line(line: &str) -> Option<&str> {
    instance_candidates(line).next()
}

/// Parse the instance of `client` out of one detail line.
pub fn parse_instance_for_client<'a>(line: &'a str, client: &str) -> Option<&'a str> {
    instance_candidates(line).find(|token| is_attributed_to(token, client))
}

/// Whether `instance` belongs to `client`.
pub fn is_attributed_to(instance: &str, client: &str) -> bool {
    !client.is_empty() && instance.split('-').any(|component| component == client)
}

/// Collect the distinct instances of `client` named by failing checks.
pub fn extract_instances(results: &[CheckResult], client: &str, ctx: &LogContext) -> BTreeSet<String> {
    let mut instances = BTreeSet::new();
    let mut skipped = 0usize;

    for result in results.iter().filter(|r| r.is_failing()) {
        for key in RELEVANT_DETAIL_KEYS {
            let Some(value) = result.details.get(key) else {
                continue;
            };
            for line in value.lines() {
                if let Some(instance) = parse_instance_for_client(line, client) {
                    instances.insert(instance.to_string());
                } else if !line.trim().is_empty() && parse_instance_from_line(line).is_none() {
                    skipped += 1;
                }
            }
        }
    }

    if skipped > 0 {
        log::debug!("{} INSTANCE_LINES_SKIPPED count={}", ctx, skipped);
    }
    log::debug!(
        "{} INSTANCES_EXTRACTED client={} count={}",
        ctx,
        client,
        instances.len()
    );

    instances
}
