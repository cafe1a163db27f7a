//! Object key builders.
//!
//! Layout:
//! - `<prefix>/networks/<network>/checks/<client>.json` for monitored targets
//! - `<prefix>/networks/<network>/hive_summary/results/<YYYY-MM-DD>.json` for snapshots

use chrono::NaiveDate;

/// Category segment for monitored targets.
pub const TARGET_CATEGORY: &str = "checks";

const SNAPSHOT_SEGMENT: &str = "hive_summary/results";

pub fn networks_prefix(prefix: &str) -> String {
    format!("{}/networks/", prefix)
}

pub fn target_key(prefix: &str, network: &str, client: &str) -> String {
    format!("{}/networks/{}/{}/{}.json", prefix, network, TARGET_CATEGORY, client)
}

pub fn snapshot_prefix(prefix: &str, network: &str) -> String {
    format!("{}/networks/{}/{}/", prefix, network, SNAPSHOT_SEGMENT)
}

pub fn snapshot_key(prefix: &str, network: &str, date: &str) -> String {
    format!("{}{}.json", snapshot_prefix(prefix, network), date)
}

/// Whether `key` is a target document (as opposed to a snapshot or artifact).
pub fn is_target_key(key: &str) -> bool {
    let mut segments = key.rsplit('/');
    matches!(
        (segments.next(), segments.next()),
        (Some(file), Some(TARGET_CATEGORY)) if file.ends_with(".json")
    )
}

/// Parse the date out of a snapshot key; keys that do not end in a valid
/// `YYYY-MM-DD.json` yield `None`.
pub fn snapshot_date(key: &str) -> Option<NaiveDate> {
    let file = key.rsplit('/').next()?;
    let stem = file.strip_suffix(".json")?;
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}
