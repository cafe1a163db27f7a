//! Check result and analysis models.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Check category. Payloads list categories in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    General,
    Sync,
}

impl Category {
    pub const ORDERED: [Category; 2] = [Category::General, Category::Sync];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Sync => "sync",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::General => write!(f, "General"),
            Category::Sync => write!(f, "Sync"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pass,
    Fail,
}

/// A detail value attached to a check result.
///
/// Node lists arrive either as one newline-separated text block or as a
/// list of lines; both are read line by line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailValue {
    Text(String),
    Number(f64),
    List(Vec<String>),
}

impl DetailValue {
    /// Textual lines carried by this value. Numbers have none.
    pub fn lines(&self) -> Vec<&str> {
        match self {
            DetailValue::Text(text) => text.lines().collect(),
            DetailValue::List(items) => items.iter().map(|s| s.as_str()).collect(),
            DetailValue::Number(_) => Vec::new(),
        }
    }

    /// Keep only the lines matching `keep`. Returns `None` when nothing
    /// textual survives.
    pub fn retain_lines<F>(&self, keep: F) -> Option<DetailValue>
    where
        F: Fn(&str) -> bool,
    {
        match self {
            DetailValue::Text(text) => {
                let kept: Vec<&str> = text.lines().filter(|l| keep(l)).collect();
                if kept.is_empty() {
                    None
                } else {
                    Some(DetailValue::Text(kept.join("\n")))
                }
            }
            DetailValue::List(items) => {
                let kept: Vec<String> = items.iter().filter(|l| keep(l)).cloned().collect();
                if kept.is_empty() {
                    None
                } else {
                    Some(DetailValue::List(kept))
                }
            }
            DetailValue::Number(_) => None,
        }
    }
}

impl From<&str> for DetailValue {
    fn from(value: &str) -> Self {
        DetailValue::Text(value.to_string())
    }
}

impl From<f64> for DetailValue {
    fn from(value: f64) -> Self {
        DetailValue::Number(value)
    }
}

impl From<Vec<String>> for DetailValue {
    fn from(value: Vec<String>) -> Self {
        DetailValue::List(value)
    }
}

/// One health signal. Immutable once produced by a check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub category: Category,
    pub status: Status,
    #[serde(default)]
    pub description: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub details: BTreeMap<String, DetailValue>,
    #[serde(default)]
    pub affected_nodes: Vec<String>,
}

impl CheckResult {
    pub fn new(name: &str, category: Category, status: Status) -> Self {
        Self {
            name: name.to_string(),
            category,
            status,
            description: String::new(),
            timestamp: Utc::now(),
            details: BTreeMap::new(),
            affected_nodes: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<DetailValue>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn with_affected_nodes<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.affected_nodes = nodes.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_failing(&self) -> bool {
        self.status == Status::Fail
    }
}

/// Correlation output for one evaluation. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub root_cause: BTreeSet<String>,
    pub unexplained_issues: Vec<String>,
    #[serde(default)]
    pub root_cause_evidence: BTreeMap<String, String>,
}

impl AnalysisResult {
    pub fn is_root_cause(&self, client: &str) -> bool {
        self.root_cause.contains(client)
    }

    /// Whether any unexplained issue textually references `client`.
    pub fn has_unexplained_issue_for(&self, client: &str) -> bool {
        self.unexplained_issues.iter().any(|issue| issue.contains(client))
    }
}
