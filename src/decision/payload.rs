//! Notification payload.
//!
//! Presentation-neutral content of an alert; the notification sink renders it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::checks::result::Category;
use crate::regression::detector::ClientRegression;

/// Failing check names of one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryIssues {
    pub category: Category,
    pub checks: Vec<String>,
}

/// A regular instance with its access hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegularInstance {
    pub name: String,
    pub ssh_command: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceBuckets {
    pub regular: Vec<RegularInstance>,
    pub unrelated: Vec<String>,
    pub infrastructure: Vec<String>,
}

/// Optional binary attachment such as a rendered test-result screenshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub network: String,
    pub client: String,
    pub check_id: String,
    /// `0xRRGGBB`, stable per network.
    pub color: u32,
    pub timestamp: DateTime<Utc>,
    /// Distinct failing check names.
    pub active_issues: usize,
    pub categories: Vec<CategoryIssues>,
    pub instances: InstanceBuckets,
    pub regression: Option<ClientRegression>,
    pub mentions: Vec<String>,
    pub attachment: Option<Attachment>,
}

impl NotificationPayload {
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn footer(&self) -> String {
        format!("ID: {}", self.check_id)
    }
}

/// Upper-case the first character: `nimbus` -> `Nimbus`.
pub fn title_case(client: &str) -> String {
    let mut chars = client.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Deterministic colour for `seed`, steering the hue away from greens.
pub fn color_for(seed: &str) -> u32 {
    let hash = Sha256::digest(seed.as_bytes());

    let hue = remap_hue(hash[0] as f64 / 255.0);
    let saturation = 0.75;
    let lightness = 0.55 + hash[10] as f64 / 255.0 * 0.15;

    let (r, g, b) = hsl_to_rgb(hue, saturation, lightness);
    (r << 16) | (g << 8) | b
}

fn remap_hue(hue: f64) -> f64 {
    let mut degrees = hue * 360.0;
    if (90.0..=180.0).contains(&degrees) {
        degrees = 180.0 + (degrees - 90.0);
    }
    degrees / 360.0
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u32, u32, u32) {
    if s == 0.0 {
        let v = (l * 255.0).round() as u32;
        return (v, v, v);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    let channel = |t: f64| (hue_to_rgb(p, q, t) * 255.0).round() as u32;
    (channel(h + 1.0 / 3.0), channel(h), channel(h - 1.0 / 3.0))
}

fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("nimbus"), "Nimbus");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_color_is_stable_and_in_range() {
        let a = color_for("devnet-7");
        assert_eq!(a, color_for("devnet-7"));
        assert!(a <= 0xFF_FF_FF);
    }

    #[test]
    fn test_remap_hue_skips_green() {
        for step in 0..=100 {
            let degrees = remap_hue(step as f64 / 100.0) * 360.0;
            assert!(!(90.0..180.0).contains(&degrees), "hue {} is green", degrees);
        }
    }

    #[test]
    fn test_hsl_to_rgb_primaries() {
        assert_eq!(hsl_to_rgb(0.0, 1.0, 0.5), (255, 0, 0));
        assert_eq!(hsl_to_rgb(2.0 / 3.0, 1.0, 0.5), (0, 0, 255));
        assert_eq!(hsl_to_rgb(0.0, 0.0, 0.5), (128, 128, 128));
    }
}
