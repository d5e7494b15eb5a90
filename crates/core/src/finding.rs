//! The unified finding record: semantic + visual analysis for one moment.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::detection::Category;

/// Issue severity as reported by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    None,
}

impl Severity {
    /// Rank for max-severity merging: critical=4 > high=3 > medium=2 >
    /// low=1 > none=0.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 4,
            Severity::High => 3,
            Severity::Medium => 2,
            Severity::Low => 1,
            Severity::None => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::None => "none",
        }
    }

    /// Parse from model output. `Medium` is the default when the field is
    /// missing or unrecognized.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            "none" => Severity::None,
            _ => Severity::Medium,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the speaker reports a problem or confirms things are fine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Problem,
    Positive,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Problem => "problem",
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "positive" => Sentiment::Positive,
            "neutral" => Sentiment::Neutral,
            _ => Sentiment::Problem,
        }
    }
}

/// Combined semantic + visual analysis of a finding.
///
/// Produced by a single VLM call that sees both the screenshot and the
/// transcript context together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedFinding {
    // Identity
    pub detection_id: i64,
    pub timestamp: f64,
    #[serde(default)]
    pub screenshot_path: Option<PathBuf>,

    // Semantic fields
    pub category: Category,
    pub is_issue: bool,
    pub sentiment: Sentiment,
    pub severity: Severity,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub action_items: Vec<String>,
    #[serde(default)]
    pub affected_components: Vec<String>,
    #[serde(default)]
    pub suggested_fix: String,

    // Visual fields
    #[serde(default)]
    pub ui_elements: Vec<String>,
    #[serde(default)]
    pub issues_detected: Vec<String>,
    #[serde(default)]
    pub accessibility_notes: Vec<String>,
    #[serde(default)]
    pub design_feedback: String,
    #[serde(default)]
    pub technical_observations: String,

    // Provenance
    /// Server response id, chained into the next analyzer call.
    #[serde(default)]
    pub response_id: String,
    /// `(detection_id, timestamp)` of findings absorbed during dedup.
    #[serde(default)]
    pub merged_from_ids: Vec<(i64, f64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_rank_order() {
        assert!(Severity::Critical.rank() > Severity::High.rank());
        assert!(Severity::High.rank() > Severity::Medium.rank());
        assert!(Severity::Medium.rank() > Severity::Low.rank());
        assert!(Severity::Low.rank() > Severity::None.rank());
    }

    #[test]
    fn test_severity_parse_default_medium() {
        assert_eq!(Severity::parse("CRITICAL"), Severity::Critical);
        assert_eq!(Severity::parse("whatever"), Severity::Medium);
        assert_eq!(Severity::parse(""), Severity::Medium);
    }

    #[test]
    fn test_sentiment_parse_default_problem() {
        assert_eq!(Sentiment::parse("positive"), Sentiment::Positive);
        assert_eq!(Sentiment::parse("odd"), Sentiment::Problem);
    }

    #[test]
    fn test_finding_deserialize_with_defaults() {
        // Older checkpoints carry only the identity and semantic core.
        let json = r#"{
            "detection_id": 7,
            "timestamp": 12.5,
            "category": "bug",
            "is_issue": true,
            "sentiment": "problem",
            "severity": "high"
        }"#;
        let f: UnifiedFinding = serde_json::from_str(json).unwrap();
        assert_eq!(f.detection_id, 7);
        assert!(f.action_items.is_empty());
        assert!(f.merged_from_ids.is_empty());
        assert!(f.screenshot_path.is_none());
        assert_eq!(f.response_id, "");
    }

    #[test]
    fn test_merged_from_ids_roundtrip() {
        let json = r#"{
            "detection_id": 1,
            "timestamp": 0.0,
            "category": "ui",
            "is_issue": false,
            "sentiment": "neutral",
            "severity": "none",
            "merged_from_ids": [[4, 18.0], [9, 22.5]]
        }"#;
        let f: UnifiedFinding = serde_json::from_str(json).unwrap();
        assert_eq!(f.merged_from_ids, vec![(4, 18.0), (9, 22.5)]);
    }
}
