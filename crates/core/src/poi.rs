//! Points of interest identified by semantic pre-filtering.

use serde::{Deserialize, Serialize};

use crate::detection::Category;

/// A ranked time range flagged by the semantic pre-filter.
///
/// Represents a moment in the video that may contain a finding, identified
/// from the transcript alone before any frame extraction occurs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub start: f64,
    pub end: f64,
    pub category: Category,
    /// Model confidence in [0, 1].
    pub confidence: f64,
    /// Why this range was flagged.
    pub reasoning: String,
    /// The relevant transcript text.
    pub excerpt: String,
    /// Ids of the source segments covering this range.
    #[serde(default)]
    pub segment_ids: Vec<i64>,
}

impl PointOfInterest {
    /// Midpoint timestamp, the natural frame-extraction anchor.
    pub fn midpoint(&self) -> f64 {
        (self.start + self.end) / 2.0
    }
}
