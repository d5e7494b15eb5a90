//! Core types for the review pipeline
//!
//! This crate provides the entity types shared by every other crate:
//! - Transcript types (segments, full transcription)
//! - Detection and point-of-interest types
//! - The unified finding record produced by VLM analysis
//! - Pipeline stages and the error taxonomy
//!
//! Entities flow forward through the pipeline only; nothing here performs
//! I/O or retains cross-run state.

pub mod detection;
pub mod error;
pub mod finding;
pub mod poi;
pub mod stage;
pub mod transcript;

pub use detection::{Category, Detection, FilterLevel};
pub use error::{Error, PipelineError, Result};
pub use finding::{Sentiment, Severity, UnifiedFinding};
pub use poi::PointOfInterest;
pub use stage::Stage;
pub use transcript::{Segment, Transcription};

/// Format seconds as `MM:SS`.
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(65.4), "01:05");
        assert_eq!(format_timestamp(600.0), "10:00");
        assert_eq!(format_timestamp(-3.0), "00:00");
    }
}
