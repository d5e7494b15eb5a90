//! Error taxonomy for the pipeline.
//!
//! Fatal classes (`Config`, `Input`, `Resource`) abort the current video.
//! Everything else is either retried inside the transport layer or recorded
//! as a [`PipelineError`] so a partial report can still be emitted.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stage::Stage;

/// Top-level pipeline error.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid API key, contradictory endpoints, unknown model.
    #[error("configuration error: {0}")]
    Config(String),

    /// Missing video, rejected audio quality, malformed keywords file.
    #[error("input error: {0}")]
    Input(String),

    /// Transport failure that survived the retry loop.
    #[error("transport error: {0}")]
    Transport(String),

    /// Media tool missing or a media subprocess failed.
    #[error("media error: {0}")]
    Media(String),

    /// Model output that resisted repair.
    #[error("parse error: {0}")]
    Parse(String),

    /// Filesystem failure.
    #[error("resource error: {0}")]
    Resource(String),

    /// User interrupt. State is preserved for `--resume`.
    #[error("cancelled")]
    Cancelled,
}

impl Error {
    /// Fatal errors abort the current video; the rest are appended to the
    /// pipeline error list and the run advances.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::Input(_)
                | Error::Media(_)
                | Error::Resource(_)
                | Error::Cancelled
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Resource(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A non-fatal failure recorded during a run and surfaced in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineError {
    pub stage: String,
    pub message: String,
}

impl PipelineError {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage: stage.as_str().to_string(),
            message: message.into(),
        }
    }

    /// For failures that do not map onto a stage (e.g. summary generation).
    pub fn named(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::Config("no key".into()).is_fatal());
        assert!(Error::Input("bad audio".into()).is_fatal());
        assert!(Error::Cancelled.is_fatal());
        assert!(!Error::Transport("503".into()).is_fatal());
        assert!(!Error::Parse("not json".into()).is_fatal());
    }

    #[test]
    fn test_pipeline_error_record() {
        let e = PipelineError::new(Stage::UnifiedAnalysis, "worker died");
        assert_eq!(e.stage, "unified_analysis");
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("worker died"));
    }
}
