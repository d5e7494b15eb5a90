//! Configuration for the review pipeline.
//!
//! Two layers live here:
//! - [`Settings`]: API key, endpoints, models, processing options. Loaded
//!   from `.env`-style config files with environment variables taking
//!   precedence.
//! - [`KeywordsConfig`]: regex keyword rules per category, with an embedded
//!   default and a YAML override search path.

pub mod keywords;
pub mod settings;

pub use keywords::{CompiledKeywords, KeywordsConfig};
pub use settings::{Settings, Timeouts};

use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid keywords file {path}: {message}")]
    InvalidKeywords { path: String, message: String },

    #[error("invalid keyword pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}
