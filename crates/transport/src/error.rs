//! Transport error classification.

use thiserror::Error;

/// Status codes that justify a retry.
pub const RETRIABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// An HTTP transport failure.
///
/// The transient/permanent split is the contract the retry loop and the
/// pipeline coordinator both rely on: transient errors are retried here,
/// permanent ones propagate immediately.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Whether this error should trigger a retry.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Timeout(_) | TransportError::Connect(_) => true,
            TransportError::Status { status, .. } => RETRIABLE_STATUS_CODES.contains(status),
            TransportError::Decode(_) => false,
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Decode(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(TransportError::Timeout("t".into()).is_transient());
        assert!(TransportError::Connect("c".into()).is_transient());
        for status in RETRIABLE_STATUS_CODES {
            assert!(TransportError::Status { status, body: String::new() }.is_transient());
        }
        for status in [400, 401, 403, 404, 422] {
            assert!(!TransportError::Status { status, body: String::new() }.is_transient());
        }
        assert!(!TransportError::Decode("bad json".into()).is_transient());
    }
}
