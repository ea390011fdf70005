//! ==============================================================================
//! error.rs - error taxonomy for the refresh pipeline
//! ==============================================================================
//!
//! purpose:
//!     typed errors for the parts of the pipeline that callers match on.
//!     setup code (config, server bind) uses anyhow instead.
//!
//! relationships:
//!     - produced by: source.rs (FetchFailure), pipeline.rs (RecordRejection)
//!     - consumed by: poller.rs (logs and skips the cycle)
//!
//! ==============================================================================

use thiserror::Error;

/// the remote store could not be read this cycle
#[derive(Debug, Error)]
pub enum FetchFailure {
    /// connection refused, dns failure, timeout, tls error...
    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote store answered HTTP {status}")]
    Status { status: u16 },

    /// body was not valid JSON
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for FetchFailure {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => FetchFailure::Status {
                status: status.as_u16(),
            },
            None => FetchFailure::Transport(e.to_string()),
        }
    }
}

/// why a single store entry could not become a SensorRecord
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordRejection {
    #[error("entry is not an object")]
    NotAnObject,

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("unparseable timestamp `{0}`")]
    InvalidTimestamp(String),
}

/// a refresh cycle that did not produce new display state
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] FetchFailure),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_field() {
        let e = RecordRejection::InvalidField {
            field: "ph",
            reason: "expected a number".into(),
        };
        assert_eq!(e.to_string(), "field `ph` is invalid: expected a number");
        assert_eq!(
            RecordRejection::MissingField("tds").to_string(),
            "missing field `tds`"
        );
    }

    #[test]
    fn test_refresh_error_is_transparent() {
        let e: RefreshError = FetchFailure::Status { status: 503 }.into();
        assert_eq!(e.to_string(), "remote store answered HTTP 503");
    }
}
