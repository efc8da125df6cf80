//! Top-level error taxonomy for the engine.
//!
//! Errors are classified by recoverability:
//! - Retryable: transport faults, timeouts, 5xx from the workflow service
//! - NonRetryable: rejected input (4xx), configuration problems
//! - GaveUp: a bounded retry/reconnect loop exhausted its budget

use thiserror::Error;

use crate::search::SearchError;
use crate::store::StoreError;

/// Engine-level error, the boundary type the CLI and scheduler report on.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("Activation failed: {0}")]
    Activation(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl EngineError {
    /// Returns true if retrying the same action could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Search(e) => e.is_retryable(),
            EngineError::Store(e) => e.is_retryable(),
            EngineError::Activation(_) => true,
            EngineError::Config(_) | EngineError::Scheduler(_) | EngineError::Io(_) => false,
        }
    }

    /// Get a user-friendly recovery suggestion.
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EngineError::Config(_) => "Check your configuration in ~/.icp-intel/config.json",
            EngineError::Store(_) => "Check the data store URL and API key, then retry.",
            EngineError::Search(e) => e.recovery_suggestion(),
            EngineError::Activation(_) => "Verify the activation proxy is running and retry.",
            EngineError::Scheduler(_) => "Check the schedule definition and timezone.",
            EngineError::Io(_) => "Check file permissions and disk space.",
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

/// Serializable error representation for surfaces that render errors
/// (schedule result rows, CLI JSON output).
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub message: String,
    pub can_retry: bool,
    pub recovery_suggestion: String,
}

impl From<&EngineError> for ErrorReport {
    fn from(err: &EngineError) -> Self {
        ErrorReport {
            message: err.to_string(),
            can_retry: err.is_retryable(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_carries_retryability() {
        let rejected = EngineError::Search(SearchError::StartRejected {
            status: 422,
            message: "empty query".into(),
        });
        let report = ErrorReport::from(&rejected);
        assert!(!report.can_retry);
        assert!(report.message.contains("422"));

        let outage = EngineError::Store(StoreError::Api {
            status: 503,
            message: "maintenance".into(),
        });
        assert!(ErrorReport::from(&outage).can_retry);
    }
}
