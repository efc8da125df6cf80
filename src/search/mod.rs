//! Search/enrichment workflow client.
//!
//! Drives a user-initiated company search through two remote calls: a POST
//! that starts the job on the workflow service, then a server-sent-event
//! stream of progress updates until a `complete` status arrives. This is
//! the one state-machine-shaped piece of the client; everything it learns
//! is emitted as `SearchEvent`s for the consumer to render.

pub mod controller;
pub mod stream;

use std::time::Duration;

pub use controller::{SearchController, SearchEvent, SearchPhase};
pub use stream::{FoundCompany, ParsedUpdate, StatusUpdate};

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The workflow service rejected the query (4xx). Not transient.
    #[error("Could not start search (status {status}): {message}")]
    StartRejected { status: u16, message: String },
    /// Start attempts exhausted against server-side failures.
    #[error("Could not start search after {attempts} attempts (last status {status})")]
    StartExhausted { attempts: u32, status: u16 },
    /// Transport never reached the service.
    #[error("Network unreachable: {0}")]
    Unreachable(String),
    /// The status stream failed and the reconnect budget ran out.
    #[error("Gave up reconnecting to the status stream after {attempts} attempts")]
    GaveUp { attempts: u32 },
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl SearchError {
    /// Whether re-running the same query could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SearchError::StartRejected { .. })
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            SearchError::StartRejected { .. } => "Rephrase the query and try again.",
            SearchError::StartExhausted { .. } => "The search service is having trouble. Retry in a moment.",
            SearchError::Unreachable(_) => "Check your internet connection and try again.",
            SearchError::GaveUp { .. } => "The status stream is down. Re-run the search later.",
            SearchError::Unexpected(_) => "Try the search again.",
        }
    }
}

// ============================================================================
// Retry policy
// ============================================================================

/// Timing knobs for the start call and the stream reconnect loop.
///
/// Defaults carry the production timings; tests shrink them to
/// millisecond scale.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts for the start POST (1 initial + retries).
    pub start_max_attempts: u32,
    /// Backoff before the second start attempt; doubles each retry.
    pub start_backoff: Duration,
    /// Fixed delay before reopening a failed status stream.
    pub reconnect_delay: Duration,
    /// Consecutive failed stream cycles before giving up.
    pub max_reconnect_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            start_max_attempts: 3,
            start_backoff: Duration::from_secs(1),
            reconnect_delay: Duration::from_secs(3),
            max_reconnect_attempts: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_carries_production_timings() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.start_max_attempts, 3);
        assert_eq!(policy.start_backoff, Duration::from_secs(1));
        assert_eq!(policy.reconnect_delay, Duration::from_secs(3));
        assert_eq!(policy.max_reconnect_attempts, 5);
    }

    #[test]
    fn only_rejected_queries_are_terminal() {
        assert!(!SearchError::StartRejected {
            status: 400,
            message: "bad query".into()
        }
        .is_retryable());
        assert!(SearchError::Unreachable("dns".into()).is_retryable());
        assert!(SearchError::GaveUp { attempts: 5 }.is_retryable());
    }
}
