//! The search workflow state machine.
//!
//! Phases: Idle → Starting → Listening → {Completed | Failed | Reconnecting}.
//! Reconnecting is only entered from stream-level errors; start-level errors
//! go straight to Failed. Terminal phases end the run; a new query starts a
//! fresh run at Starting.
//!
//! Every transition and inbound update is emitted as a `SearchEvent` over an
//! mpsc channel; rendering is the consumer's concern. Dropping the consumer
//! or the run future tears the stream down; there is no other cancel path.

use std::time::Duration;

use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;

use super::stream::{parse_update, FoundCompany, ParsedUpdate, SseDecoder, StatusUpdate};
use super::{RetryPolicy, SearchError};

/// How long to wait for the TCP/TLS handshake. Deliberately no overall
/// request timeout: the status stream stays open for the life of a search.
const CONNECT_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Phases and events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchPhase {
    Idle,
    Starting,
    Listening,
    Reconnecting,
    Completed,
    Failed,
}

impl SearchPhase {
    /// True while the in-progress indicator should stay on.
    pub fn in_progress(&self) -> bool {
        matches!(
            self,
            SearchPhase::Starting | SearchPhase::Listening | SearchPhase::Reconnecting
        )
    }
}

/// What the controller tells its consumer. Informational: the run's
/// return value is the authoritative outcome.
#[derive(Debug, Clone)]
pub enum SearchEvent {
    Phase(SearchPhase),
    /// The start POST was accepted; carries the service's message.
    Started { message: String },
    /// A parsed progress update.
    Status {
        status: String,
        message: String,
        progress: Option<f32>,
    },
    /// An update that was not valid JSON, surfaced verbatim.
    Raw(String),
    /// Companies delivered by a `found` update.
    Results(Vec<FoundCompany>),
    /// Terminal failure with a user-facing message.
    Failed(String),
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    #[serde(default)]
    message: String,
}

// ============================================================================
// Controller
// ============================================================================

pub struct SearchController {
    http: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
    events: mpsc::Sender<SearchEvent>,
    phase: SearchPhase,
}

impl SearchController {
    pub fn new(base_url: &str, events: mpsc::Sender<SearchEvent>) -> Self {
        Self::with_policy(base_url, events, RetryPolicy::default())
    }

    pub fn with_policy(
        base_url: &str,
        events: mpsc::Sender<SearchEvent>,
        policy: RetryPolicy,
    ) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            policy,
            events,
            phase: SearchPhase::Idle,
        }
    }

    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    /// Run one search to completion: start the job, then follow the status
    /// stream until `complete`. Returns the companies seen on the way.
    pub async fn run(&mut self, query: &str) -> Result<Vec<FoundCompany>, SearchError> {
        self.set_phase(SearchPhase::Starting).await;

        match self.start_workflow(query).await {
            Ok(message) => {
                self.emit(SearchEvent::Started { message }).await;
            }
            Err(e) => {
                return self.fail(e).await;
            }
        }

        self.set_phase(SearchPhase::Listening).await;
        self.listen().await
    }

    // ------------------------------------------------------------------
    // Start: bounded retry with exponential backoff
    // ------------------------------------------------------------------

    /// POST the query to `/start-workflow`.
    ///
    /// Up to `start_max_attempts` tries; backoff starts at `start_backoff`
    /// and doubles. Only transport faults and 5xx are retried; a 4xx means
    /// the query itself was rejected and retrying cannot help.
    async fn start_workflow(&self, query: &str) -> Result<String, SearchError> {
        let url = format!("{}/start-workflow", self.base_url);
        let attempts = self.policy.start_max_attempts.max(1);
        let mut last_status = 0u16;

        for attempt in 1..=attempts {
            let result = self
                .http
                .post(&url)
                .json(&serde_json::json!({ "query": query }))
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let body: StartResponse = response.json().await.unwrap_or(StartResponse {
                            message: String::new(),
                        });
                        return Ok(body.message);
                    }
                    if status.is_client_error() {
                        let message = response.text().await.unwrap_or_default();
                        return Err(SearchError::StartRejected {
                            status: status.as_u16(),
                            message,
                        });
                    }
                    last_status = status.as_u16();
                    log::warn!(
                        "start-workflow attempt {attempt}/{attempts} got status {status}"
                    );
                }
                Err(e) => {
                    if attempt == attempts {
                        return Err(SearchError::Unreachable(e.to_string()));
                    }
                    log::warn!("start-workflow attempt {attempt}/{attempts} transport error: {e}");
                }
            }

            if attempt < attempts {
                let exponent = 2u32.saturating_pow(attempt - 1);
                tokio::time::sleep(self.policy.start_backoff * exponent).await;
            }
        }

        Err(SearchError::StartExhausted {
            attempts,
            status: last_status,
        })
    }

    // ------------------------------------------------------------------
    // Listen: SSE stream with bounded reconnect
    // ------------------------------------------------------------------

    /// Follow `/workflow-status` until a `complete` update.
    ///
    /// A stream-level error is never terminal by itself: wait the fixed
    /// reconnect delay and reopen, keeping the in-progress state active.
    /// The loop is bounded: `max_reconnect_attempts` consecutive failed
    /// cycles give up with a terminal error rather than hammering a dead
    /// endpoint forever. Any received event resets the budget.
    async fn listen(&mut self) -> Result<Vec<FoundCompany>, SearchError> {
        let url = format!("{}/workflow-status", self.base_url);
        let mut consecutive_failures = 0u32;
        let mut results: Vec<FoundCompany> = Vec::new();

        loop {
            match self.http.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    let mut decoder = SseDecoder::new();
                    let mut body = response.bytes_stream();

                    loop {
                        match body.next().await {
                            Some(Ok(chunk)) => {
                                for payload in decoder.feed(&chunk) {
                                    consecutive_failures = 0;
                                    if let Some(done) =
                                        self.handle_payload(&payload, &mut results).await
                                    {
                                        return done;
                                    }
                                }
                            }
                            Some(Err(e)) => {
                                log::warn!("status stream error: {e}");
                                break;
                            }
                            None => {
                                // Server closed without `complete`: flush a
                                // trailing event, then treat as a dropped stream.
                                if let Some(payload) = decoder.finish() {
                                    consecutive_failures = 0;
                                    if let Some(done) =
                                        self.handle_payload(&payload, &mut results).await
                                    {
                                        return done;
                                    }
                                }
                                log::warn!("status stream closed before completion");
                                break;
                            }
                        }
                    }
                }
                Ok(response) => {
                    log::warn!("status stream request got status {}", response.status());
                }
                Err(e) => {
                    log::warn!("status stream connect failed: {e}");
                }
            }

            consecutive_failures += 1;
            if consecutive_failures > self.policy.max_reconnect_attempts {
                return self
                    .fail(SearchError::GaveUp {
                        attempts: self.policy.max_reconnect_attempts,
                    })
                    .await;
            }

            self.set_phase(SearchPhase::Reconnecting).await;
            tokio::time::sleep(self.policy.reconnect_delay).await;
            self.set_phase(SearchPhase::Listening).await;
        }
    }

    /// Process one event payload. Returns `Some(outcome)` when the run is
    /// over (a `complete` update arrived).
    async fn handle_payload(
        &mut self,
        payload: &str,
        results: &mut Vec<FoundCompany>,
    ) -> Option<Result<Vec<FoundCompany>, SearchError>> {
        match parse_update(payload) {
            ParsedUpdate::Status(update) => {
                self.forward_status(&update, results).await;
                if update.is_complete() {
                    self.set_phase(SearchPhase::Completed).await;
                    return Some(Ok(std::mem::take(results)));
                }
            }
            ParsedUpdate::Raw(text) => {
                self.emit(SearchEvent::Raw(text)).await;
            }
        }
        None
    }

    async fn forward_status(&mut self, update: &StatusUpdate, results: &mut Vec<FoundCompany>) {
        if !update.companies.is_empty() {
            *results = update.companies.clone();
            self.emit(SearchEvent::Results(update.companies.clone()))
                .await;
        }
        self.emit(SearchEvent::Status {
            status: update.status.clone(),
            message: update.message.clone(),
            progress: update.progress,
        })
        .await;
    }

    async fn fail(&mut self, error: SearchError) -> Result<Vec<FoundCompany>, SearchError> {
        self.emit(SearchEvent::Failed(error.to_string())).await;
        self.set_phase(SearchPhase::Failed).await;
        Err(error)
    }

    async fn set_phase(&mut self, phase: SearchPhase) {
        self.phase = phase;
        self.emit(SearchEvent::Phase(phase)).await;
    }

    /// Send failures mean the consumer went away (teardown); the run future
    /// is cancelled by drop, so just stop reporting.
    async fn emit(&self, event: SearchEvent) {
        let _ = self.events.send(event).await;
    }
}

// ============================================================================
// Tests: canned HTTP/1.1 fixtures over a local listener
// ============================================================================
