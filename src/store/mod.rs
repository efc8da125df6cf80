//! Remote data store client.
//!
//! The store is a hosted PostgREST-style endpoint: table-scoped CRUD under
//! `<base>/rest/v1/<table>` with query-string filters, plus `rpc/<fn>` for
//! server-side functions. All durable state lives there; this module holds
//! the thin typed client and the per-table mapping boundaries.
//!
//! Store calls are not retried automatically; a failed read/write becomes
//! a `StoreError` the caller surfaces. Retry policy belongs to the search
//! controller, not this layer.

pub mod accounts;
pub mod automation;
pub mod events;
pub mod icp;
pub mod integrations;
pub mod prospects;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub use accounts::{Account, RuleOutcome, Tier};
pub use automation::{AutomationSchedule, Cadence, RunStatus, ScheduleResult, StopCondition};
pub use events::CompanyEvent;
pub use icp::{BuyingTrigger, IcpModel, IcpWeights, NumericRange};
pub use integrations::Integration;
pub use prospects::Prospect;

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Store error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid row: {0}")]
    InvalidRow(String),
    #[error("No {0} row found")]
    NotFound(&'static str),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Http(e) => e.is_timeout() || e.is_connect(),
            StoreError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Typed client over the remote store's REST surface.
#[derive(Clone)]
pub struct StoreClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl StoreClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Table read with PostgREST-style query pairs
    /// (e.g. `[("select", "*"), ("tier", "eq.A"), ("order", "created_at.desc")]`).
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, StoreError> {
        let response = self
            .authed(self.http.get(self.table_url(table)).query(query))
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Insert one or more rows, returning the stored representation.
    pub async fn insert<T: DeserializeOwned>(
        &self,
        table: &str,
        body: &impl Serialize,
    ) -> Result<Vec<T>, StoreError> {
        let response = self
            .authed(self.http.post(self.table_url(table)))
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Update a single row by primary key.
    pub async fn update_by_id(
        &self,
        table: &str,
        id: &str,
        body: &impl Serialize,
    ) -> Result<(), StoreError> {
        let response = self
            .authed(
                self.http
                    .patch(self.table_url(table))
                    .query(&[("id", format!("eq.{id}"))]),
            )
            .json(body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// Delete rows matching the query pairs.
    pub async fn delete(&self, table: &str, query: &[(&str, &str)]) -> Result<(), StoreError> {
        let response = self
            .authed(self.http.delete(self.table_url(table)).query(query))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// Call a server-side function (`POST /rest/v1/rpc/<name>`).
    pub async fn rpc(
        &self,
        name: &str,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, StoreError> {
        let response = self
            .authed(
                self.http
                    .post(format!("{}/rest/v1/rpc/{}", self.base_url, name)),
            )
            .json(args)
            .send()
            .await?;
        let response = check_status(response).await?;
        // Void functions return an empty body.
        let text = response.text().await?;
        if text.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

/// Convert a non-2xx response into `StoreError::Api`, extracting the
/// server's `message` field when the body carries one.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str().map(String::from)))
        .unwrap_or(body);

    Err(StoreError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Clamp an externally-sourced score into the 0–100 range the view model
/// guarantees.
pub(crate) fn clamp_score(raw: f64) -> u8 {
    raw.clamp(0.0, 100.0).round() as u8
}

/// Canned HTTP fixtures for store tests: one scripted response per
/// connection, recording each request line so tests can assert on the
/// exact call sequence.
#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    pub fn json_response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    /// Serve the scripted responses in order, logging "METHOD /path" for
    /// every request received.
    pub fn spawn_store(responses: Vec<String>) -> (String, Arc<Mutex<Vec<String>>>) {
        let requests: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let log = requests.clone();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let listener = TcpListener::from_std(listener).unwrap();
            for response in responses {
                let Ok((mut sock, _)) = listener.accept().await else {
                    return;
                };

                let mut buf = Vec::new();
                let mut tmp = [0u8; 1024];
                loop {
                    let n = sock.read(&mut tmp).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&tmp[..n]);
                    if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                        let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                        let body_len = head
                            .lines()
                            .find_map(|line| line.strip_prefix("content-length:"))
                            .and_then(|v| v.trim().parse::<usize>().ok())
                            .unwrap_or(0);
                        if buf.len() >= end + 4 + body_len {
                            break;
                        }
                    }
                }

                if let Some(line) = String::from_utf8_lossy(&buf).lines().next() {
                    let mut parts = line.split_whitespace();
                    if let (Some(method), Some(path)) = (parts.next(), parts.next()) {
                        log.lock().push(format!("{method} {path}"));
                    }
                }
                let _ = sock.write_all(response.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });

        (format!("http://{addr}"), requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_score_bounds() {
        assert_eq!(clamp_score(-12.0), 0);
        assert_eq!(clamp_score(0.0), 0);
        assert_eq!(clamp_score(54.4), 54);
        assert_eq!(clamp_score(100.0), 100);
        assert_eq!(clamp_score(312.0), 100);
        // NaN casts saturate to zero rather than panicking.
        assert_eq!(clamp_score(f64::NAN), 0);
    }

    #[test]
    fn retryable_classification() {
        let server = StoreError::Api {
            status: 503,
            message: "unavailable".into(),
        };
        let client = StoreError::Api {
            status: 400,
            message: "bad filter".into(),
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
    }
}
