//! Server-sent-event decoding for the workflow status stream.
//!
//! The stream arrives as raw bytes; `SseDecoder` reassembles them into
//! event payloads (`data:` lines, events separated by a blank line), and
//! `parse_update` turns a payload into a typed status update. Payloads
//! that are not valid JSON are surfaced verbatim; the consumer must see
//! every update, parseable or not.

use serde::{Deserialize, Serialize};

// ============================================================================
// Wire types
// ============================================================================

/// One progress update from the workflow service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// `processing`, `searching`, `found`, `complete`, or free-form.
    pub status: String,
    #[serde(default)]
    pub message: String,
    /// Optional 0–100 completion percentage.
    #[serde(default)]
    pub progress: Option<f32>,
    /// Companies discovered so far; populated on `found` updates.
    #[serde(default)]
    pub companies: Vec<FoundCompany>,
}

impl StatusUpdate {
    pub fn is_complete(&self) -> bool {
        self.status == "complete"
    }
}

/// A company delivered through the status stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoundCompany {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub employee_count: Option<i64>,
    #[serde(default)]
    pub fit_score: Option<f64>,
}

/// Result of parsing one event payload.
#[derive(Debug, Clone)]
pub enum ParsedUpdate {
    Status(StatusUpdate),
    /// Payload was not JSON; carried through untouched.
    Raw(String),
}

/// Parse an event's `data` payload, falling back to the verbatim text.
pub fn parse_update(data: &str) -> ParsedUpdate {
    match serde_json::from_str::<StatusUpdate>(data) {
        Ok(update) => ParsedUpdate::Status(update),
        Err(_) => ParsedUpdate::Raw(data.to_string()),
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// Incremental SSE frame decoder.
///
/// Feed it byte chunks as they arrive; it yields completed event data
/// payloads. Handles multi-line `data:` fields (joined with `\n`), CRLF
/// line endings, and ignores comment lines and non-data fields; the
/// status stream only ever uses `data`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    data_lines: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk, returning every event payload it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                // Blank line terminates the current event.
                if !self.data_lines.is_empty() {
                    events.push(self.data_lines.join("\n"));
                    self.data_lines.clear();
                }
            } else if let Some(rest) = line.strip_prefix("data:") {
                self.data_lines.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
            }
            // `event:`, `id:`, `retry:` and `:` comments are ignored.
        }
        events
    }

    /// Flush a trailing event that was never terminated by a blank line
    /// (stream closed mid-event).
    pub fn finish(&mut self) -> Option<String> {
        if let Some(rest) = self.buffer.trim_end_matches(['\n', '\r']).strip_prefix("data:") {
            self.data_lines
                .push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        }
        self.buffer.clear();
        if self.data_lines.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.data_lines).join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_event() {
        let mut decoder = SseDecoder::new();
        let events =
            decoder.feed(b"data: {\"status\":\"searching\",\"message\":\"scanning\"}\n\n");
        assert_eq!(events.len(), 1);
        match parse_update(&events[0]) {
            ParsedUpdate::Status(u) => {
                assert_eq!(u.status, "searching");
                assert_eq!(u.message, "scanning");
                assert!(u.progress.is_none());
            }
            ParsedUpdate::Raw(_) => panic!("expected parsed status"),
        }
    }

    #[test]
    fn reassembles_split_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {\"status\":\"proc").is_empty());
        assert!(decoder.feed(b"essing\",\"message\":\"working\"}\n").is_empty());
        let events = decoder.feed(b"\n");
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn joins_multi_line_data() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: first\ndata: second\n\n");
        assert_eq!(events, vec!["first\nsecond".to_string()]);
    }

    #[test]
    fn ignores_comments_and_other_fields() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b": keepalive\nevent: status\nid: 7\ndata: x\n\n");
        assert_eq!(events, vec!["x".to_string()]);
    }

    #[test]
    fn handles_crlf() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: y\r\n\r\n");
        assert_eq!(events, vec!["y".to_string()]);
    }

    #[test]
    fn unparseable_payload_surfaces_verbatim() {
        match parse_update("Search engine warming up...") {
            ParsedUpdate::Raw(text) => assert_eq!(text, "Search engine warming up..."),
            ParsedUpdate::Status(_) => panic!("plain text must stay raw"),
        }
    }

    #[test]
    fn found_update_carries_companies() {
        let payload = r#"{
            "status": "found",
            "message": "12 matches",
            "progress": 60,
            "companies": [{ "name": "Acme", "domain": "acme.io", "fit_score": 88 }]
        }"#;
        match parse_update(payload) {
            ParsedUpdate::Status(u) => {
                assert_eq!(u.companies.len(), 1);
                assert_eq!(u.companies[0].domain, "acme.io");
                assert_eq!(u.progress, Some(60.0));
            }
            ParsedUpdate::Raw(_) => panic!("expected parsed status"),
        }
    }

    #[test]
    fn finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: tail").is_empty());
        assert_eq!(decoder.finish(), Some("tail".to_string()));
        assert_eq!(decoder.finish(), None);
    }
}
