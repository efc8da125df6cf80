//! Normalization for loosely-typed inbound fields.
//!
//! The enrichment pipeline writes prospect `experience` / `skills` /
//! `interests` as either a JSON array, a JSON-encoded array inside a
//! string, or a plain delimited string. Normalize exactly once at the
//! mapping boundary so render sites never re-parse.

use serde_json::Value;

/// Parse a string-or-array field into a list of strings.
///
/// Fallback chain: JSON array → delimiter split (`|` preferred over `,`)
/// → one-element list. Null/absent yields an empty list. Entries are
/// trimmed and empties dropped.
pub fn parse_string_list(raw: &Value) -> Vec<String> {
    match raw {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => parse_delimited(s),
        other => vec![other.to_string()],
    }
}

fn parse_delimited(s: &str) -> Vec<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    // A string may itself hold a JSON-encoded array ("[\"a\",\"b\"]").
    if trimmed.starts_with('[') {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(trimmed) {
            return parse_string_list(&Value::Array(items));
        }
    }

    let delimiter = if trimmed.contains('|') { '|' } else { ',' };
    trimmed
        .split(delimiter)
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_array_passes_through() {
        let raw = json!(["Sales", "SaaS", "Enterprise"]);
        assert_eq!(parse_string_list(&raw), vec!["Sales", "SaaS", "Enterprise"]);
    }

    #[test]
    fn json_encoded_array_in_string() {
        let raw = json!("[\"Go-to-market\", \"Pipeline ops\"]");
        assert_eq!(
            parse_string_list(&raw),
            vec!["Go-to-market", "Pipeline ops"]
        );
    }

    #[test]
    fn pipe_delimited_string_splits() {
        let raw = json!("CRM | Outbound | Revenue ops");
        assert_eq!(
            parse_string_list(&raw),
            vec!["CRM", "Outbound", "Revenue ops"]
        );
    }

    #[test]
    fn comma_delimited_string_splits() {
        let raw = json!("negotiation, forecasting");
        assert_eq!(parse_string_list(&raw), vec!["negotiation", "forecasting"]);
    }

    #[test]
    fn bare_string_becomes_single_entry() {
        let raw = json!("15 years in enterprise software");
        assert_eq!(
            parse_string_list(&raw),
            vec!["15 years in enterprise software"]
        );
    }

    #[test]
    fn null_and_empty_yield_nothing() {
        assert!(parse_string_list(&Value::Null).is_empty());
        assert!(parse_string_list(&json!("")).is_empty());
        assert!(parse_string_list(&json!("  ")).is_empty());
    }

    #[test]
    fn malformed_json_array_falls_back_to_split() {
        // Looks like JSON but is not valid; treat as a delimited string.
        let raw = json!("[broken, array");
        assert_eq!(parse_string_list(&raw), vec!["[broken", "array"]);
    }
}
