//! CSV export for the accounts and events views.
//!
//! Standard CSV quoting: fields containing a comma, double quote, or
//! newline are wrapped in quotes with internal quotes doubled, so any
//! standard parser round-trips the content exactly.

use chrono::NaiveDate;

use crate::store::{Account, CompanyEvent};

/// Quote a single field if (and only if) it needs quoting.
pub fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Serialize a header row plus data rows.
pub fn to_csv(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    out.push_str(
        &headers
            .iter()
            .map(|h| escape_field(h))
            .collect::<Vec<_>>()
            .join(","),
    );
    out.push('\n');
    for row in rows {
        out.push_str(
            &row.iter()
                .map(|field| escape_field(field))
                .collect::<Vec<_>>()
                .join(","),
        );
        out.push('\n');
    }
    out
}

pub fn accounts_to_csv(accounts: &[&Account]) -> String {
    let headers = [
        "name",
        "domain",
        "tier",
        "industry",
        "geography",
        "employees",
        "fit_score",
        "intent_score",
        "intent_delta_14d",
    ];
    let rows: Vec<Vec<String>> = accounts
        .iter()
        .map(|a| {
            vec![
                a.name.clone(),
                a.domain.clone(),
                a.tier.map(|t| t.as_str().to_string()).unwrap_or_default(),
                a.industry.clone().unwrap_or_default(),
                a.geography.clone().unwrap_or_default(),
                a.employee_count.map(|n| n.to_string()).unwrap_or_default(),
                a.fit_score.to_string(),
                a.intent_score.to_string(),
                a.intent_delta_14d.to_string(),
            ]
        })
        .collect();
    to_csv(&headers, &rows)
}

pub fn events_to_csv(events: &[&CompanyEvent]) -> String {
    let headers = ["event", "company", "domain", "date", "description"];
    let rows: Vec<Vec<String>> = events
        .iter()
        .map(|e| {
            vec![
                e.event_name.clone(),
                e.company_name.clone(),
                e.domain.clone().unwrap_or_default(),
                e.event_date.clone().unwrap_or_default(),
                e.description.clone().unwrap_or_default(),
            ]
        })
        .collect();
    to_csv(&headers, &rows)
}

/// `<prefix>-YYYY-MM-DD.csv` for dated exports.
pub fn dated_filename(prefix: &str, date: NaiveDate) -> String {
    format!("{}-{}.csv", prefix, date.format("%Y-%m-%d"))
}

/// `<event-name>.csv`, with the name slugged down to filesystem-safe chars.
pub fn event_filename(event_name: &str) -> String {
    let slug: String = event_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("{}.csv", slug.trim_matches('-'))
}

/// Minimal standard-compliant CSV field parser, used by the round-trip
/// tests to prove exports re-parse exactly.
#[cfg(test)]
fn parse_csv_line_fields(input: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = input.chars().peekable();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => fields.push(std::mem::take(&mut field)),
                _ => field.push(c),
            }
        }
    }
    fields.push(field);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_fields_stay_unquoted() {
        assert_eq!(escape_field("Acme"), "Acme");
    }

    #[test]
    fn comma_quote_newline_round_trip() {
        let original = "Raised $40M, \"Series B\"\nexpanding to EMEA";
        let escaped = escape_field(original);
        assert_eq!(
            escaped,
            "\"Raised $40M, \"\"Series B\"\"\nexpanding to EMEA\""
        );

        let parsed = parse_csv_line_fields(&escaped);
        assert_eq!(parsed, vec![original.to_string()]);
    }

    #[test]
    fn row_with_mixed_fields_parses_back() {
        let csv = to_csv(
            &["company", "note"],
            &[vec!["Acme, Inc".into(), "said \"maybe\"".into()]],
        );
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), "company,note");
        let parsed = parse_csv_line_fields(lines.next().unwrap());
        assert_eq!(parsed, vec!["Acme, Inc".to_string(), "said \"maybe\"".to_string()]);
    }

    #[test]
    fn dated_filename_embeds_date() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 31).unwrap();
        assert_eq!(
            dated_filename("qualified-accounts", date),
            "qualified-accounts-2026-08-31.csv"
        );
    }

    #[test]
    fn export_written_to_disk_reads_back() {
        use std::collections::BTreeMap;

        let account = Account {
            id: "acc-1".into(),
            domain: "acme.io".into(),
            name: "Acme, Inc".into(),
            tier: None,
            industry: Some("SaaS".into()),
            geography: None,
            employee_count: Some(250),
            fit_score: 88,
            intent_score: 61,
            intent_delta_14d: -4,
            rules_match: BTreeMap::new(),
            last_contact_at: None,
        };

        let csv = accounts_to_csv(&[&account]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(dated_filename(
            "qualified-accounts",
            NaiveDate::from_ymd_opt(2026, 8, 31).unwrap(),
        ));
        std::fs::write(&path, &csv).unwrap();

        let read_back = std::fs::read_to_string(&path).unwrap();
        let data_line = read_back.lines().nth(1).unwrap();
        let fields = parse_csv_line_fields(data_line);
        assert_eq!(fields[0], "Acme, Inc");
        assert_eq!(fields[6], "88");
    }

    #[test]
    fn event_filename_slugs_unsafe_chars() {
        assert_eq!(event_filename("SaaStr Annual 2026"), "SaaStr-Annual-2026.csv");
        assert_eq!(event_filename("  Q3/Q4 Pipeline  "), "Q3-Q4-Pipeline.csv");
    }
}
