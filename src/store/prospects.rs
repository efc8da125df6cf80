//! Decision-maker contacts. Read-only.
//!
//! The free-text experience/skills/interests columns have an ambiguous
//! encoding upstream (JSON array or delimited string); they are
//! normalized exactly once here via `parser::parse_string_list`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::parser::parse_string_list;

use super::{StoreClient, StoreError};

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ProspectRow {
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub seniority: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub experience: Value,
    #[serde(default)]
    pub skills: Value,
    #[serde(default)]
    pub interests: Value,
    #[serde(default)]
    pub company_domain: Option<String>,
    #[serde(default)]
    pub last_contact_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prospect {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub title: Option<String>,
    pub department: Option<String>,
    pub seniority: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub experience: Vec<String>,
    pub skills: Vec<String>,
    pub interests: Vec<String>,
    /// Link back to the owning account.
    pub company_domain: Option<String>,
    pub last_contact_at: Option<String>,
}

impl Prospect {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

impl From<ProspectRow> for Prospect {
    fn from(row: ProspectRow) -> Self {
        Prospect {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            title: row.title,
            department: row.department,
            seniority: row.seniority,
            city: row.city,
            state: row.state,
            country: row.country,
            experience: parse_string_list(&row.experience),
            skills: parse_string_list(&row.skills),
            interests: parse_string_list(&row.interests),
            company_domain: row.company_domain,
            last_contact_at: row.last_contact_at,
        }
    }
}

impl StoreClient {
    /// Fetch all prospects, optionally scoped to one account's domain.
    pub async fn list_prospects(
        &self,
        company_domain: Option<&str>,
    ) -> Result<Vec<Prospect>, StoreError> {
        let domain_filter;
        let mut query: Vec<(&str, &str)> = vec![("select", "*"), ("order", "last_name.asc")];
        if let Some(domain) = company_domain {
            domain_filter = format!("eq.{domain}");
            query.push(("company_domain", &domain_filter));
        }

        let rows: Vec<ProspectRow> = self.select("prospects", &query).await?;
        Ok(rows.into_iter().map(Prospect::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mixed_encodings_normalize_once() {
        let row: ProspectRow = serde_json::from_value(json!({
            "id": "p-1",
            "first_name": "Dana",
            "last_name": "Reyes",
            "experience": ["VP Sales @ Northwind", "Director @ Contoso"],
            "skills": "pipeline | forecasting | MEDDIC",
            "interests": "cycling"
        }))
        .unwrap();

        let prospect = Prospect::from(row);
        assert_eq!(prospect.experience.len(), 2);
        assert_eq!(prospect.skills, vec!["pipeline", "forecasting", "MEDDIC"]);
        assert_eq!(prospect.interests, vec!["cycling"]);
        assert_eq!(prospect.full_name(), "Dana Reyes");
    }

    #[test]
    fn absent_fields_yield_empty_lists() {
        let row: ProspectRow = serde_json::from_value(json!({ "id": "p-2" })).unwrap();
        let prospect = Prospect::from(row);
        assert!(prospect.experience.is_empty());
        assert!(prospect.skills.is_empty());
        assert!(prospect.interests.is_empty());
    }
}
