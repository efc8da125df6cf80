//! Qualified accounts: row mapping and the delete-with-dependents flow.
//!
//! Accounts are written by the external enrichment pipeline and are
//! read-only from this client except for delete. Scores arrive unclamped
//! from the pipeline; the mapping boundary here is the single place that
//! enforces the 0–100 range.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{clamp_score, StoreClient, StoreError};

/// Account tier as assigned by the scoring pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    A,
    B,
    C,
}

impl Tier {
    pub fn parse(raw: &str) -> Option<Tier> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "A" => Some(Tier::A),
            "B" => Some(Tier::B),
            "C" => Some(Tier::C),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::A => "A",
            Tier::B => "B",
            Tier::C => "C",
        }
    }
}

/// Outcome of one ICP rule category for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleOutcome {
    Match,
    Partial,
    Miss,
}

/// Raw store row, tolerant of missing/out-of-range pipeline output.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AccountRow {
    pub id: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub geography: Option<String>,
    #[serde(default)]
    pub employee_count: Option<i64>,
    #[serde(default)]
    pub fit_score: Option<f64>,
    #[serde(default)]
    pub intent_score: Option<f64>,
    #[serde(default)]
    pub intent_delta_14d: Option<i32>,
    #[serde(default)]
    pub rules_match: Option<BTreeMap<String, RuleOutcome>>,
    #[serde(default)]
    pub last_contact_at: Option<String>,
}

/// View-model account: scores clamped, tier parsed, maps defaulted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub domain: String,
    pub name: String,
    pub tier: Option<Tier>,
    pub industry: Option<String>,
    pub geography: Option<String>,
    pub employee_count: Option<i64>,
    pub fit_score: u8,
    pub intent_score: u8,
    pub intent_delta_14d: i32,
    pub rules_match: BTreeMap<String, RuleOutcome>,
    pub last_contact_at: Option<String>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: row.id,
            domain: row.domain,
            name: row.name,
            tier: row.tier.as_deref().and_then(Tier::parse),
            industry: row.industry,
            geography: row.geography,
            employee_count: row.employee_count,
            fit_score: clamp_score(row.fit_score.unwrap_or(0.0)),
            intent_score: clamp_score(row.intent_score.unwrap_or(0.0)),
            intent_delta_14d: row.intent_delta_14d.unwrap_or(0),
            rules_match: row.rules_match.unwrap_or_default(),
            last_contact_at: row.last_contact_at,
        }
    }
}

impl StoreClient {
    /// Fetch the full qualified-account list, newest first.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let rows: Vec<AccountRow> = self
            .select(
                "accounts",
                &[("select", "*"), ("order", "created_at.desc")],
            )
            .await?;
        Ok(rows.into_iter().map(Account::from).collect())
    }

    /// Delete an account and its dependent enrichment record.
    ///
    /// Foreign-key ordering: the enrichment row must go first. If that
    /// delete fails, the whole operation fails and the account row is
    /// left untouched; callers refetch the list afterward either way.
    pub async fn delete_account(&self, id: &str) -> Result<(), StoreError> {
        self.delete("account_enrichment", &[("account_id", &format!("eq.{id}"))])
            .await
            .map_err(|e| {
                log::warn!("Enrichment delete failed for account {id}: {e}");
                e
            })?;

        self.delete("accounts", &[("id", &format!("eq.{id}"))]).await
    }

    /// Persist accounts discovered by a scheduled search (auto-save path).
    pub async fn save_found_accounts(
        &self,
        drafts: &[serde_json::Value],
    ) -> Result<usize, StoreError> {
        if drafts.is_empty() {
            return Ok(0);
        }
        let stored: Vec<AccountRow> = self.insert("accounts", &drafts).await?;
        Ok(stored.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fit: f64, intent: f64) -> AccountRow {
        serde_json::from_value(serde_json::json!({
            "id": "acc-1",
            "domain": "acme.io",
            "name": "Acme",
            "tier": "a",
            "fit_score": fit,
            "intent_score": intent,
            "rules_match": { "industry": "match", "size": "partial", "geo": "miss" }
        }))
        .unwrap()
    }

    #[test]
    fn scores_outside_range_are_clamped() {
        let account = Account::from(row(-20.0, 250.0));
        assert_eq!(account.fit_score, 0);
        assert_eq!(account.intent_score, 100);

        let account = Account::from(row(15.0, 85.0));
        assert_eq!(account.fit_score, 15);
        assert_eq!(account.intent_score, 85);
    }

    #[test]
    fn tier_parse_is_case_insensitive() {
        let account = Account::from(row(1.0, 1.0));
        assert_eq!(account.tier, Some(Tier::A));
        assert_eq!(Tier::parse("unknown"), None);
    }

    #[test]
    fn rules_match_round_trips_outcomes() {
        let account = Account::from(row(1.0, 1.0));
        assert_eq!(account.rules_match["industry"], RuleOutcome::Match);
        assert_eq!(account.rules_match["size"], RuleOutcome::Partial);
        assert_eq!(account.rules_match["geo"], RuleOutcome::Miss);
    }

    #[tokio::test]
    async fn delete_removes_enrichment_row_first() {
        use super::super::testutil::{json_response, spawn_store};

        let (url, requests) = spawn_store(vec![
            json_response("204 No Content", ""),
            json_response("204 No Content", ""),
        ]);
        let store = StoreClient::new(reqwest::Client::new(), &url, "key");

        store.delete_account("acc-1").await.unwrap();

        let log = requests.lock();
        assert_eq!(log.len(), 2);
        assert!(
            log[0].starts_with("DELETE /rest/v1/account_enrichment"),
            "first request was {}",
            log[0]
        );
        assert!(
            log[1].starts_with("DELETE /rest/v1/accounts"),
            "second request was {}",
            log[1]
        );
    }

    #[tokio::test]
    async fn failed_enrichment_delete_leaves_account_untouched() {
        use super::super::testutil::{json_response, spawn_store};

        let (url, requests) = spawn_store(vec![json_response(
            "500 Internal Server Error",
            r#"{"message":"fk violation"}"#,
        )]);
        let store = StoreClient::new(reqwest::Client::new(), &url, "key");

        let err = store.delete_account("acc-1").await.unwrap_err();
        assert!(matches!(err, StoreError::Api { status: 500, .. }));

        // The accounts-row delete must never be issued.
        let log = requests.lock();
        assert_eq!(log.len(), 1);
        assert!(log[0].starts_with("DELETE /rest/v1/account_enrichment"));
    }

    #[test]
    fn missing_optional_fields_default() {
        let row: AccountRow =
            serde_json::from_value(serde_json::json!({ "id": "acc-2" })).unwrap();
        let account = Account::from(row);
        assert_eq!(account.fit_score, 0);
        assert_eq!(account.intent_delta_14d, 0);
        assert!(account.rules_match.is_empty());
        assert!(account.tier.is_none());
    }
}
