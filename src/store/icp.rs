//! ICP scoring model configuration.
//!
//! Models are append-only: editing starts from a persisted instance and
//! saves as a new row. At most one model per user carries `is_primary`;
//! flipping the primary goes through a single server-side function so a
//! reader can never observe zero primaries mid-flight.

use serde::{Deserialize, Serialize};

use super::{StoreClient, StoreError};

/// Fixed set of buying triggers a model can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuyingTrigger {
    FundingRound,
    LeadershipChange,
    Hiring,
    ProductLaunch,
    Expansion,
    TechMigration,
}

/// Inclusive numeric range (employee count, ACV).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NumericRange {
    #[serde(default)]
    pub min: i64,
    #[serde(default)]
    pub max: i64,
}

/// The four scoring dimension weights, each 0–10.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IcpWeights {
    pub firmographic: u8,
    pub technographic: u8,
    pub intent: u8,
    pub behavioral: u8,
}

impl Default for IcpWeights {
    fn default() -> Self {
        Self {
            firmographic: 5,
            technographic: 5,
            intent: 5,
            behavioral: 5,
        }
    }
}

impl IcpWeights {
    /// Clamp every dimension into the 0–10 scale.
    pub fn clamped(self) -> Self {
        Self {
            firmographic: self.firmographic.min(10),
            technographic: self.technographic.min(10),
            intent: self.intent.min(10),
            behavioral: self.behavioral.min(10),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IcpModel {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub included_industries: Vec<String>,
    #[serde(default)]
    pub excluded_industries: Vec<String>,
    #[serde(default)]
    pub geographies: Vec<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub compliance_requirements: Vec<String>,
    #[serde(default)]
    pub employee_range: NumericRange,
    #[serde(default)]
    pub acv_range: NumericRange,
    #[serde(default)]
    pub buying_triggers: Vec<BuyingTrigger>,
    #[serde(default)]
    pub persona_titles: Vec<String>,
    #[serde(default)]
    pub weights: IcpWeights,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl StoreClient {
    pub async fn list_icp_models(&self) -> Result<Vec<IcpModel>, StoreError> {
        self.select(
            "icp_models",
            &[("select", "*"), ("order", "created_at.desc")],
        )
        .await
    }

    /// Save a model as a new row. Weights are clamped at the boundary;
    /// the id and created_at are assigned server-side.
    pub async fn save_icp_model(&self, model: &IcpModel) -> Result<IcpModel, StoreError> {
        let mut row = model.clone();
        row.id = None;
        row.created_at = None;
        row.weights = row.weights.clamped();

        let mut stored: Vec<IcpModel> = self.insert("icp_models", &row).await?;
        stored.pop().ok_or(StoreError::NotFound("icp_models"))
    }

    /// Flip the primary flag to the given model.
    ///
    /// One atomic server-side function, deliberately not two sequential
    /// client writes: clearing the old primary and setting the new one in
    /// separate requests leaves a window where a concurrent reader sees
    /// zero primaries, and a crash between the two strands the store there
    /// permanently.
    pub async fn set_primary_icp_model(&self, id: &str) -> Result<(), StoreError> {
        self.rpc(
            "set_primary_icp_model",
            &serde_json::json!({ "model_id": id }),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_clamp_to_scale() {
        let weights = IcpWeights {
            firmographic: 14,
            technographic: 10,
            intent: 0,
            behavioral: 7,
        }
        .clamped();
        assert_eq!(weights.firmographic, 10);
        assert_eq!(weights.technographic, 10);
        assert_eq!(weights.intent, 0);
        assert_eq!(weights.behavioral, 7);
    }

    #[test]
    fn buying_triggers_serialize_snake_case() {
        let json = serde_json::to_string(&BuyingTrigger::LeadershipChange).unwrap();
        assert_eq!(json, "\"leadership_change\"");
        let back: BuyingTrigger = serde_json::from_str("\"tech_migration\"").unwrap();
        assert_eq!(back, BuyingTrigger::TechMigration);
    }

    #[tokio::test]
    async fn set_primary_is_one_rpc_call_not_two_row_updates() {
        use super::super::testutil::{json_response, spawn_store};

        let (url, requests) = spawn_store(vec![json_response("200 OK", "null")]);
        let store = StoreClient::new(reqwest::Client::new(), &url, "key");

        store.set_primary_icp_model("model-9").await.unwrap();

        // Exactly one server-side function call. Clearing the old primary
        // and setting the new one as separate PATCHes would open a window
        // where a reader sees zero primaries, and a crash between the two
        // strands the store there.
        let log = requests.lock();
        assert_eq!(
            log.as_slice(),
            ["POST /rest/v1/rpc/set_primary_icp_model"]
        );
        assert!(!log.iter().any(|r| r.starts_with("PATCH /rest/v1/icp_models")));
    }

    #[test]
    fn model_round_trips_with_defaults() {
        let model: IcpModel = serde_json::from_str(r#"{ "name": "Mid-market SaaS" }"#).unwrap();
        assert_eq!(model.name, "Mid-market SaaS");
        assert!(!model.is_primary);
        assert_eq!(model.weights.intent, 5);
        assert!(model.buying_triggers.is_empty());
    }
}
