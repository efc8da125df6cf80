//! Webhook integration targets for the bulk-activation flow.

use serde::{Deserialize, Serialize};

use super::{StoreClient, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub webhook_url: String,
    /// Logical table name the downstream automation writes into.
    pub table_name: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl StoreClient {
    pub async fn list_integrations(&self) -> Result<Vec<Integration>, StoreError> {
        self.select(
            "integrations",
            &[("select", "*"), ("order", "created_at.desc")],
        )
        .await
    }

    pub async fn create_integration(
        &self,
        integration: &Integration,
    ) -> Result<Integration, StoreError> {
        let mut row = integration.clone();
        row.id = None;
        row.created_at = None;
        let mut stored: Vec<Integration> = self.insert("integrations", &row).await?;
        stored.pop().ok_or(StoreError::NotFound("integrations"))
    }

    pub async fn delete_integration(&self, id: &str) -> Result<(), StoreError> {
        self.delete("integrations", &[("id", &format!("eq.{id}"))])
            .await
    }

    /// Resolve the webhook the activation flow should use: the
    /// most-recently-created row wins when several exist.
    pub async fn latest_integration(&self) -> Result<Integration, StoreError> {
        let mut rows: Vec<Integration> = self
            .select(
                "integrations",
                &[
                    ("select", "*"),
                    ("order", "created_at.desc"),
                    ("limit", "1"),
                ],
            )
            .await?;
        rows.pop().ok_or(StoreError::NotFound("integrations"))
    }
}
