//! Company events feed (conference attendance, funding announcements,
//! hiring spikes) backing the events view and its CSV export. Read-only.

use serde::{Deserialize, Serialize};

use super::{StoreClient, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyEvent {
    pub id: String,
    #[serde(default)]
    pub event_name: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub domain: Option<String>,
    /// ISO date of the event.
    #[serde(default)]
    pub event_date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl StoreClient {
    pub async fn list_company_events(&self) -> Result<Vec<CompanyEvent>, StoreError> {
        self.select(
            "company_events",
            &[("select", "*"), ("order", "event_date.desc")],
        )
        .await
    }
}
