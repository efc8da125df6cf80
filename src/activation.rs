//! Bulk account activation.
//!
//! Forwards the current filtered account set to the activation proxy,
//! which relays it to the configured downstream webhook (a no-code
//! automation tool). No local mutation happens; the webhook URL is
//! resolved at call time from the Integration table, newest row first.

use serde::Deserialize;

use crate::store::{Account, StoreClient, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    #[error("No integration configured. Add a webhook target first")]
    NoIntegration,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Activation proxy error {status}: {message}")]
    Proxy { status: u16, message: String },
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct ActivateResponse {
    #[serde(default)]
    message: String,
}

/// Send a batch of accounts to the activation proxy.
///
/// Fire-and-forget beyond the single response check: the downstream
/// automation owns everything after the 2xx.
pub async fn activate_accounts(
    http: &reqwest::Client,
    store: &StoreClient,
    activation_base: &str,
    accounts: &[Account],
) -> Result<String, ActivationError> {
    let integration = store.latest_integration().await.map_err(|e| match e {
        StoreError::NotFound(_) => ActivationError::NoIntegration,
        other => ActivationError::Store(other),
    })?;

    let url = format!(
        "{}/api/activate-companies",
        activation_base.trim_end_matches('/')
    );
    let response = http
        .post(&url)
        .json(&serde_json::json!({
            "companies": accounts,
            "clay_webhook": integration.webhook_url,
        }))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ActivationError::Proxy {
            status: status.as_u16(),
            message,
        });
    }

    let body: ActivateResponse = response.json().await.unwrap_or(ActivateResponse {
        message: String::new(),
    });
    log::info!(
        "Activated {} accounts via {}",
        accounts.len(),
        integration.name
    );
    Ok(body.message)
}
