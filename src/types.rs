//! Shared configuration and view-model types.

use serde::{Deserialize, Serialize};

/// Configuration stored in ~/.icp-intel/config.json
///
/// Every field can also be supplied through the environment
/// (`ICP_STORE_URL`, `ICP_STORE_API_KEY`, `ICP_WORKFLOW_URL`,
/// `ICP_ACTIVATION_URL`, `ICP_TIMEZONE`); env values take precedence
/// over the file so CI and one-off runs need no config on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base URL of the remote data store (PostgREST-style REST endpoint).
    pub store_url: String,
    /// API key sent as both `apikey` and bearer token.
    pub store_api_key: String,
    /// Base URL of the workflow service (`/start-workflow`, `/workflow-status`).
    pub workflow_url: String,
    /// Activation proxy base URL (`/api/activate-companies`).
    #[serde(default = "default_activation_url")]
    pub activation_url: String,
    /// IANA timezone used for schedule evaluation.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_activation_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// What triggered a schedule execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionTrigger {
    Scheduled,
    Missed,
    Manual,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_fill_in() {
        let json = r#"{
            "storeUrl": "https://db.example.com",
            "storeApiKey": "key",
            "workflowUrl": "https://wf.example.com"
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.activation_url, "http://localhost:3001");
        assert_eq!(config.timezone, "UTC");
    }
}
