//! Shared application state: configuration plus the HTTP client every
//! remote collaborator call goes through.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::types::Config;

/// How long a single store/webhook request may take before we treat the
/// endpoint as unreachable. Without this a hung request pins a loading
/// flag forever.
const HTTP_TIMEOUT_SECS: u64 = 30;

/// Application state shared across the CLI, controller, and scheduler.
pub struct AppState {
    pub config: RwLock<Option<Config>>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new() -> Self {
        let config = match load_config() {
            Ok(c) => Some(c),
            Err(e) => {
                log::warn!("No usable config: {e}");
                None
            }
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            config: RwLock::new(config),
            http,
        }
    }

    /// Clone the current config, or fail with a setup hint.
    pub fn require_config(&self) -> Result<Config, String> {
        self.config.read().clone().ok_or_else(|| {
            format!(
                "Config not found. Create {} or set ICP_STORE_URL / ICP_STORE_API_KEY / ICP_WORKFLOW_URL.",
                config_path().display()
            )
        })
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical config file path (~/.icp-intel/config.json)
pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".icp-intel")
        .join("config.json")
}

/// Load configuration: config.json first, then environment overrides.
///
/// A fully env-specified setup works with no file at all.
pub fn load_config() -> Result<Config, String> {
    let path = config_path();

    let mut config: Option<Config> = if path.exists() {
        let content =
            fs::read_to_string(&path).map_err(|e| format!("Failed to read config: {}", e))?;
        Some(
            serde_json::from_str(&content)
                .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?,
        )
    } else {
        None
    };

    apply_env_overrides(&mut config);

    let config = config.ok_or_else(|| format!("Config file not found at {}", path.display()))?;

    // Catch obviously broken endpoints up front instead of at first use.
    for (label, value) in [
        ("storeUrl", &config.store_url),
        ("workflowUrl", &config.workflow_url),
        ("activationUrl", &config.activation_url),
    ] {
        url::Url::parse(value).map_err(|e| format!("Invalid {label} '{value}': {e}"))?;
    }

    Ok(config)
}

/// Overlay environment variables onto the loaded config. When no file
/// exists, the three required vars together bootstrap a config.
fn apply_env_overrides(config: &mut Option<Config>) {
    let store_url = std::env::var("ICP_STORE_URL").ok();
    let store_api_key = std::env::var("ICP_STORE_API_KEY").ok();
    let workflow_url = std::env::var("ICP_WORKFLOW_URL").ok();
    let activation_url = std::env::var("ICP_ACTIVATION_URL").ok();
    let timezone = std::env::var("ICP_TIMEZONE").ok();

    match config {
        Some(c) => {
            if let Some(v) = store_url {
                c.store_url = v;
            }
            if let Some(v) = store_api_key {
                c.store_api_key = v;
            }
            if let Some(v) = workflow_url {
                c.workflow_url = v;
            }
            if let Some(v) = activation_url {
                c.activation_url = v;
            }
            if let Some(v) = timezone {
                c.timezone = v;
            }
        }
        None => {
            if let (Some(store_url), Some(store_api_key), Some(workflow_url)) =
                (store_url, store_api_key, workflow_url)
            {
                *config = Some(Config {
                    store_url,
                    store_api_key,
                    workflow_url,
                    activation_url: activation_url
                        .unwrap_or_else(|| "http://localhost:3001".to_string()),
                    timezone: timezone.unwrap_or_else(|| "UTC".to_string()),
                });
            }
        }
    }
}

/// Write a config to disk, creating ~/.icp-intel/ if needed, and update
/// the in-memory copy.
pub fn save_config(state: &AppState, config: Config) -> Result<(), String> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| format!("Failed to create config dir: {}", e))?;
        }
    }

    let content = serde_json::to_string_pretty(&config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(&path, content).map_err(|e| format!("Failed to write config: {}", e))?;

    *state.config.write() = Some(config);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_config_reports_missing() {
        let state = AppState {
            config: RwLock::new(None),
            http: reqwest::Client::new(),
        };
        let err = state.require_config().unwrap_err();
        assert!(err.contains("ICP_STORE_URL"));
    }
}
