use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ActionLogError, Result};

/// Top-level configuration for the action log service.
///
/// Loaded from `~/.actionlog/config.toml` by default. Every section falls
/// back to its defaults when absent from the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionLogConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

impl ActionLogConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ActionLogConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ActionLogError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory holding the SQLite database and the API token.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// API server port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.actionlog/data".to_string(),
            log_level: "info".to_string(),
            port: 3040,
        }
    }
}

/// Operator settings read by the engine and the dispatcher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Comma-separated webhook URLs notified when new actions exist.
    pub builds_api_webhook: String,
    /// Skip TLS certificate verification on webhook requests.
    pub webhook_unsafe_request: bool,
    /// Expose raw record metadata on the read API.
    pub debug: bool,
}

impl SettingsConfig {
    /// Whether any webhook URL text is configured at all.
    pub fn has_webhook(&self) -> bool {
        !self.builds_api_webhook.trim().is_empty()
    }
}

/// Outbound webhook client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// User-Agent header sent with every webhook POST.
    pub user_agent: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: format!("actionlog/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}
