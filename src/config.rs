//! Configuration and settings management
//!
//! Loads settings from environment variables and layered config files.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// How updates are ingested from Telegram.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    /// Long polling via `getUpdates`
    Polling,
    /// HTTPS webhook served by an embedded listener
    Webhook,
}

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Base URL of the carrier self-care API
    pub carrier_base_url: String,

    /// Update ingestion mode
    #[serde(default = "default_connection_type")]
    pub connection_type: ConnectionType,

    /// Public host for the webhook URL (required in webhook mode)
    pub webhook_host: Option<String>,
    /// Local port the webhook listener binds to
    #[serde(default = "default_webhook_port")]
    pub webhook_port: u16,

    /// R2 Storage access key ID
    pub r2_access_key_id: Option<String>,
    /// R2 Storage secret access key
    pub r2_secret_access_key: Option<String>,
    /// R2 Storage endpoint URL
    pub r2_endpoint_url: Option<String>,
    /// R2 Storage bucket name
    pub r2_bucket_name: Option<String>,

    /// Seconds of inactivity before a pending wizard step is dropped
    #[serde(default = "default_wizard_ttl_secs")]
    pub wizard_ttl_secs: u64,
}

const fn default_connection_type() -> ConnectionType {
    ConnectionType::Polling
}

const fn default_webhook_port() -> u16 {
    8443
}

const fn default_wizard_ttl_secs() -> u64 {
    900
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use telecare_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(File::with_name("config/default").required(false))
            // Add in the current environment file
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked into git
            .add_source(File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of APP)
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Also add settings from environment variables directly (without prefix)
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        // Fallback: read R2 variables directly if the layered sources missed them
        if settings.r2_endpoint_url.is_none() {
            if let Ok(val) = std::env::var("R2_ENDPOINT_URL") {
                if !val.is_empty() {
                    settings.r2_endpoint_url = Some(val);
                }
            }
        }
        if settings.r2_access_key_id.is_none() {
            if let Ok(val) = std::env::var("R2_ACCESS_KEY_ID") {
                if !val.is_empty() {
                    settings.r2_access_key_id = Some(val);
                }
            }
        }
        if settings.r2_secret_access_key.is_none() {
            if let Ok(val) = std::env::var("R2_SECRET_ACCESS_KEY") {
                if !val.is_empty() {
                    settings.r2_secret_access_key = Some(val);
                }
            }
        }
        if settings.r2_bucket_name.is_none() {
            if let Ok(val) = std::env::var("R2_BUCKET_NAME") {
                if !val.is_empty() {
                    settings.r2_bucket_name = Some(val);
                }
            }
        }

        Ok(settings)
    }

    /// Public webhook URL derived from host and the bot token path segment.
    ///
    /// # Errors
    ///
    /// Returns an error when `webhook_host` is missing while webhook mode is
    /// selected.
    pub fn webhook_url(&self) -> Result<String, ConfigError> {
        let host = self.webhook_host.as_ref().ok_or_else(|| {
            ConfigError::Message("WEBHOOK_HOST is required in webhook mode".into())
        })?;
        Ok(format!(
            "https://{host}:{}/{}",
            self.webhook_port, self.telegram_token
        ))
    }
}

/// Low-balance threshold below which the take-loan shortcut is offered
pub const LOAN_OFFER_THRESHOLD: f64 = 5.0;

/// Timeout for a single carrier API call
pub const CARRIER_TIMEOUT_SECS: u64 = 30;

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    // Touches process environment; kept as one function to avoid races
    #[test]
    fn test_config_env_loading() -> Result<(), Box<dyn std::error::Error>> {
        env::set_var("TELEGRAM_TOKEN", "dummy_token");
        env::set_var("CARRIER_BASE_URL", "https://api.example.com/v1");
        env::set_var("R2_ENDPOINT_URL", "https://example.com");

        let settings = Settings::new()?;
        assert_eq!(settings.telegram_token, "dummy_token");
        assert_eq!(settings.connection_type, ConnectionType::Polling);
        assert_eq!(settings.wizard_ttl_secs, 900);
        assert_eq!(
            settings.r2_endpoint_url,
            Some("https://example.com".to_string())
        );

        // Empty env var is treated as unset
        env::set_var("R2_ENDPOINT_URL", "");
        let settings = Settings::new()?;
        assert_eq!(settings.r2_endpoint_url, None);

        env::remove_var("R2_ENDPOINT_URL");
        env::remove_var("CARRIER_BASE_URL");
        env::remove_var("TELEGRAM_TOKEN");
        Ok(())
    }

    #[test]
    fn test_webhook_url_requires_host() {
        let settings = Settings {
            telegram_token: "123:abc".to_string(),
            carrier_base_url: "https://api.example.com".to_string(),
            connection_type: ConnectionType::Webhook,
            webhook_host: None,
            webhook_port: 8443,
            r2_access_key_id: None,
            r2_secret_access_key: None,
            r2_endpoint_url: None,
            r2_bucket_name: None,
            wizard_ttl_secs: 900,
        };
        assert!(settings.webhook_url().is_err());

        let settings = Settings {
            webhook_host: Some("bot.example.com".to_string()),
            ..settings
        };
        assert_eq!(
            settings.webhook_url().expect("host is set"),
            "https://bot.example.com:8443/123:abc"
        );
    }
}
