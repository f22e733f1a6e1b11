//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! - `MARKET_API_URL` - Marketplace origin (default: `http://localhost:5000`)
//! - `MARKET_HTTP_TIMEOUT_SECS` - Request timeout in seconds (default: 30)
//! - `MARKET_USER_AGENT` - User agent sent with every request

use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_API_URL: &str = "http://localhost:5000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Marketplace API client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Origin the `/api/...` paths are resolved against
    pub api_url: Url,
    pub timeout: Duration,
    pub user_agent: String,
}

impl ClientConfig {
    /// Defaults for everything but the API origin.
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: default_user_agent(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let api_url = get_env_or_default("MARKET_API_URL", DEFAULT_API_URL);
        let api_url = Url::parse(&api_url)
            .map_err(|e| ConfigError::InvalidEnvVar("MARKET_API_URL".to_string(), e.to_string()))?;

        let timeout_secs = get_env_or_default("MARKET_HTTP_TIMEOUT_SECS", &DEFAULT_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("MARKET_HTTP_TIMEOUT_SECS".to_string(), e.to_string())
            })?;

        let user_agent = get_env_or_default("MARKET_USER_AGENT", &default_user_agent());

        Ok(Self {
            api_url,
            timeout: Duration::from_secs(timeout_secs),
            user_agent,
        })
    }
}

fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

fn get_env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
