//! Commerce configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ATELIER_API_BASE_URL` - Commerce backend base URL (http or https)
//!
//! ## Optional
//! - `ATELIER_API_TOKEN` - Session credential used until the next session change
//! - `ATELIER_API_TIMEOUT_SECS` - Gateway request timeout (default: 15)
//! - `ATELIER_STORE_DIR` - Directory of the file-backed store (default: .atelier)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_TIMEOUT_SECS: &str = "15";
const DEFAULT_STORE_DIR: &str = ".atelier";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Complete configuration of a commerce client.
#[derive(Debug, Clone)]
pub struct CommerceConfig {
    /// Remote gateway settings.
    pub gateway: GatewayConfig,
    /// Directory of the file-backed store.
    pub store_dir: PathBuf,
    /// Sentry DSN for error tracking.
    pub sentry_dsn: Option<String>,
}

/// Remote gateway settings.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Base URL the cart and wishlist routes are resolved against.
    pub base_url: Url,
    /// Credential for the initial session, if any.
    pub token: Option<SecretString>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CommerceConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let gateway = GatewayConfig::from_env()?;
        let store_dir = PathBuf::from(get_env_or_default("ATELIER_STORE_DIR", DEFAULT_STORE_DIR));
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            gateway,
            store_dir,
            sentry_dsn,
        })
    }
}

impl GatewayConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = parse_base_url(
            "ATELIER_API_BASE_URL",
            &get_required_env("ATELIER_API_BASE_URL")?,
        )?;
        let timeout = parse_timeout(
            "ATELIER_API_TIMEOUT_SECS",
            &get_env_or_default("ATELIER_API_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
        )?;
        let token = get_optional_env("ATELIER_API_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from);

        Ok(Self {
            base_url,
            token,
            timeout,
        })
    }
}

fn parse_base_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url =
        Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

fn parse_timeout(key: &str, value: &str) -> Result<Duration, ConfigError> {
    let secs = value
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "timeout must be at least one second".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
