//! Backend configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `THEHUB_API_BASE_URL` - Base URL of the backend API (e.g., `https://x.example.io/api:abc`)
//!
//! ## Optional
//! - `THEHUB_API_TOKEN` - Bearer token sent with every request
//! - `THEHUB_CART_KEY` - Key under which the cart id is persisted (default: `THEHUB_CART_ID`)
//! - `THEHUB_STATE_DIR` - Directory holding persisted client state (default: `.thehub`)
//! - `THEHUB_ORDER_ENDPOINT` - Order creation path (default: `/order`)
//! - `THEHUB_HTTP_TIMEOUT_SECS` - Per-request timeout (default: none)
//! - `THEHUB_CATALOG_CACHE_TTL_SECS` - Catalog cache lifetime (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Default key for the persisted cart id.
pub const DEFAULT_CART_KEY: &str = "THEHUB_CART_ID";

const DEFAULT_STATE_DIR: &str = ".thehub";
const DEFAULT_ORDER_ENDPOINT: &str = "/order";
const DEFAULT_CATALOG_CACHE_TTL_SECS: u64 = 300;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Backend access configuration.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct BackendConfig {
    /// Base URL every resource path is appended to
    pub base_url: Url,
    /// Bearer token for authenticated sessions
    pub api_token: Option<SecretString>,
    /// Key under which the cart id is persisted
    pub cart_key: String,
    /// Directory for persisted client state
    pub state_dir: PathBuf,
    /// Order creation path
    pub order_endpoint: String,
    /// Per-request timeout; `None` waits indefinitely
    pub http_timeout: Option<Duration>,
    /// Catalog cache lifetime
    pub catalog_cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url.as_str())
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("cart_key", &self.cart_key)
            .field("state_dir", &self.state_dir)
            .field("order_endpoint", &self.order_endpoint)
            .field("http_timeout", &self.http_timeout)
            .field("catalog_cache_ttl", &self.catalog_cache_ttl)
            .field("sentry_dsn", &self.sentry_dsn)
            .finish()
    }
}

impl BackendConfig {
    /// Configuration for `base_url` with every optional setting at its default.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `base_url` is not an absolute
    /// http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url("THEHUB_API_BASE_URL", base_url)?,
            api_token: None,
            cart_key: DEFAULT_CART_KEY.to_string(),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            order_endpoint: DEFAULT_ORDER_ENDPOINT.to_string(),
            http_timeout: None,
            catalog_cache_ttl: Duration::from_secs(DEFAULT_CATALOG_CACHE_TTL_SECS),
            sentry_dsn: None,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the API token looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let mut config = Self::new(&get_required_env("THEHUB_API_BASE_URL")?)?;

        if let Some(token) = get_optional_env("THEHUB_API_TOKEN") {
            validate_token(&token, "THEHUB_API_TOKEN")?;
            config.api_token = Some(SecretString::from(token));
        }
        if let Some(key) = get_optional_env("THEHUB_CART_KEY") {
            config.cart_key = key;
        }
        if let Some(dir) = get_optional_env("THEHUB_STATE_DIR") {
            config.state_dir = PathBuf::from(dir);
        }
        if let Some(endpoint) = get_optional_env("THEHUB_ORDER_ENDPOINT") {
            config.order_endpoint = endpoint;
        }
        config.http_timeout = get_optional_env("THEHUB_HTTP_TIMEOUT_SECS")
            .map(|raw| parse_secs("THEHUB_HTTP_TIMEOUT_SECS", &raw))
            .transpose()?;
        if let Some(raw) = get_optional_env("THEHUB_CATALOG_CACHE_TTL_SECS") {
            config.catalog_cache_ttl = parse_secs("THEHUB_CATALOG_CACHE_TTL_SECS", &raw)?;
        }
        config.sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(config)
    }

    /// File holding the persisted cart id.
    #[must_use]
    pub fn cart_id_path(&self) -> PathBuf {
        self.state_dir.join(format!("{}.json", self.cart_key))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an absolute http(s) base URL.
fn parse_base_url(var_name: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Parse a whole number of seconds.
fn parse_secs(var_name: &str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))
}

/// Reject tokens that are obviously copied from a template.
fn validate_token(token: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = token.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    Ok(())
}
