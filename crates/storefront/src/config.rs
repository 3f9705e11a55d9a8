//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BACKEND_URL` - Base URL of the hosted backend
//! - `BACKEND_ANON_KEY` - Public (anon) API key
//!
//! ## Optional
//! - `AUTOSALON_HOST` - Bind address (default: 127.0.0.1)
//! - `AUTOSALON_PORT` - Listen port (default: 3000)
//! - `AUTOSALON_BASE_URL` - Public URL of the site (default: `http://localhost:3000`)
//! - `AUTOSALON_SETTINGS_PATH` - Site settings file (default: data/site-settings.json)
//! - `AUTOSALON_PROBE_INTERVAL_SECS` - Backend reachability probe interval (default: 15)
//! - `BACKEND_SERVICE_KEY` - Service key for back-office writes
//! - `TELEGRAM_ADMIN_CHAT_IDS` - Comma separated chat ids notified about inquiries
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use autosalon_sync::RemoteConfig;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Common placeholder fragments (case-insensitive).
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace-me",
    "placeholder",
    "put-your",
    "add-your",
    "enter-",
    "insert-",
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

/// Storefront application configuration.
#[derive(Clone)]
pub struct StorefrontConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Public base URL of the site
    pub base_url: String,
    /// Where site settings are persisted
    pub settings_path: PathBuf,
    /// How often the backend health probe runs
    pub probe_interval: Duration,
    pub backend: BackendConfig,
    /// Telegram chats notified about new inquiries; `None` uses the function's default
    pub telegram_admin_chat_ids: Option<Vec<String>>,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

/// Hosted backend connection settings.
///
/// Implements `Debug` manually to redact the keys.
#[derive(Clone)]
pub struct BackendConfig {
    pub url: Url,
    pub anon_key: SecretString,
    pub service_key: Option<SecretString>,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url.as_str())
            .field("anon_key", &"[REDACTED]")
            .field("service_key", &self.service_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl std::fmt::Debug for StorefrontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("settings_path", &self.settings_path)
            .field("probe_interval", &self.probe_interval)
            .field("backend", &self.backend)
            .field("telegram_admin_chat_ids", &self.telegram_admin_chat_ids)
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[REDACTED]"))
            .field("sentry_environment", &self.sentry_environment)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if keys fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("AUTOSALON_HOST", "127.0.0.1")?;
        let port = parse_env("AUTOSALON_PORT", "3000")?;
        let base_url = get_env_or_default("AUTOSALON_BASE_URL", "http://localhost:3000");
        let settings_path =
            PathBuf::from(get_env_or_default("AUTOSALON_SETTINGS_PATH", "data/site-settings.json"));
        let probe_secs: u64 = parse_env("AUTOSALON_PROBE_INTERVAL_SECS", "15")?;
        if probe_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "AUTOSALON_PROBE_INTERVAL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            host,
            port,
            base_url,
            settings_path,
            probe_interval: Duration::from_secs(probe_secs),
            backend: BackendConfig::from_env()?,
            telegram_admin_chat_ids: get_optional_env("TELEGRAM_ADMIN_CHAT_IDS")
                .map(|raw| parse_chat_ids(&raw))
                .filter(|ids| !ids.is_empty()),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the site is served over HTTPS (secure cookies).
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl BackendConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw_url = get_required_env("BACKEND_URL")?;
        let url = Url::parse(&raw_url)
            .map_err(|e| ConfigError::InvalidEnvVar("BACKEND_URL".to_string(), e.to_string()))?;

        let service_key = match get_optional_env("BACKEND_SERVICE_KEY") {
            Some(value) => Some(validated_secret(value, "BACKEND_SERVICE_KEY")?),
            None => None,
        };

        Ok(Self {
            url,
            anon_key: validated_secret(get_required_env("BACKEND_ANON_KEY")?, "BACKEND_ANON_KEY")?,
            service_key,
        })
    }

    /// Settings for the remote data client.
    #[must_use]
    pub fn remote_config(&self) -> RemoteConfig {
        RemoteConfig::new(self.url.clone(), self.anon_key.clone())
            .with_service_key(self.service_key.clone())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Split a comma separated list, dropping blanks.
fn parse_chat_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect()
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Reject placeholder values and low-entropy keys.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

fn validated_secret(value: String, key: &str) -> Result<SecretString, ConfigError> {
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> StorefrontConfig {
        StorefrontConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            settings_path: PathBuf::from("data/site-settings.json"),
            probe_interval: Duration::from_secs(15),
            backend: BackendConfig {
                url: Url::parse("https://project.backend.example").unwrap(),
                anon_key: SecretString::from("anon_key_value_8f3Kq"),
                service_key: Some(SecretString::from("super_secret_service_key")),
            },
            telegram_admin_chat_ids: None,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_validate_secret_strength() {
        assert!(matches!(
            validate_secret_strength("your-anon-key-here", "TEST_VAR"),
            Err(ConfigError::InsecureSecret(_, _))
        ));
        assert!(validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR").is_err());
        assert!(
            validate_secret_strength("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJyb2xlIjoiYW5vbiJ9", "TEST_VAR")
                .is_ok()
        );
    }

    #[test]
    fn test_parse_chat_ids() {
        assert_eq!(parse_chat_ids(" 123, -456 ,,"), vec!["123", "-456"]);
        assert!(parse_chat_ids(" , ").is_empty());
    }

    #[test]
    fn test_socket_addr() {
        let addr = config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
        assert!(!config().is_secure());
    }

    #[test]
    fn test_debug_redacts_keys() {
        let debug_output = format!("{:?}", config());
        assert!(debug_output.contains("project.backend.example"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("anon_key_value"));
        assert!(!debug_output.contains("super_secret_service_key"));
    }
}
