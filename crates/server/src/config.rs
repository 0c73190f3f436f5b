//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PIZZA_TOKEN_SECRET` - Bearer token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `PIZZA_HOST` - Bind address (default: 127.0.0.1)
//! - `PORT` / `PIZZA_PORT` - Listen port (default: 3000)
//! - `PIZZA_DATABASE_URL` / `DATABASE_URL` - `PostgreSQL` document store; file storage when unset
//! - `PIZZA_DATA_DIR` - Directory for file storage (default: data)
//! - `PIZZA_TOKEN_TTL_HOURS` - Bearer token lifetime (default: 168, seven days)
//! - `GEMINI_API_KEY` - Support chat API key; chat reports a configuration error without it
//! - `GEMINI_MODEL` - Primary chat model (default: gemini-2.5-flash)
//! - `GEMINI_FALLBACK_MODEL` - Model used when the primary is unavailable (default: gemini-1.5-flash)
//! - `GEMINI_API_BASE` - Chat upstream base URL (default: Google Generative Language v1beta)
//! - `EMAIL_USER` / `EMAIL_PASSWORD` - Outbound email credentials (reported, never used)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_TOKEN_TTL_HOURS: u64 = 24 * 7;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "your_",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
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

/// Where documents are persisted.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// One JSON file per collection under `data_dir`.
    File { data_dir: PathBuf },
    /// `PostgreSQL` document table.
    Postgres { database_url: SecretString },
}

impl StorageConfig {
    /// Human readable storage mode, reported by the health endpoint.
    #[must_use]
    pub const fn describe(&self) -> &'static str {
        match self {
            Self::File { .. } => "JSON file storage",
            Self::Postgres { .. } => "PostgreSQL document store",
        }
    }
}

/// Support chat upstream configuration.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// API key. `None` leaves the chat endpoint answering with a configuration error.
    pub api_key: Option<SecretString>,
    /// Model tried first.
    pub model: String,
    /// Model tried when the first one is unknown to the upstream.
    pub fallback_model: String,
    /// Upstream base URL.
    pub api_base: String,
}

/// Outbound email credentials. Only their presence is ever reported.
#[derive(Debug, Clone, Default)]
pub struct EmailConfig {
    pub user: Option<String>,
    pub password: Option<SecretString>,
}

impl EmailConfig {
    /// Both user and password are present.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.user.is_some() && self.password.is_some()
    }
}

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Document storage backend
    pub storage: StorageConfig,
    /// Bearer token signing secret
    pub token_secret: SecretString,
    /// Bearer token lifetime
    pub token_ttl: Duration,
    /// Support chat upstream
    pub chat: ChatConfig,
    /// Outbound email credentials
    pub email: EmailConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the token secret is missing or weak, or if a
    /// variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`ServerConfig::from_env`].
    pub fn from_lookup(env: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(env);

        let host = vars
            .or_default("PIZZA_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("PIZZA_HOST".to_string(), e.to_string()))?;
        let port = vars
            .first_of(&["PORT", "PIZZA_PORT"])
            .unwrap_or_else(|| "3000".to_string())
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("PORT".to_string(), e.to_string()))?;

        let storage = match vars.first_of(&["PIZZA_DATABASE_URL", "DATABASE_URL"]) {
            Some(url) => StorageConfig::Postgres {
                database_url: SecretString::from(url),
            },
            None => StorageConfig::File {
                data_dir: PathBuf::from(vars.or_default("PIZZA_DATA_DIR", "data")),
            },
        };

        let token_secret = vars.validated_secret("PIZZA_TOKEN_SECRET")?;
        validate_secret_length(&token_secret, "PIZZA_TOKEN_SECRET")?;
        let ttl_hours = vars
            .or_default("PIZZA_TOKEN_TTL_HOURS", &DEFAULT_TOKEN_TTL_HOURS.to_string())
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("PIZZA_TOKEN_TTL_HOURS".to_string(), e.to_string())
            })?;

        let chat = ChatConfig {
            api_key: vars.non_placeholder("GEMINI_API_KEY").map(SecretString::from),
            model: vars.or_default("GEMINI_MODEL", "gemini-2.5-flash"),
            fallback_model: vars.or_default("GEMINI_FALLBACK_MODEL", "gemini-1.5-flash"),
            api_base: vars.or_default(
                "GEMINI_API_BASE",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
        };

        let email = EmailConfig {
            user: vars.non_placeholder("EMAIL_USER"),
            password: vars.non_placeholder("EMAIL_PASSWORD").map(SecretString::from),
        };

        Ok(Self {
            host,
            port,
            storage,
            token_secret,
            token_ttl: Duration::from_secs(ttl_hours * 3600),
            chat,
            email,
            sentry_dsn: vars.optional("SENTRY_DSN"),
            sentry_environment: vars.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable source with the lookup helpers used above.
struct Vars<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Vars<'_> {
    /// Get an optional variable, treating empty values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// First present variable among `keys`.
    fn first_of(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.optional(key))
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Load and validate a required secret.
    fn validated_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        let value = self
            .optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
        validate_secret_strength(&value, key)?;
        Ok(SecretString::from(value))
    }

    /// An optional credential, ignored (with a warning) when it is a template value.
    fn non_placeholder(&self, key: &str) -> Option<String> {
        let value = self.optional(key)?;
        if let Some(pattern) = placeholder_in(&value) {
            tracing::warn!(variable = key, pattern, "ignoring placeholder value");
            return None;
        }
        Some(value)
    }
}

/// Validate that a secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_TOKEN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_TOKEN_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
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
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// The first blocklisted placeholder pattern found in `value`.
fn placeholder_in(value: &str) -> Option<&'static str> {
    let lower = value.to_lowercase();
    PLACEHOLDER_PATTERNS
        .iter()
        .copied()
        .find(|pattern| lower.contains(pattern))
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    if let Some(pattern) = placeholder_in(secret) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const STRONG_SECRET: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6v";

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(&move |key: &str| map.get(key).cloned())
    }

    #[test]
    fn test_missing_token_secret_is_fatal() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref key) if key == "PIZZA_TOKEN_SECRET"));
    }

    #[test]
    fn test_defaults_to_file_storage() {
        let config = load(&[("PIZZA_TOKEN_SECRET", STRONG_SECRET)]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.token_ttl, Duration::from_secs(7 * 24 * 3600));
        assert!(matches!(config.storage, StorageConfig::File { ref data_dir } if data_dir == &PathBuf::from("data")));
        assert!(config.chat.api_key.is_none());
        assert!(!config.email.is_configured());
    }

    #[test]
    fn test_database_url_selects_postgres() {
        let config = load(&[
            ("PIZZA_TOKEN_SECRET", STRONG_SECRET),
            ("DATABASE_URL", "postgres://localhost/pizza"),
        ])
        .unwrap();
        assert_eq!(config.storage.describe(), "PostgreSQL document store");
    }

    #[test]
    fn test_port_prefers_platform_variable() {
        let config = load(&[
            ("PIZZA_TOKEN_SECRET", STRONG_SECRET),
            ("PORT", "8080"),
            ("PIZZA_PORT", "9090"),
        ])
        .unwrap();
        assert_eq!(config.socket_addr().port(), 8080);
    }

    #[test]
    fn test_invalid_port() {
        let err = load(&[("PIZZA_TOKEN_SECRET", STRONG_SECRET), ("PORT", "pizza")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_placeholder_chat_key_is_ignored() {
        let config = load(&[
            ("PIZZA_TOKEN_SECRET", STRONG_SECRET),
            ("GEMINI_API_KEY", "your_gemini_api_key_here"),
        ])
        .unwrap();
        assert!(config.chat.api_key.is_none());
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("changeme123", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("abababababababababababababababab", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_short_secret_is_rejected() {
        let err = load(&[("PIZZA_TOKEN_SECRET", "aB3$xY9!mK2@")]).unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = load(&[
            ("PIZZA_TOKEN_SECRET", STRONG_SECRET),
            ("EMAIL_PASSWORD", "hunter2hunter2"),
        ])
        .unwrap();
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains(STRONG_SECRET));
        assert!(!debug_output.contains("hunter2hunter2"));
    }
}
