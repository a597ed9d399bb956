//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string. Only host, port, database
//!   and query options are used; each role pool swaps in its own login.
//! - `DB_PASSWORD` - Shared password for the five role logins (unless every
//!   per-role override below is set)
//! - `JWT_SECRET` - Token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `DB_ADMIN_PASSWORD`, `DB_ANALYST_PASSWORD`, `DB_MODERATOR_PASSWORD`,
//!   `DB_SUPPORT_PASSWORD`, `DB_USER_PASSWORD` - Per-role password overrides
//! - `DATABASE_SSL` - Require TLS for database connections (default: false)
//! - `DB_POOL_MAX_CONNECTIONS` - Connections per role pool (default: 5)
//! - `API_HOST` - Bind address (default: 127.0.0.1)
//! - `PORT` - Listen port (default: 4000)
//! - `CLIENT_URL` - Allowed CORS origin (default: <http://localhost:5173>)
//! - `ORDER_POLL_INTERVAL_SECS` - Order status updater tick (default: 5)
//! - `ORDER_PROCESSING_AFTER_SECS` - Age at which orders start processing (default: 15)
//! - `ORDER_COMPLETED_AFTER_SECS` - Age at which orders complete (default: 25)
//! - `DOWNLOAD_BASE_URL` - Base of download links (default: <https://digitaldistributor.com>)
//! - `LOG_FORMAT` - `text` or `json` (default: text)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use digital_distributor_core::{AutoProgression, DbRole};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
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

/// API application configuration.
///
/// Implements `Debug` manually to redact the JWT secret.
#[derive(Clone)]
pub struct ApiConfig {
    pub database: DatabaseConfig,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Token signing secret
    pub jwt_secret: SecretString,
    /// Single origin allowed by CORS
    pub client_url: String,
    pub orders: OrderConfig,
    pub log_format: LogFormat,
    pub sentry: SentryConfig,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("database", &self.database)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("jwt_secret", &"[REDACTED]")
            .field("client_url", &self.client_url)
            .field("orders", &self.orders)
            .field("log_format", &self.log_format)
            .field("sentry", &self.sentry)
            .finish()
    }
}

/// Database connection settings shared by the five role pools.
#[derive(Clone)]
pub struct DatabaseConfig {
    /// Base connection URL (may contain credentials of its own)
    pub url: SecretString,
    pub passwords: RolePasswords,
    /// Require TLS
    pub require_ssl: bool,
    /// Cap per role pool
    pub max_connections: u32,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"[REDACTED]")
            .field("passwords", &self.passwords)
            .field("require_ssl", &self.require_ssl)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// One password per database login.
#[derive(Clone)]
pub struct RolePasswords {
    admin: SecretString,
    analyst: SecretString,
    moderator: SecretString,
    support: SecretString,
    user: SecretString,
}

impl std::fmt::Debug for RolePasswords {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RolePasswords([REDACTED])")
    }
}

impl RolePasswords {
    /// Same password for every login.
    #[must_use]
    pub fn shared(password: &SecretString) -> Self {
        Self {
            admin: password.clone(),
            analyst: password.clone(),
            moderator: password.clone(),
            support: password.clone(),
            user: password.clone(),
        }
    }

    /// Resolve each login's password from its override, falling back to
    /// `DB_PASSWORD`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` naming the first login with
    /// neither an override nor a shared password.
    pub fn resolve(env: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let shared = env("DB_PASSWORD");
        let lookup = |role: DbRole| -> Result<SecretString, ConfigError> {
            env(role.password_env_key())
                .or_else(|| shared.clone())
                .map(SecretString::from)
                .ok_or_else(|| ConfigError::MissingEnvVar(role.password_env_key().to_string()))
        };

        Ok(Self {
            admin: lookup(DbRole::Admin)?,
            analyst: lookup(DbRole::Analyst)?,
            moderator: lookup(DbRole::Moderator)?,
            support: lookup(DbRole::Support)?,
            user: lookup(DbRole::User)?,
        })
    }

    /// Password for one login.
    #[must_use]
    pub const fn get(&self, role: DbRole) -> &SecretString {
        match role {
            DbRole::Admin => &self.admin,
            DbRole::Analyst => &self.analyst,
            DbRole::Moderator => &self.moderator,
            DbRole::Support => &self.support,
            DbRole::User => &self.user,
        }
    }
}

/// Order lifecycle settings.
#[derive(Debug, Clone)]
pub struct OrderConfig {
    /// How often the background updater runs
    pub poll_interval: Duration,
    pub progression: AutoProgression,
    /// Download links are `{download_base_url}/app/id={app_id}`
    pub download_base_url: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Sentry error tracking settings.
#[derive(Debug, Clone)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.0,
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source.
    ///
    /// # Errors
    ///
    /// Same as [`ApiConfig::from_env`].
    pub fn from_lookup(env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database = DatabaseConfig {
            url: SecretString::from(get_required_env(&env, "DATABASE_URL")?),
            passwords: RolePasswords::resolve(&env)?,
            require_ssl: parse_env(&env, "DATABASE_SSL", false)?,
            max_connections: parse_env(&env, "DB_POOL_MAX_CONNECTIONS", 5)?,
        };

        let host: IpAddr = parse_env(&env, "API_HOST", IpAddr::from([127, 0, 0, 1]))?;
        let port: u16 = parse_env(&env, "PORT", 4000)?;

        let jwt_secret = get_required_env(&env, "JWT_SECRET")?;
        validate_jwt_secret(&jwt_secret, "JWT_SECRET")?;
        validate_secret_strength(&jwt_secret, "JWT_SECRET")?;

        let client_url = get_env_or_default(&env, "CLIENT_URL", "http://localhost:5173");

        let orders = OrderConfig {
            poll_interval: Duration::from_secs(parse_env(&env, "ORDER_POLL_INTERVAL_SECS", 5)?),
            progression: AutoProgression::new(
                Duration::from_secs(parse_env(&env, "ORDER_PROCESSING_AFTER_SECS", 15)?),
                Duration::from_secs(parse_env(&env, "ORDER_COMPLETED_AFTER_SECS", 25)?),
            ),
            download_base_url: get_env_or_default(
                &env,
                "DOWNLOAD_BASE_URL",
                "https://digitaldistributor.com",
            )
            .trim_end_matches('/')
            .to_string(),
        };
        if orders.poll_interval.is_zero() {
            return Err(ConfigError::InvalidEnvVar(
                "ORDER_POLL_INTERVAL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        if orders.progression.completed_after < orders.progression.processing_after {
            return Err(ConfigError::InvalidEnvVar(
                "ORDER_COMPLETED_AFTER_SECS".to_string(),
                "must not be shorter than ORDER_PROCESSING_AFTER_SECS".to_string(),
            ));
        }

        let log_format = match get_env_or_default(&env, "LOG_FORMAT", "text").as_str() {
            "text" => LogFormat::Text,
            "json" => LogFormat::Json,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "LOG_FORMAT".to_string(),
                    format!("expected 'text' or 'json', got '{other}'"),
                ));
            }
        };

        let sentry = SentryConfig {
            dsn: get_optional_env(&env, "SENTRY_DSN"),
            environment: get_optional_env(&env, "SENTRY_ENVIRONMENT"),
            sample_rate: parse_env(&env, "SENTRY_SAMPLE_RATE", 1.0)?,
            traces_sample_rate: parse_env(&env, "SENTRY_TRACES_SAMPLE_RATE", 0.0)?,
        };

        Ok(Self {
            database,
            host,
            port,
            jwt_secret: SecretString::from(jwt_secret),
            client_url,
            orders,
            log_format,
            sentry,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Configuration suitable for tests: no external services, fixed secret.
    #[must_use]
    pub fn for_tests(database_url: &str) -> Self {
        let password = SecretString::from("test");
        Self {
            database: DatabaseConfig {
                url: SecretString::from(database_url),
                passwords: RolePasswords::shared(&password),
                require_ssl: false,
                max_connections: 2,
            },
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            jwt_secret: SecretString::from("k8Qz!v2Lr#9mXw$4Tn@7pBy^3Hs&6Jd*"),
            client_url: "http://localhost:5173".to_string(),
            orders: OrderConfig {
                poll_interval: Duration::from_secs(5),
                progression: AutoProgression::default(),
                download_base_url: "https://digitaldistributor.com".to_string(),
            },
            log_format: LogFormat::Text,
            sentry: SentryConfig::default(),
        }
    }
}

impl DatabaseConfig {
    /// Base URL for connections made outside the role pools (CLI, tests).
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.url.expose_secret()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    env(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    env(key).filter(|value| !value.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(env: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an optional environment variable, falling back to `default` if unset.
fn parse_env<T>(env: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get_optional_env(env, key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

/// Validate that the JWT secret meets minimum length requirements.
fn validate_jwt_secret(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                secret.len()
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
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
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
