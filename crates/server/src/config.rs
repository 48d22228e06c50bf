//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SERVER_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `SERVER_BASE_URL` - Public URL of the API
//! - `SERVER_SESSION_SECRET` - Session secret (min 32 chars, high entropy)
//! - `PAYMENT_BANK_BIN` - Six-digit NAPAS BIN of the receiving bank
//! - `PAYMENT_ACCOUNT_NUMBER` - Receiving account number
//! - `PAYMENT_ACCOUNT_NAME` - Account holder name shown on the QR image
//!
//! ## Optional
//! - `SERVER_HOST` - Bind address (default: 127.0.0.1)
//! - `SERVER_PORT` - Listen port (default: 8080)
//! - `CORS_ALLOWED_ORIGIN` - Origin allowed to call the API with credentials
//! - `PAYMENT_BANK_CODE` - Bank short code for QR image links (default: the BIN)
//! - `PAYMENT_QR_TEMPLATE` - QR image template (default: compact2)
//! - `PAYMENT_TRANSFER_PREFIX` - Prefix of transfer contents (default: BARBERLY)
//! - `PAYMENT_TIMEOUT_SECS` - Confirmation window for QR payments (default: 300)
//! - `PAYMENT_POLL_INTERVAL_SECS` - Watcher poll interval (default: 5)
//! - `BANK_FEED_URL` / `BANK_FEED_TOKEN` - Incoming transfer feed polled by watchers
//! - `BANK_WEBHOOK_SECRET` - HMAC secret for `POST /payments/webhook`
//! - `BOOKING_MAX_DAYS_AHEAD` - Booking horizon in days (default: 14)
//! - `BOOKING_MIN_LEAD_MINUTES` - Minimum notice for new bookings (default: 0)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

/// Listen port when `SERVER_PORT` is unset.
pub const DEFAULT_PORT: &str = "8080";

const MIN_SESSION_SECRET_LENGTH: usize = 32;
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

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the API
    pub base_url: String,
    /// Session secret
    pub session_secret: SecretString,
    /// Origin allowed for credentialed CORS requests
    pub cors_allowed_origin: Option<String>,
    /// Where QR payments are paid to and how long they stay open
    pub payment: PaymentConfig,
    /// Incoming transfer feed, if one is configured
    pub bank_feed: Option<BankFeedConfig>,
    /// HMAC secret for bank webhooks
    pub webhook_secret: Option<SecretString>,
    /// Booking window rules
    pub booking: BookingConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Receiving account and timing for QR payments.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Six-digit NAPAS BIN of the receiving bank
    pub bank_bin: String,
    /// Bank short code or BIN used in QR image links
    pub bank_code: String,
    /// Receiving account number
    pub account_number: String,
    /// Account holder name
    pub account_name: String,
    /// QR image template
    pub qr_template: String,
    /// Prefix of generated transfer contents
    pub transfer_prefix: String,
    /// How long a pending QR payment waits for the transfer
    pub confirmation_timeout: Duration,
    /// Delay between watcher probes
    pub poll_interval: Duration,
}

/// Incoming transfer feed endpoint.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct BankFeedConfig {
    /// Feed URL
    pub url: Url,
    /// Bearer token
    pub token: SecretString,
}

impl std::fmt::Debug for BankFeedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BankFeedConfig")
            .field("url", &self.url.as_str())
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Booking window rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingConfig {
    /// How many days ahead customers may book (and query availability)
    pub max_days_ahead: u32,
    /// Minimum notice, in minutes, between now and a new booking's start
    pub min_lead_minutes: u32,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            max_days_ahead: 14,
            min_lead_minutes: 0,
        }
    }
}

impl ServerConfig {
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

        let database_url = get_database_url("SERVER_DATABASE_URL")?;
        let host = parse_env::<IpAddr>("SERVER_HOST", "127.0.0.1")?;
        let port = parse_env::<u16>("SERVER_PORT", DEFAULT_PORT)?;
        let base_url = get_required_env("SERVER_BASE_URL")?;
        let session_secret = get_validated_secret("SERVER_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "SERVER_SESSION_SECRET")?;

        let webhook_secret = match get_optional_env("BANK_WEBHOOK_SECRET") {
            Some(value) => {
                validate_secret_strength(&value, "BANK_WEBHOOK_SECRET")?;
                Some(SecretString::from(value))
            }
            None => None,
        };

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            cors_allowed_origin: get_optional_env("CORS_ALLOWED_ORIGIN"),
            payment: PaymentConfig::from_env()?,
            bank_feed: BankFeedConfig::from_env()?,
            webhook_secret,
            booking: BookingConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl PaymentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let bank_bin = get_required_env("PAYMENT_BANK_BIN")?;
        validate_bank_bin(&bank_bin, "PAYMENT_BANK_BIN")?;

        Ok(Self {
            bank_code: get_optional_env("PAYMENT_BANK_CODE").unwrap_or_else(|| bank_bin.clone()),
            bank_bin,
            account_number: get_required_env("PAYMENT_ACCOUNT_NUMBER")?,
            account_name: get_required_env("PAYMENT_ACCOUNT_NAME")?,
            qr_template: get_env_or_default("PAYMENT_QR_TEMPLATE", "compact2"),
            transfer_prefix: get_env_or_default("PAYMENT_TRANSFER_PREFIX", "BARBERLY"),
            confirmation_timeout: Duration::from_secs(parse_env("PAYMENT_TIMEOUT_SECS", "300")?),
            poll_interval: Duration::from_secs(parse_env("PAYMENT_POLL_INTERVAL_SECS", "5")?),
        })
    }
}

impl BankFeedConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(raw) = get_optional_env("BANK_FEED_URL") else {
            return Ok(None);
        };
        let url = Url::parse(&raw)
            .map_err(|e| ConfigError::InvalidEnvVar("BANK_FEED_URL".to_owned(), e.to_string()))?;
        let token = get_required_secret("BANK_FEED_TOKEN")?;
        Ok(Some(Self { url, token }))
    }
}

impl BookingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let max_days_ahead = parse_env::<u32>("BOOKING_MAX_DAYS_AHEAD", "14")?;
        if max_days_ahead == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "BOOKING_MAX_DAYS_AHEAD".to_owned(),
                "must be at least 1".to_owned(),
            ));
        }
        Ok(Self {
            max_days_ahead,
            min_lead_minutes: parse_env("BOOKING_MIN_LEAD_MINUTES", "0")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a bank BIN is six digits.
fn validate_bank_bin(bin: &str, var_name: &str) -> Result<(), ConfigError> {
    if bin.len() == 6 && bin.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            "must be a 6-digit NAPAS bank BIN".to_owned(),
        ))
    }
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
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
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// Configuration used by unit tests across the crate.
    pub(crate) fn test_config() -> ServerConfig {
        ServerConfig {
            database_url: SecretString::from("postgres://localhost/barberly_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            cors_allowed_origin: None,
            payment: PaymentConfig {
                bank_bin: "970436".to_owned(),
                bank_code: "vcb".to_owned(),
                account_number: "0011001234567".to_owned(),
                account_name: "NGUYEN VAN A".to_owned(),
                qr_template: "compact2".to_owned(),
                transfer_prefix: "BARBERLY".to_owned(),
                confirmation_timeout: Duration::from_secs(300),
                poll_interval: Duration::from_secs(5),
            },
            bank_feed: None,
            webhook_secret: None,
            booking: BookingConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
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
        let err = validate_secret_strength("changeme123", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_session_secret_length() {
        assert!(validate_session_secret(&SecretString::from("short"), "S").is_err());
        assert!(validate_session_secret(&SecretString::from("a".repeat(32)), "S").is_ok());
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value::<u16>("PORT", " 8080 ").unwrap(), 8080);
        let err = parse_value::<u16>("PORT", "eighty").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "PORT"));
    }

    #[test]
    fn test_validate_bank_bin() {
        assert!(validate_bank_bin("970436", "BIN").is_ok());
        assert!(validate_bank_bin("97043", "BIN").is_err());
        assert!(validate_bank_bin("97043a", "BIN").is_err());
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_bank_feed_debug_redacts_token() {
        let config = BankFeedConfig {
            url: Url::parse("https://bank.example.vn/transactions").unwrap(),
            token: SecretString::from("super_secret_feed_token"),
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("bank.example.vn"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_feed_token"));
    }
}
