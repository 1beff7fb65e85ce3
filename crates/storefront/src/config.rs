//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string for the session store
//!   (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `CATALOG_PROJECT_URL` - Catalog store project API URL
//! - `CATALOG_TOKEN` - Catalog store write token
//! - `IDENTITY_API_URL` - Identity provider API URL
//! - `IDENTITY_SECRET_KEY` - Identity provider secret key
//! - `PAYMENTS_SECRET_KEY` - Payment processor secret key
//! - `SHIPPING_API_KEY` - Shipping provider API token
//! - `SHIPPING_ORIGIN_NAME`, `SHIPPING_ORIGIN_STREET`, `SHIPPING_ORIGIN_CITY`,
//!   `SHIPPING_ORIGIN_STATE`, `SHIPPING_ORIGIN_ZIP`, `SHIPPING_ORIGIN_COUNTRY`,
//!   `SHIPPING_ORIGIN_PHONE`, `SHIPPING_ORIGIN_EMAIL` - Warehouse address
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `CATALOG_DATASET` - Dataset name (default: production)
//! - `CATALOG_API_VERSION` - Dated API version (default: 2024-01-01)
//! - `PAYMENTS_API_URL` - default: <https://api.stripe.com>
//! - `PAYMENTS_CURRENCY` - ISO currency code (default: usd)
//! - `SHIPPING_API_URL` - default: <https://api.goshippo.com>
//! - `SHIPPING_PARCEL_LENGTH` / `_WIDTH` / `_HEIGHT` - Parcel box (default: 10 / 8 / 4)
//! - `SHIPPING_DISTANCE_UNIT` - default: in
//! - `SHIPPING_MASS_UNIT` - default: lb
//! - `CHECKOUT_CUSTOMER_MATCH` - `mobile_first` (default) or `provider_id_only`
//! - `HTTP_TIMEOUT_SECS` - Outbound request timeout (default: 30)
//! - `ORDER_WEBHOOK_SECRET` - Shared secret for the order status webhook
//!   (min 32 chars); the webhook rejects every call when unset
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`,
//!   `SENTRY_TRACES_SAMPLE_RATE` - Error tracking

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_WEBHOOK_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
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

/// How checkout finds an existing customer record for a signed-in shopper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CustomerMatchPolicy {
    /// Look up by mobile number, then by identity-provider id. A mobile hit
    /// wins even when the record belongs to another identity.
    #[default]
    MobileFirst,
    /// Only ever match on identity-provider id.
    ProviderIdOnly,
}

impl FromStr for CustomerMatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mobile_first" => Ok(Self::MobileFirst),
            "provider_id_only" => Ok(Self::ProviderIdOnly),
            other => Err(format!(
                "expected `mobile_first` or `provider_id_only`, got `{other}`"
            )),
        }
    }
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    pub catalog: CatalogConfig,
    pub identity: IdentityConfig,
    pub payments: PaymentsConfig,
    pub shipping: ShippingConfig,
    pub checkout: CheckoutConfig,
    /// Timeout applied to every outbound collaborator request
    pub http_timeout: Duration,
    /// Shared secret expected in `x-webhook-secret` on the order status webhook
    pub order_webhook_secret: Option<SecretString>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
}

/// Headless catalog store configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct CatalogConfig {
    /// Project API root, e.g. `https://abc123.api.sanity.io`
    pub project_url: String,
    pub dataset: String,
    /// Dated API version without the `v` prefix, e.g. `2024-01-01`
    pub api_version: String,
    pub token: SecretString,
}

impl std::fmt::Debug for CatalogConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogConfig")
            .field("project_url", &self.project_url)
            .field("dataset", &self.dataset)
            .field("api_version", &self.api_version)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Identity provider backend API configuration.
#[derive(Clone)]
pub struct IdentityConfig {
    pub api_url: String,
    pub secret_key: SecretString,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("api_url", &self.api_url)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

/// Payment processor configuration.
#[derive(Clone)]
pub struct PaymentsConfig {
    pub api_url: String,
    pub secret_key: SecretString,
    /// Lower-case ISO 4217 code sent with every capture
    pub currency: String,
}

impl std::fmt::Debug for PaymentsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentsConfig")
            .field("api_url", &self.api_url)
            .field("secret_key", &"[REDACTED]")
            .field("currency", &self.currency)
            .finish()
    }
}

/// Shipping provider configuration, including the fixed origin and parcel box.
#[derive(Clone)]
pub struct ShippingConfig {
    pub api_url: String,
    pub api_key: SecretString,
    pub origin: ShippingOrigin,
    pub parcel: ParcelDefaults,
}

impl std::fmt::Debug for ShippingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShippingConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .field("origin", &self.origin)
            .field("parcel", &self.parcel)
            .finish()
    }
}

/// Warehouse address every shipment leaves from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingOrigin {
    pub name: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    pub phone: String,
    pub email: String,
}

/// Box dimensions used for every order's aggregate parcel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParcelDefaults {
    pub length: Decimal,
    pub width: Decimal,
    pub height: Decimal,
    pub distance_unit: String,
    pub mass_unit: String,
}

impl Default for ParcelDefaults {
    fn default() -> Self {
        Self {
            length: Decimal::from(10),
            width: Decimal::from(8),
            height: Decimal::from(4),
            distance_unit: "in".to_string(),
            mass_unit: "lb".to_string(),
        }
    }
}

/// Checkout behaviour switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckoutConfig {
    pub customer_match: CustomerMatchPolicy,
}

impl StorefrontConfig {
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

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = get_parsed_or_default::<IpAddr>("STOREFRONT_HOST", "127.0.0.1")?;
        let port = get_parsed_or_default::<u16>("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_url("STOREFRONT_BASE_URL")?;

        let order_webhook_secret = match get_optional_env("ORDER_WEBHOOK_SECRET") {
            Some(value) => {
                let secret = SecretString::from(value);
                validate_min_length(&secret, "ORDER_WEBHOOK_SECRET")?;
                Some(secret)
            }
            None => None,
        };

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            catalog: CatalogConfig::from_env()?,
            identity: IdentityConfig::from_env()?,
            payments: PaymentsConfig::from_env()?,
            shipping: ShippingConfig::from_env()?,
            checkout: CheckoutConfig {
                customer_match: get_parsed_or_default("CHECKOUT_CUSTOMER_MATCH", "mobile_first")?,
            },
            http_timeout: Duration::from_secs(get_parsed_or_default("HTTP_TIMEOUT_SECS", "30")?),
            order_webhook_secret,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: get_parsed_or_default("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: get_parsed_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }

    /// Load only the session database URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if neither `STOREFRONT_DATABASE_URL` nor
    /// `DATABASE_URL` is set.
    pub fn database_url_from_env() -> Result<SecretString, ConfigError> {
        let _ = dotenvy::dotenv();
        get_database_url("STOREFRONT_DATABASE_URL")
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl CatalogConfig {
    /// Load only the catalog settings (used by `fm-cli`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is missing or the token fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            project_url: get_required_url("CATALOG_PROJECT_URL")?,
            dataset: get_env_or_default("CATALOG_DATASET", "production"),
            api_version: get_env_or_default("CATALOG_API_VERSION", "2024-01-01"),
            token: get_validated_secret("CATALOG_TOKEN")?,
        })
    }
}

impl IdentityConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: get_required_url("IDENTITY_API_URL")?,
            secret_key: get_validated_secret("IDENTITY_SECRET_KEY")?,
        })
    }
}

impl PaymentsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: parse_url("PAYMENTS_API_URL", &get_env_or_default("PAYMENTS_API_URL", "https://api.stripe.com"))?,
            secret_key: get_validated_secret("PAYMENTS_SECRET_KEY")?,
            currency: get_env_or_default("PAYMENTS_CURRENCY", "usd").to_ascii_lowercase(),
        })
    }
}

impl ShippingConfig {
    /// Load only the shipping settings (used by `fm-cli`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = ParcelDefaults::default();
        Ok(Self {
            api_url: parse_url("SHIPPING_API_URL", &get_env_or_default("SHIPPING_API_URL", "https://api.goshippo.com"))?,
            api_key: get_validated_secret("SHIPPING_API_KEY")?,
            origin: ShippingOrigin {
                name: get_required_env("SHIPPING_ORIGIN_NAME")?,
                street: get_required_env("SHIPPING_ORIGIN_STREET")?,
                city: get_required_env("SHIPPING_ORIGIN_CITY")?,
                state: get_required_env("SHIPPING_ORIGIN_STATE")?,
                zip: get_required_env("SHIPPING_ORIGIN_ZIP")?,
                country: get_required_env("SHIPPING_ORIGIN_COUNTRY")?,
                phone: get_required_env("SHIPPING_ORIGIN_PHONE")?,
                email: get_required_env("SHIPPING_ORIGIN_EMAIL")?,
            },
            parcel: ParcelDefaults {
                length: get_parsed_or_default("SHIPPING_PARCEL_LENGTH", "10")?,
                width: get_parsed_or_default("SHIPPING_PARCEL_WIDTH", "8")?,
                height: get_parsed_or_default("SHIPPING_PARCEL_HEIGHT", "4")?,
                distance_unit: get_env_or_default("SHIPPING_DISTANCE_UNIT", &defaults.distance_unit),
                mass_unit: get_env_or_default("SHIPPING_MASS_UNIT", &defaults.mass_unit),
            },
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

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get a required absolute http(s) URL, without its trailing slash.
fn get_required_url(key: &str) -> Result<String, ConfigError> {
    parse_url(key, &get_required_env(key)?)
}

fn parse_url(key: &str, raw: &str) -> Result<String, ConfigError> {
    let url = url::Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme `{}`", url.scheme()),
        ));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn get_parsed_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
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
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a shared secret meets minimum length requirements.
fn validate_min_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_WEBHOOK_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_WEBHOOK_SECRET_LENGTH,
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
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(**p)) {
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key issued by the provider."
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
mod tests {
    use super::*;

    #[test]
    fn test_parse_url_strips_trailing_slash() {
        assert_eq!(
            parse_url("SHIPPING_API_URL", "https://api.goshippo.com/").unwrap(),
            "https://api.goshippo.com"
        );
    }

    #[test]
    fn test_parse_url_rejects_relative_and_non_http() {
        assert!(matches!(
            parse_url("IDENTITY_API_URL", "api.example.com"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        assert!(parse_url("IDENTITY_API_URL", "ftp://files.example.com").is_err());
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
        let err = validate_secret_strength("your-shipping-token", "SHIPPING_API_KEY").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("sk_test_aaaaaaaaaaaaaaaaaaaa", "PAYMENTS_SECRET_KEY");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_provider_key() {
        let result = validate_secret_strength("sk_test_51Hx9QbK2vR7mZp4LwT8nYc3", "PAYMENTS_SECRET_KEY");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_min_length() {
        assert!(validate_min_length(&SecretString::from("short"), "ORDER_WEBHOOK_SECRET").is_err());
        assert!(validate_min_length(&SecretString::from("k".repeat(32)), "ORDER_WEBHOOK_SECRET").is_ok());
    }

    #[test]
    fn test_customer_match_policy_parse() {
        assert_eq!(
            "mobile_first".parse::<CustomerMatchPolicy>().unwrap(),
            CustomerMatchPolicy::MobileFirst
        );
        assert_eq!(
            " PROVIDER_ID_ONLY ".parse::<CustomerMatchPolicy>().unwrap(),
            CustomerMatchPolicy::ProviderIdOnly
        );
        assert!("email_first".parse::<CustomerMatchPolicy>().is_err());
    }

    #[test]
    fn test_parse_value_reports_variable() {
        let err = parse_value::<Decimal>("SHIPPING_PARCEL_LENGTH", "ten").unwrap_err();
        assert!(err.to_string().contains("SHIPPING_PARCEL_LENGTH"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let payments = PaymentsConfig {
            api_url: "https://api.stripe.com".to_string(),
            secret_key: SecretString::from("sk_live_super_hidden_value"),
            currency: "usd".to_string(),
        };
        let catalog = CatalogConfig {
            project_url: "https://abc123.api.sanity.io".to_string(),
            dataset: "production".to_string(),
            api_version: "2024-01-01".to_string(),
            token: SecretString::from("sk_catalog_hidden_token"),
        };

        let debug_output = format!("{payments:?} {catalog:?}");
        assert!(debug_output.contains("https://api.stripe.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_hidden"));
        assert!(!debug_output.contains("hidden_token"));
    }

    #[test]
    fn test_parcel_defaults() {
        let parcel = ParcelDefaults::default();
        assert_eq!(parcel.length, Decimal::from(10));
        assert_eq!(parcel.mass_unit, "lb");
    }
}
