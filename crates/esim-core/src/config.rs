//! Configuration types for the eSIM gateway
//!
//! Configuration is an explicit value handed to constructors. Nothing in the
//! library reads the environment behind the caller's back; [`EsimConfig::from_env`]
//! exists for binaries.

use crate::http::BackoffPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EsimConfig {
    /// Global feature flag; when false every gateway operation fails with `ESIM_DISABLED`
    #[serde(default)]
    pub enabled: bool,

    /// Active connectivity provider
    #[serde(default)]
    pub provider: ProviderKind,

    /// Telna credentials
    #[serde(default)]
    pub telna: Option<TelnaConfig>,

    /// emnify credentials
    #[serde(default)]
    pub emnify: Option<EmnifyConfig>,

    /// Outbound HTTP settings shared by all adapters
    #[serde(default)]
    pub http: HttpSettings,
}

impl EsimConfig {
    /// Load configuration from process environment variables
    ///
    /// # Variables
    ///
    /// - `ESIM_ENABLED`: `true`/`1`/`yes`/`on` enables the feature
    /// - `ESIM_PROVIDER`: `telna` (default) or `emnify`
    /// - `TELNA_API_BASE`, `TELNA_API_KEY`
    /// - `EMNIFY_API_BASE`, `EMNIFY_APP_TOKEN_ID`, `EMNIFY_APP_TOKEN_SECRET`
    /// - `ESIM_HTTP_TIMEOUT_MS`, `ESIM_RETRY_BASE_MS`, `ESIM_RETRY_JITTER_MS`
    pub fn from_env() -> Result<Self, crate::Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, crate::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let provider = match get("ESIM_PROVIDER") {
            Some(key) => key.parse()?,
            None => ProviderKind::default(),
        };

        let telna = match (get("TELNA_API_BASE"), get("TELNA_API_KEY")) {
            (None, None) => None,
            (api_base, api_key) => Some(TelnaConfig {
                api_base,
                api_key,
                max_attempts: default_telna_max_attempts(),
            }),
        };

        let emnify = match (
            get("EMNIFY_API_BASE"),
            get("EMNIFY_APP_TOKEN_ID"),
            get("EMNIFY_APP_TOKEN_SECRET"),
        ) {
            (None, None, None) => None,
            (api_base, app_token_id, app_token_secret) => Some(EmnifyConfig {
                api_base,
                app_token_id,
                app_token_secret,
                max_attempts: default_emnify_max_attempts(),
            }),
        };

        let mut http = HttpSettings::default();
        if let Some(value) = get("ESIM_HTTP_TIMEOUT_MS") {
            http.timeout_ms = parse_number("ESIM_HTTP_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = get("ESIM_RETRY_BASE_MS") {
            http.backoff_base_ms = parse_number("ESIM_RETRY_BASE_MS", &value)?;
        }
        if let Some(value) = get("ESIM_RETRY_JITTER_MS") {
            http.max_jitter_ms = parse_number("ESIM_RETRY_JITTER_MS", &value)?;
        }

        Ok(Self {
            enabled: get("ESIM_ENABLED").is_some_and(|v| parse_flag(&v)),
            provider,
            telna,
            emnify,
            http,
        })
    }

    /// Validate the configuration
    ///
    /// Missing vendor credentials are not an error here; the adapter reports
    /// `<VENDOR>_NOT_CONFIGURED` when an operation is attempted.
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.http.validate()?;

        if let Some(telna) = &self.telna
            && telna.max_attempts == 0
        {
            return Err(crate::Error::config("Telna max_attempts must be at least 1"));
        }

        if let Some(emnify) = &self.emnify
            && emnify.max_attempts == 0
        {
            return Err(crate::Error::config("emnify max_attempts must be at least 1"));
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_number(key: &str, value: &str) -> Result<u64, crate::Error> {
    value
        .parse()
        .map_err(|_| crate::Error::config(format!("{} must be a number, got '{}'", key, value)))
}

/// Supported connectivity providers
///
/// A closed set: each variant is bound to one adapter factory at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Telna
    #[default]
    Telna,
    /// emnify
    Emnify,
}

impl ProviderKind {
    /// Configuration key for this provider
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Telna => "telna",
            ProviderKind::Emnify => "emnify",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telna" => Ok(ProviderKind::Telna),
            "emnify" => Ok(ProviderKind::Emnify),
            other => Err(crate::Error::UnsupportedProvider(other.to_string())),
        }
    }
}

/// Telna credentials
#[derive(Clone, Serialize, Deserialize)]
pub struct TelnaConfig {
    /// API base URL (e.g. `https://api.telna.com/v1`)
    pub api_base: Option<String>,
    /// Bearer API key
    /// ⚠️ NEVER log this value
    pub api_key: Option<String>,
    /// Attempts per call
    #[serde(default = "default_telna_max_attempts")]
    pub max_attempts: u32,
}

// Custom Debug implementation that hides the API key
impl fmt::Debug for TelnaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelnaConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "<REDACTED>"))
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

/// emnify credentials (application token pair, sent as HTTP basic auth)
#[derive(Clone, Serialize, Deserialize)]
pub struct EmnifyConfig {
    /// API base URL (e.g. `https://cdn.emnify.net`)
    pub api_base: Option<String>,
    /// Application token id
    pub app_token_id: Option<String>,
    /// Application token secret
    /// ⚠️ NEVER log this value
    pub app_token_secret: Option<String>,
    /// Attempts per call
    #[serde(default = "default_emnify_max_attempts")]
    pub max_attempts: u32,
}

impl fmt::Debug for EmnifyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmnifyConfig")
            .field("api_base", &self.api_base)
            .field("app_token_id", &self.app_token_id)
            .field(
                "app_token_secret",
                &self.app_token_secret.as_ref().map(|_| "<REDACTED>"),
            )
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

fn default_telna_max_attempts() -> u32 {
    3
}

fn default_emnify_max_attempts() -> u32 {
    2
}

/// Outbound HTTP settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Per-attempt timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Backoff base in milliseconds; delay before attempt n+1 is `base * 2^(n-1)`
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound of the random jitter added to each backoff delay
    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
}

impl HttpSettings {
    /// Per-attempt timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Backoff policy derived from these settings
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.max_jitter_ms),
        )
    }

    /// Validate the HTTP settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.timeout_ms == 0 {
            return Err(crate::Error::config("HTTP timeout must be > 0"));
        }
        Ok(())
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            max_jitter_ms: default_max_jitter_ms(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_backoff_base_ms() -> u64 {
    300
}

fn default_max_jitter_ms() -> u64 {
    100
}

/// Fulfillment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentConfig {
    /// Region used when a purchase needs a fresh eSIM profile
    #[serde(default = "default_region")]
    pub default_region: String,

    /// Price id → product mapping
    #[serde(default)]
    pub catalog: PriceCatalog,
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            default_region: default_region(),
            catalog: PriceCatalog::default(),
        }
    }
}

fn default_region() -> String {
    "EU".to_string()
}

/// Maps billing price ids to the products they sell
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceCatalog {
    products: HashMap<String, CatalogProduct>,
}

impl PriceCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a price to the catalog
    pub fn with_price(mut self, price_id: impl Into<String>, product: CatalogProduct) -> Self {
        self.products.insert(price_id.into(), product);
        self
    }

    /// Look up the product sold under a price id
    pub fn resolve(&self, price_id: &str) -> Option<&CatalogProduct> {
        self.products.get(price_id)
    }

    /// Number of configured prices
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// Product sold under a price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CatalogProduct {
    /// Subscription plan; updates plan state only
    Plan {
        /// Plan code stored against the user
        plan_code: String,
    },

    /// One-time data pack for the buyer's own line
    MobilePack {
        /// Vendor add-on kind (e.g. "data_5gb")
        addon_kind: String,
        /// Megabytes credited per unit
        data_mb: u64,
        /// Optional vendor plan code
        #[serde(default)]
        plan_code: Option<String>,
    },

    /// Shared family pool pack; creates or tops up the buyer's group
    FamilyPack {
        /// Vendor add-on kind
        addon_kind: String,
        /// Megabytes added to the pool per unit
        data_mb: u64,
        /// Optional vendor plan code
        #[serde(default)]
        plan_code: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = EsimConfig::from_lookup(lookup(&[])).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.provider, ProviderKind::Telna);
        assert!(config.telna.is_none());
        assert_eq!(config.http.timeout_ms, 10_000);
        assert_eq!(config.http.backoff_base_ms, 300);
    }

    #[test]
    fn test_loads_provider_credentials() {
        let config = EsimConfig::from_lookup(lookup(&[
            ("ESIM_ENABLED", "true"),
            ("ESIM_PROVIDER", "emnify"),
            ("EMNIFY_API_BASE", "https://cdn.emnify.test"),
            ("EMNIFY_APP_TOKEN_ID", "id"),
            ("EMNIFY_APP_TOKEN_SECRET", "secret"),
            ("ESIM_HTTP_TIMEOUT_MS", "2500"),
        ]))
        .unwrap();

        assert!(config.enabled);
        assert_eq!(config.provider, ProviderKind::Emnify);
        let emnify = config.emnify.unwrap();
        assert_eq!(emnify.app_token_id.as_deref(), Some("id"));
        assert_eq!(emnify.max_attempts, 2);
        assert_eq!(config.http.timeout(), Duration::from_millis(2500));
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let err = EsimConfig::from_lookup(lookup(&[("ESIM_PROVIDER", "acme")])).unwrap_err();
        assert_eq!(err.code(), "ESIM_UNSUPPORTED_PROVIDER");
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let err =
            EsimConfig::from_lookup(lookup(&[("ESIM_HTTP_TIMEOUT_MS", "soon")])).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_validate_rejects_zero_timeout_and_attempts() {
        let mut config = EsimConfig::default();
        config.http.timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = EsimConfig::default();
        config.telna = Some(TelnaConfig {
            api_base: None,
            api_key: None,
            max_attempts: 0,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_secrets_not_exposed_in_debug() {
        let telna = TelnaConfig {
            api_base: Some("https://api.telna.test".to_string()),
            api_key: Some("secret_key_12345".to_string()),
            max_attempts: 3,
        };
        let debug_str = format!("{:?}", telna);
        assert!(!debug_str.contains("secret_key_12345"));
        assert!(debug_str.contains("<REDACTED>"));
    }

    #[test]
    fn test_catalog_deserializes_tagged_products() {
        let catalog: PriceCatalog = serde_json::from_value(serde_json::json!({
            "price_family": { "type": "family_pack", "addon_kind": "family_10gb", "data_mb": 10240 },
            "price_plan": { "type": "plan", "plan_code": "pro" }
        }))
        .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.resolve("price_plan"),
            Some(&CatalogProduct::Plan {
                plan_code: "pro".to_string()
            })
        );
        assert!(catalog.resolve("price_unknown").is_none());
    }
}
