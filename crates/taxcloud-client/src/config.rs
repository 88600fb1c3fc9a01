//! # TaxCloud Configuration
//!
//! Configuration management for the integration.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TAXCLOUD_API_ID=...  TAXCLOUD_API_KEY=...                          │
//! │     TAXCLOUD_ENABLED=true                                              │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/checkout/taxcloud.toml (Linux)                           │
//! │     ~/Library/Application Support/net.taxcloud.checkout/taxcloud.toml  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     disabled, TIC 00000 / 11010, no caching, capture on order creation │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # taxcloud.toml
//! [settings]
//! enabled = true
//! api_id = "1234ABCD"
//! api_key = "5678-EF90"
//! guest_customer_id = "-1"
//! default_tic = "00000"
//! shipping_tic = "11010"
//! cache_lifetime_secs = 86400
//! capture_trigger = "order_creation"  # order_creation | payment | shipment
//!
//! [origin]
//! street = ["1 Main St"]
//! city = "Northfield"
//! region = "MN"
//! postcode = "55057"
//!
//! [cache]
//! backend = "redis"  # memory | redis
//! redis_url = "redis://127.0.0.1/"
//!
//! [fallback]
//! enabled = true
//! default_rate_bps = 0
//! region_rates = { MN = 688 }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use taxcloud_core::tic::{DEFAULT_TIC, SHIPPING_TIC};
use taxcloud_core::types::{Address, CaptureTrigger, TaxRate};
use taxcloud_core::validation::{validate_rate_bps, validate_tic};
use taxcloud_core::RateTableCalculator;

use crate::error::{ClientError, ClientResult};

// =============================================================================
// Integration Settings
// =============================================================================

/// Credentials and behavior of the integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationSettings {
    /// Master switch. When off, the collector uses the native calculator and
    /// the observer does nothing.
    #[serde(default)]
    pub enabled: bool,

    /// API login id issued by TaxCloud.
    #[serde(default)]
    pub api_id: String,

    /// API key issued by TaxCloud.
    #[serde(default)]
    pub api_key: String,

    /// `customerID` sent for guest checkouts.
    #[serde(default = "default_guest_customer_id")]
    pub guest_customer_id: String,

    #[serde(default = "default_tic")]
    pub default_tic: String,

    #[serde(default = "default_shipping_tic")]
    pub shipping_tic: String,

    /// Lifetime of cached lookups and address verifications.
    /// 0 disables caching.
    #[serde(default)]
    pub cache_lifetime_secs: u64,

    /// Lifecycle event that triggers AuthorizedWithCapture.
    #[serde(default)]
    pub capture_trigger: CaptureTrigger,

    /// Sent as `returnCoDeliveryFeeWhenNoCartItems` on every return.
    #[serde(default)]
    pub return_co_delivery_fee_when_no_cart_items: bool,

    /// Replace the destination with the service's verified form before each
    /// lookup.
    #[serde(default)]
    pub verify_address: bool,
}

fn default_guest_customer_id() -> String {
    "-1".to_string()
}

fn default_tic() -> String {
    DEFAULT_TIC.to_string()
}

fn default_shipping_tic() -> String {
    SHIPPING_TIC.to_string()
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        IntegrationSettings {
            enabled: false,
            api_id: String::new(),
            api_key: String::new(),
            guest_customer_id: default_guest_customer_id(),
            default_tic: default_tic(),
            shipping_tic: default_shipping_tic(),
            cache_lifetime_secs: 0,
            capture_trigger: CaptureTrigger::default(),
            return_co_delivery_fee_when_no_cart_items: false,
            verify_address: false,
        }
    }
}

// =============================================================================
// Service Settings
// =============================================================================

/// Where and how the remote service is called.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Base URL; operation names are appended (`{base_url}/Lookup`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Delay before the single retry (milliseconds).
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

fn default_base_url() -> String {
    "https://api.taxcloud.net/1.0/TaxCloud".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_retry_delay() -> u64 {
    250
}

impl Default for ServiceSettings {
    fn default() -> Self {
        ServiceSettings {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

impl ServiceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

// =============================================================================
// Cache Settings
// =============================================================================

/// Response cache backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    /// Per-process map. Lost on restart.
    #[default]
    Memory,

    /// Shared Redis instance.
    Redis,
}

impl std::fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackend::Memory => write!(f, "memory"),
            CacheBackend::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for CacheBackend {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "redis" => Ok(CacheBackend::Redis),
            other => Err(ClientError::InvalidConfig(format!(
                "Unknown cache backend: '{}'. Valid options: memory, redis",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default)]
    pub backend: CacheBackend,

    /// Required when `backend = "redis"`.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Entry bound of the in-process cache.
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: u64,
}

fn default_memory_capacity() -> u64 {
    crate::cache::MEMORY_MAX_CAPACITY
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            redis_url: None,
            memory_capacity: default_memory_capacity(),
        }
    }
}

// =============================================================================
// Fallback Settings
// =============================================================================

/// Local rate table used when the integration is off or the service fails.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FallbackSettings {
    /// Use the rate table when a lookup fails. When off, failures yield zero
    /// tax.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub default_rate_bps: u32,

    /// Rate by two-letter state code.
    #[serde(default)]
    pub region_rates: BTreeMap<String, u32>,

    #[serde(default)]
    pub shipping_taxable: bool,
}

impl FallbackSettings {
    pub fn calculator(&self) -> RateTableCalculator {
        self.region_rates.iter().fold(
            RateTableCalculator::new(TaxRate::from_bps(self.default_rate_bps))
                .with_shipping_taxable(self.shipping_taxable),
            |calc, (region, bps)| calc.with_region_rate(region.as_str(), TaxRate::from_bps(*bps)),
        )
    }
}

// =============================================================================
// Logging Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// When off, nothing is logged under the `taxcloud` target.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive for the `taxcloud` target.
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_true() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            enabled: true,
            level: default_level(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete integration configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaxCloudConfig {
    #[serde(default)]
    pub settings: IntegrationSettings,

    /// Store address every shipment leaves from.
    #[serde(default)]
    pub origin: Address,

    #[serde(default)]
    pub service: ServiceSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub fallback: FallbackSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl TaxCloudConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (taxcloud.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ClientResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(target: "taxcloud", ?path, "Loading TaxCloud config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(target: "taxcloud", ?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!(target: "taxcloud", "Failed to load TaxCloud config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ClientResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ClientError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(target: "taxcloud", ?path, "TaxCloud config saved");
        Ok(())
    }

    /// Validates the configuration.
    ///
    /// Credentials are only required while the integration is enabled.
    pub fn validate(&self) -> ClientResult<()> {
        if self.settings.enabled {
            if self.settings.api_id.trim().is_empty() {
                return Err(ClientError::InvalidConfig(
                    "api_id is required when the integration is enabled".into(),
                ));
            }
            if self.settings.api_key.trim().is_empty() {
                return Err(ClientError::InvalidConfig(
                    "api_key is required when the integration is enabled".into(),
                ));
            }
        }

        validate_tic("default_tic", &self.settings.default_tic)
            .map_err(|e| ClientError::InvalidConfig(e.to_string()))?;
        validate_tic("shipping_tic", &self.settings.shipping_tic)
            .map_err(|e| ClientError::InvalidConfig(e.to_string()))?;

        let url = url::Url::parse(&self.service.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ClientError::InvalidUrl(format!(
                "Service URL must start with http:// or https://, got: {}",
                self.service.base_url
            )));
        }

        if self.service.timeout_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.cache.backend == CacheBackend::Memory && self.cache.memory_capacity == 0 {
            return Err(ClientError::InvalidConfig(
                "memory_capacity must be greater than 0".into(),
            ));
        }

        if self.cache.backend == CacheBackend::Redis && self.cache.redis_url.is_none() {
            return Err(ClientError::InvalidConfig(
                "redis_url is required for the redis cache backend".into(),
            ));
        }

        validate_rate_bps("default_rate_bps", self.fallback.default_rate_bps)
            .map_err(|e| ClientError::InvalidConfig(e.to_string()))?;
        for (region, bps) in &self.fallback.region_rates {
            validate_rate_bps(&format!("region_rates.{region}"), *bps)
                .map_err(|e| ClientError::InvalidConfig(e.to_string()))?;
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("TAXCLOUD_API_ID") {
            debug!(target: "taxcloud", "Overriding API id from environment");
            self.settings.api_id = id;
        }

        if let Ok(key) = std::env::var("TAXCLOUD_API_KEY") {
            self.settings.api_key = key;
        }

        if let Ok(enabled) = std::env::var("TAXCLOUD_ENABLED") {
            match parse_bool(&enabled) {
                Some(b) => self.settings.enabled = b,
                None => warn!(target: "taxcloud", value = %enabled, "Ignoring TAXCLOUD_ENABLED"),
            }
        }

        if let Ok(url) = std::env::var("TAXCLOUD_BASE_URL") {
            debug!(target: "taxcloud", url = %url, "Overriding service URL from environment");
            self.service.base_url = url;
        }

        if let Ok(lifetime) = std::env::var("TAXCLOUD_CACHE_LIFETIME") {
            if let Ok(secs) = lifetime.parse::<u64>() {
                self.settings.cache_lifetime_secs = secs;
            }
        }

        if let Ok(trigger) = std::env::var("TAXCLOUD_CAPTURE_TRIGGER") {
            match trigger.parse() {
                Ok(parsed) => self.settings.capture_trigger = parsed,
                Err(e) => warn!(target: "taxcloud", "{}", e),
            }
        }

        if let Ok(url) = std::env::var("TAXCLOUD_REDIS_URL") {
            self.cache.backend = CacheBackend::Redis;
            self.cache.redis_url = Some(url);
        }

        if let Ok(logging) = std::env::var("TAXCLOUD_LOGGING") {
            if let Some(b) = parse_bool(&logging) {
                self.logging.enabled = b;
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("net", "taxcloud", "checkout")
            .map(|dirs| dirs.config_dir().join("taxcloud.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Cache lifetime, `None` when caching is disabled.
    pub fn cache_lifetime(&self) -> Option<Duration> {
        match self.settings.cache_lifetime_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
