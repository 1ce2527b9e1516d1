//! # Storefront Configuration
//!
//! Tunables for pricing, retries and pagination.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     STOREFRONT_TAX_RATE_BPS=825                                        │
//! │     STOREFRONT_MAX_RETRIES=5                                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/storefront/storefront.toml (Linux)                       │
//! │     ~/Library/Application Support/com.storefront.app/storefront.toml   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     6% tax, USD, 3 retries from 1s, 10 items per page                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The config is an ordinary value handed to whatever needs it; nothing
//! here is global.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use storefront_core::validation::{validate_currency, validate_tax_rate};
use storefront_core::{CartPricingAggregator, TaxRate};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::pagination::LoaderOptions;
use crate::retry::RetryConfig;

// =============================================================================
// Pricing Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingSettings {
    /// Sales tax in basis points (600 = 6%).
    #[serde(default = "default_tax_rate_bps")]
    pub tax_rate_bps: u32,

    /// ISO 4217 code every cart line must use.
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_tax_rate_bps() -> u32 {
    600
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Default for PricingSettings {
    fn default() -> Self {
        PricingSettings {
            tax_rate_bps: default_tax_rate_bps(),
            currency: default_currency(),
        }
    }
}

impl PricingSettings {
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }

    pub fn aggregator(&self) -> CartPricingAggregator {
        CartPricingAggregator::new(self.tax_rate())
    }
}

// =============================================================================
// Retry Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry (milliseconds).
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    #[serde(default = "default_exponential")]
    pub exponential: bool,

    /// Cap on a single delay (milliseconds). Unbounded if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
}

fn default_max_retries() -> u32 {
    3
}
fn default_base_delay() -> u64 {
    1000
}
fn default_exponential() -> bool {
    true
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay(),
            exponential: default_exponential(),
            max_delay_ms: None,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        RetryConfig {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            exponential: settings.exponential,
            max_delay: settings.max_delay_ms.map(Duration::from_millis),
        }
    }
}

// =============================================================================
// Pagination Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationSettings {
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_initial_page")]
    pub initial_page: u32,
}

fn default_page_size() -> u32 {
    10
}
fn default_initial_page() -> u32 {
    1
}

impl Default for PaginationSettings {
    fn default() -> Self {
        PaginationSettings {
            page_size: default_page_size(),
            initial_page: default_initial_page(),
        }
    }
}

impl From<&PaginationSettings> for LoaderOptions {
    fn from(settings: &PaginationSettings) -> Self {
        LoaderOptions {
            page_size: settings.page_size,
            initial_page: settings.initial_page,
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete storefront configuration.
///
/// ## Example Config File
/// ```toml
/// [pricing]
/// tax_rate_bps = 600
/// currency = "USD"
///
/// [retry]
/// max_retries = 3
/// base_delay_ms = 1000
/// exponential = true
/// max_delay_ms = 8000
///
/// [pagination]
/// page_size = 10
/// initial_page = 1
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorefrontConfig {
    #[serde(default)]
    pub pricing: PricingSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub pagination: PaginationSettings,
}

impl StorefrontConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (storefront.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading storefront config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load storefront config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::SaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        info!(?path, "Storefront config saved");
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        validate_tax_rate(self.pricing.tax_rate())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        validate_currency(&self.pricing.currency)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.retry.base_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "base_delay_ms must be greater than 0".into(),
            ));
        }
        if let Some(max) = self.retry.max_delay_ms {
            if max < self.retry.base_delay_ms {
                return Err(ConfigError::Invalid(format!(
                    "max_delay_ms ({}) is below base_delay_ms ({})",
                    max, self.retry.base_delay_ms
                )));
            }
        }

        if self.pagination.page_size == 0 {
            return Err(ConfigError::Invalid(
                "page_size must be greater than 0".into(),
            ));
        }
        if self.pagination.initial_page == 0 {
            return Err(ConfigError::Invalid("initial_page starts at 1".into()));
        }

        Ok(())
    }

    /// Applies `STOREFRONT_*` overrides read through `lookup`.
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bps) = parse_var::<u32>(&lookup, "STOREFRONT_TAX_RATE_BPS") {
            debug!(tax_rate_bps = bps, "Overriding tax rate from environment");
            self.pricing.tax_rate_bps = bps;
        }

        if let Some(currency) = lookup("STOREFRONT_CURRENCY") {
            debug!(currency = %currency, "Overriding currency from environment");
            self.pricing.currency = currency;
        }

        if let Some(retries) = parse_var::<u32>(&lookup, "STOREFRONT_MAX_RETRIES") {
            self.retry.max_retries = retries;
        }

        if let Some(delay) = parse_var::<u64>(&lookup, "STOREFRONT_BASE_DELAY_MS") {
            self.retry.base_delay_ms = delay;
        }

        if let Some(size) = parse_var::<u32>(&lookup, "STOREFRONT_PAGE_SIZE") {
            self.pagination.page_size = size;
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "storefront", "app")
            .map(|dirs| dirs.config_dir().join("storefront.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::from(&self.retry)
    }

    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions::from(&self.pagination)
    }

    pub fn tax_rate(&self) -> TaxRate {
        self.pricing.tax_rate()
    }
}

fn parse_var<V: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<V> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable override");
            None
        }
    }
}
