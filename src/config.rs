use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::errors::ServiceError;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_ORDERS_DIR: &str = "commandes";
const DEFAULT_ARCHIVE_DIR: &str = "commandes/archives";
const DEFAULT_TEMP_ORDERS_DIR: &str = "commandes/tmp";
const DEFAULT_TEMP_ORDER_MAX_AGE_HOURS: u64 = 24;
const DEFAULT_USB_ACTIVITY_KEY: &str = "film_gala";
const DEFAULT_USB_MARKER: &str = "USB";
const CONFIG_DIR: &str = "config";

/// File names inside the orders directory. These are part of the external
/// contract with the download/preparation tooling, not configurable.
pub const LEDGER_FILE_NAME: &str = "commandes.csv";
pub const REGLEES_FILE_NAME: &str = "commandes_reglees.csv";
pub const PREPARER_FILE_NAME: &str = "commandes_a_preparer.csv";

/// Pricing entry for one activity (photo collection).
#[derive(Clone, Debug, Deserialize)]
pub struct ActivityPricing {
    /// Unit price for one photo (or one USB key) of this activity.
    pub price: Decimal,

    /// Pricing tier label shown on order summaries, e.g. "Photo" or "Cle USB".
    #[serde(default = "default_pricing_label")]
    pub display_name: String,
}

/// Pricing table: per-activity entries plus a fallback unit price for
/// activities with no explicit entry.
#[derive(Clone, Debug, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_photo_price")]
    pub default_price: Decimal,

    #[serde(default)]
    pub activities: HashMap<String, ActivityPricing>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            default_price: default_photo_price(),
            activities: HashMap::new(),
        }
    }
}

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Directory holding the order ledger and the derived export files.
    #[serde(default = "default_orders_dir")]
    pub orders_dir: PathBuf,

    /// Directory receiving timestamped backup/archive files. Created on
    /// demand by the first operation that needs it.
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,

    /// Directory holding temporary (unvalidated) cart files.
    #[serde(default = "default_temp_orders_dir")]
    pub temp_orders_dir: PathBuf,

    /// Temp carts older than this are eligible for cleanup.
    #[serde(default = "default_temp_order_max_age_hours")]
    pub temp_order_max_age_hours: u64,

    /// Activity key whose USB-media line items are tallied separately
    /// from photo prints.
    #[serde(default = "default_usb_activity_key")]
    #[validate(length(min = 1))]
    pub usb_activity_key: String,

    /// Substring of a photo name marking a USB-media line item.
    #[serde(default = "default_usb_marker")]
    #[validate(length(min = 1))]
    pub usb_marker: String,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Activity pricing table
    #[serde(default)]
    pub pricing: PricingConfig,
}

fn default_orders_dir() -> PathBuf {
    PathBuf::from(DEFAULT_ORDERS_DIR)
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from(DEFAULT_ARCHIVE_DIR)
}

fn default_temp_orders_dir() -> PathBuf {
    PathBuf::from(DEFAULT_TEMP_ORDERS_DIR)
}

fn default_temp_order_max_age_hours() -> u64 {
    DEFAULT_TEMP_ORDER_MAX_AGE_HOURS
}

fn default_usb_activity_key() -> String {
    DEFAULT_USB_ACTIVITY_KEY.to_string()
}

fn default_usb_marker() -> String {
    DEFAULT_USB_MARKER.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_pricing_label() -> String {
    "Photo".to_string()
}

fn default_photo_price() -> Decimal {
    dec!(2.00)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            orders_dir: default_orders_dir(),
            archive_dir: default_archive_dir(),
            temp_orders_dir: default_temp_orders_dir(),
            temp_order_max_age_hours: default_temp_order_max_age_hours(),
            usb_activity_key: default_usb_activity_key(),
            usb_marker: default_usb_marker(),
            environment: default_environment(),
            log_level: default_log_level(),
            pricing: PricingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from layered sources: `config/default.toml`,
    /// then `config/{APP_ENV}.toml`, then `APP_*` environment variables.
    pub fn load() -> Result<Self, ServiceError> {
        let run_env = env::var("APP_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

        let settings = Config::builder()
            .add_source(File::from(Path::new(CONFIG_DIR).join("default")).required(false))
            .add_source(File::from(Path::new(CONFIG_DIR).join(&run_env)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        info!(environment = %config.environment, orders_dir = %config.orders_dir.display(), "Configuration loaded");
        Ok(config)
    }

    /// Configuration rooted at an explicit orders directory, with every
    /// derived path underneath it. Used by tests and the CLI `--data-dir`
    /// override.
    pub fn with_orders_dir(dir: impl Into<PathBuf>) -> Self {
        let orders_dir: PathBuf = dir.into();
        Self {
            archive_dir: orders_dir.join("archives"),
            temp_orders_dir: orders_dir.join("tmp"),
            orders_dir,
            ..Self::default()
        }
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.orders_dir.join(LEDGER_FILE_NAME)
    }

    pub fn reglees_path(&self) -> PathBuf {
        self.orders_dir.join(REGLEES_FILE_NAME)
    }

    pub fn preparer_path(&self) -> PathBuf {
        self.orders_dir.join(PREPARER_FILE_NAME)
    }
}
