use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::PricingConfig;
use crate::errors::ServiceError;

/// Pricing-category metadata for one activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityTypeInfo {
    /// Tier label shown on order summaries, e.g. "Photo" or "Cle USB".
    pub display_name: String,
    pub unit_price: Decimal,
}

/// Unit-price and pricing-type lookup by activity key. The gallery side
/// of the application owns the real catalog; the order core only depends
/// on this seam.
pub trait ActivityCatalog: Send + Sync {
    fn unit_price(&self, activity_key: &str) -> Decimal;
    fn type_info(&self, activity_key: &str) -> ActivityTypeInfo;
}

/// Catalog backed by the pricing table in [`crate::config::AppConfig`].
/// Activities without an explicit entry fall back to the default price.
#[derive(Debug, Clone)]
pub struct ConfigCatalog {
    pricing: PricingConfig,
}

impl ConfigCatalog {
    pub fn new(pricing: PricingConfig) -> Self {
        Self { pricing }
    }
}

impl ActivityCatalog for ConfigCatalog {
    fn unit_price(&self, activity_key: &str) -> Decimal {
        self.pricing
            .activities
            .get(activity_key)
            .map(|entry| entry.price)
            .unwrap_or(self.pricing.default_price)
    }

    fn type_info(&self, activity_key: &str) -> ActivityTypeInfo {
        match self.pricing.activities.get(activity_key) {
            Some(entry) => ActivityTypeInfo {
                display_name: entry.display_name.clone(),
                unit_price: entry.price,
            },
            None => ActivityTypeInfo {
                display_name: "Photo".to_string(),
                unit_price: self.pricing.default_price,
            },
        }
    }
}

/// Cleanup of abandoned temp carts: `(directory, max_age_hours, force)`
/// returning the number of deleted files.
pub trait TempOrderCleaner: Send + Sync {
    fn cleanup(
        &self,
        directory: &Path,
        max_age_hours: u64,
        force: bool,
    ) -> Result<usize, ServiceError>;
}

/// File-age based cleaner: deletes regular files older than the age
/// limit, or all of them when forced. A missing directory counts as
/// nothing to clean.
#[derive(Debug, Default, Clone)]
pub struct FileAgeCleaner;

impl TempOrderCleaner for FileAgeCleaner {
    fn cleanup(
        &self,
        directory: &Path,
        max_age_hours: u64,
        force: bool,
    ) -> Result<usize, ServiceError> {
        if !directory.is_dir() {
            return Ok(0);
        }
        let max_age = Duration::from_secs(max_age_hours * 3600);
        let now = SystemTime::now();
        let mut deleted = 0usize;

        for entry in fs::read_dir(directory)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let expired = match entry.metadata().and_then(|m| m.modified()) {
                Ok(modified) => now
                    .duration_since(modified)
                    .map(|age| age > max_age)
                    .unwrap_or(false),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Could not read mtime, leaving file");
                    false
                }
            };
            if force || expired {
                fs::remove_file(&path)?;
                deleted += 1;
            }
        }
        if deleted > 0 {
            info!(directory = %directory.display(), deleted, "Cleaned up temp orders");
        }
        Ok(deleted)
    }
}
