use crate::core::{Result, StoreError};
use crate::entitlement::{Quotas, SubscriptionTier};
use anyhow::Context;
use std::collections::HashMap;
use std::path::PathBuf;

/// Store configuration
///
/// Builder-style setters; `from_env` reads the `TIERSTORE_*` variables with
/// sensible defaults for local development.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory for the local cache and the subscription journal
    pub data_dir: PathBuf,

    /// Page size used by the facade's `load` when the caller does not pick one
    pub default_page_size: usize,

    /// Per-tier quota replacements for the built-in entitlement table
    pub quota_overrides: HashMap<SubscriptionTier, Quotas>,
}

impl StoreConfig {
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
            default_page_size: 20,
            quota_overrides: HashMap::new(),
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let data_dir = PathBuf::from(env_string("TIERSTORE_DATA_DIR", ".tierstore"));
        let default_page_size = env_string("TIERSTORE_PAGE_SIZE", "20")
            .parse::<usize>()
            .context("TIERSTORE_PAGE_SIZE must be a positive integer")?;

        Ok(Self {
            data_dir,
            default_page_size,
            quota_overrides: HashMap::new(),
        })
    }

    /// Set the default page size
    pub fn default_page_size(mut self, page_size: usize) -> Self {
        self.default_page_size = page_size;
        self
    }

    /// Replace the quota row for one tier
    pub fn quota_override(mut self, tier: SubscriptionTier, quotas: Quotas) -> Self {
        self.quota_overrides.insert(tier, quotas);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.default_page_size == 0 {
            return Err(StoreError::Config(
                "default_page_size must be > 0".to_string(),
            ));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(StoreError::Config("data_dir cannot be empty".to_string()));
        }
        Ok(())
    }

    pub(crate) fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub(crate) fn subscriptions_dir(&self) -> PathBuf {
        self.data_dir.join("subscriptions")
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
