use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::Result;

/// One row of the config collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigEntry {
    pub config_type: String,
    pub config_key: String,
    pub value: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ConfigEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Storage interface for the config collection.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    fn get_config(&self, config_type: &str, config_key: &str) -> Result<Option<ConfigEntry>>;

    async fn put_config(&self, entry: &ConfigEntry) -> Result<()>;
}
