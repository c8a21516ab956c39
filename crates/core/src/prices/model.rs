use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The latest stored price for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPrice {
    pub symbol: String,
    pub price: Decimal,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub currency: Option<String>,
    /// Provider timestamp of the stored price
    pub observed_at: DateTime<Utc>,
    pub source: String,
    /// Staleness marker; advanced on every successful fetch
    pub last_fetched_at: DateTime<Utc>,
}

/// What `upsert_current` did with an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Price fields were written.
    Applied,
    /// A newer observation was already stored; only `last_fetched_at` moved.
    KeptNewer,
}

/// A tracked symbol. Managed outside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchListEntry {
    pub symbol: String,
    /// Lower runs first
    pub priority: i32,
    pub enabled: bool,
}

impl WatchListEntry {
    pub fn new(symbol: &str, priority: i32) -> Self {
        Self {
            symbol: symbol.to_string(),
            priority,
            enabled: true,
        }
    }
}
