//! Price storage traits.
//!
//! These traits abstract the persistence layer; the SQLite implementation lives
//! in the storage crate and tests use in-memory mocks.
//!
//! # Method Naming Convention
//!
//! - Async methods mutate and run through the single writer
//! - Sync methods are reads served from the connection pool

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use quotewarden_market_data::{HistoricalPoint, PriceObservation};

use super::model::{CurrentPrice, UpsertOutcome, WatchListEntry};
use crate::errors::Result;

/// Storage interface for current prices and daily history.
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Writes the latest price for `observation.symbol`.
    ///
    /// Never replaces a stored price with an older observation; `last_fetched_at`
    /// is set to `fetched_at` in every case.
    async fn upsert_current(
        &self,
        observation: &PriceObservation,
        fetched_at: DateTime<Utc>,
    ) -> Result<UpsertOutcome>;

    /// Inserts or replaces daily points keyed by `(symbol, date)`.
    ///
    /// Returns the number of points written.
    async fn append_history(&self, points: &[HistoricalPoint]) -> Result<usize>;

    fn get_current(&self, symbol: &str) -> Result<Option<CurrentPrice>>;

    /// `last_fetched_at` for the given symbols; symbols never fetched are absent.
    fn last_fetched(&self, symbols: &[String]) -> Result<HashMap<String, DateTime<Utc>>>;

    /// Daily points for `symbol` within `start..=end`, ascending by date.
    fn history_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalPoint>>;
}

/// Source of the tracked symbol set.
#[async_trait]
pub trait WatchListStore: Send + Sync {
    /// Enabled entries ordered by priority, then symbol.
    fn list_enabled(&self) -> Result<Vec<WatchListEntry>>;

    async fn upsert_entry(&self, entry: &WatchListEntry) -> Result<()>;
}
