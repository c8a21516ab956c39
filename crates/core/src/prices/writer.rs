//! Persistence writer.
//!
//! Wraps a [`PriceStore`] for the refresh and backfill runs. Errors are logged
//! here and returned; callers downgrade them to per-symbol outcomes.

use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use log::{debug, error};

use quotewarden_market_data::{HistoricalPoint, PriceObservation};

use super::model::UpsertOutcome;
use super::store::PriceStore;
use crate::errors::Result;
use crate::utils::time_utils::market_date_from_utc;

#[derive(Clone)]
pub struct PersistenceWriter {
    store: Arc<dyn PriceStore>,
}

impl PersistenceWriter {
    pub fn new(store: Arc<dyn PriceStore>) -> Self {
        Self { store }
    }

    /// Store a fetched observation: the current price plus its daily history point,
    /// filed under the observation's date in `market_tz`.
    /// Nothing reaches history when the stored price is newer.
    pub async fn record_fetch(
        &self,
        observation: &PriceObservation,
        market_tz: Tz,
    ) -> Result<UpsertOutcome> {
        let outcome = self.upsert_current(observation).await?;
        if outcome != UpsertOutcome::KeptNewer {
            let date = market_date_from_utc(observation.timestamp, market_tz);
            self.append_history(&[observation.to_daily_point_on(date)]).await?;
        }
        Ok(outcome)
    }

    pub async fn upsert_current(&self, observation: &PriceObservation) -> Result<UpsertOutcome> {
        match self.store.upsert_current(observation, Utc::now()).await {
            Ok(UpsertOutcome::KeptNewer) => {
                debug!(
                    "Kept newer stored price for {}; observation at {} is older",
                    observation.symbol, observation.timestamp
                );
                Ok(UpsertOutcome::KeptNewer)
            }
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!("Failed to store current price for {}: {}", observation.symbol, e);
                Err(e)
            }
        }
    }

    pub async fn append_history(&self, points: &[HistoricalPoint]) -> Result<usize> {
        if points.is_empty() {
            return Ok(0);
        }
        self.store.append_history(points).await.map_err(|e| {
            error!(
                "Failed to append {} history point(s) for {}: {}",
                points.len(),
                points[0].symbol,
                e
            );
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockPriceStore;
    use crate::utils::time_utils::DEFAULT_MARKET_TZ;
    use chrono::{Duration, NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_record_fetch_writes_current_and_history() {
        let store = MockPriceStore::new();
        let writer = PersistenceWriter::new(Arc::new(store.clone()));
        let ts = Utc.with_ymd_and_hms(2026, 2, 13, 21, 0, 0).unwrap();
        let obs = PriceObservation::new("AAPL", dec!(187.32), ts, "FINNHUB")
            .with_range(Some(dec!(188)), Some(dec!(186)));

        let outcome = writer.record_fetch(&obs, DEFAULT_MARKET_TZ).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Applied);

        let current = store.get_current("AAPL").unwrap().unwrap();
        assert_eq!(current.price, dec!(187.32));
        let history = store.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].close, dec!(187.32));
        assert_eq!(history[0].date, ts.date_naive());
    }

    #[tokio::test]
    async fn test_older_observation_keeps_newer_price() {
        let store = MockPriceStore::new();
        let writer = PersistenceWriter::new(Arc::new(store.clone()));
        let now = Utc::now();

        writer
            .upsert_current(&PriceObservation::new("MSFT", dec!(410), now, "YAHOO"))
            .await
            .unwrap();
        let outcome = writer
            .upsert_current(&PriceObservation::new(
                "MSFT",
                dec!(400),
                now - Duration::hours(1),
                "FINNHUB",
            ))
            .await
            .unwrap();

        assert_eq!(outcome, UpsertOutcome::KeptNewer);
        let current = store.get_current("MSFT").unwrap().unwrap();
        assert_eq!(current.price, dec!(410));
        assert_eq!(current.source, "YAHOO");
    }

    #[tokio::test]
    async fn test_late_same_day_observation_leaves_history_alone() {
        let store = MockPriceStore::new();
        let writer = PersistenceWriter::new(Arc::new(store.clone()));
        let close = Utc.with_ymd_and_hms(2026, 2, 13, 21, 0, 0).unwrap();
        let midday = Utc.with_ymd_and_hms(2026, 2, 13, 15, 0, 0).unwrap();

        writer
            .record_fetch(
                &PriceObservation::new("SPY", dec!(588.00), close, "YAHOO"),
                DEFAULT_MARKET_TZ,
            )
            .await
            .unwrap();
        let outcome = writer
            .record_fetch(
                &PriceObservation::new("SPY", dec!(587.42), midday, "FINNHUB"),
                DEFAULT_MARKET_TZ,
            )
            .await
            .unwrap();

        assert_eq!(outcome, UpsertOutcome::KeptNewer);
        assert_eq!(store.get_current("SPY").unwrap().unwrap().price, dec!(588.00));
        let history = store.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].close, dec!(588.00));
    }

    #[tokio::test]
    async fn test_after_hours_observation_files_under_market_date() {
        let store = MockPriceStore::new();
        let writer = PersistenceWriter::new(Arc::new(store.clone()));
        // 01:30 UTC Saturday is Friday evening in New York.
        let ts = Utc.with_ymd_and_hms(2026, 2, 14, 1, 30, 0).unwrap();
        let obs = PriceObservation::new("AAPL", dec!(190.10), ts, "YAHOO");

        writer.record_fetch(&obs, DEFAULT_MARKET_TZ).await.unwrap();
        assert_eq!(store.history()[0].date, NaiveDate::from_ymd_opt(2026, 2, 13).unwrap());

        let utc_store = MockPriceStore::new();
        PersistenceWriter::new(Arc::new(utc_store.clone()))
            .record_fetch(&obs, chrono_tz::UTC)
            .await
            .unwrap();
        assert_eq!(utc_store.history()[0].date, NaiveDate::from_ymd_opt(2026, 2, 14).unwrap());
    }

    #[tokio::test]
    async fn test_store_failure_is_returned() {
        let store = MockPriceStore::new();
        store.set_fail_on_write(true);
        let writer = PersistenceWriter::new(Arc::new(store));
        let obs = PriceObservation::new("AAPL", dec!(1), Utc::now(), "YAHOO");

        assert!(writer.record_fetch(&obs, DEFAULT_MARKET_TZ).await.is_err());
    }
}
