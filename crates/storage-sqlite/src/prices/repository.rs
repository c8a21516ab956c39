use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

use super::model::{CurrentPriceDB, PriceHistoryDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::IntoCore;
use crate::schema::current_prices::dsl as current_dsl;
use crate::schema::price_history::dsl as history_dsl;
use crate::utils::{chunk_for_sqlite, decode_timestamp, encode_date, encode_timestamp};
use quotewarden_core::prices::{CurrentPrice, PriceStore, UpsertOutcome};
use quotewarden_core::Result;
use quotewarden_market_data::{HistoricalPoint, PriceObservation};

const HISTORY_WRITE_CHUNK: usize = 1_000;

pub struct PriceRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl PriceRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

/// Writes `row` unless the stored observation is newer, in which case only the
/// fetch marker moves. Runs inside the writer's transaction.
fn upsert_monotonic(conn: &mut SqliteConnection, row: CurrentPriceDB) -> Result<UpsertOutcome> {
    let stored_observed_at: Option<String> = current_dsl::current_prices
        .find(&row.symbol)
        .select(current_dsl::observed_at)
        .first::<String>(conn)
        .optional()
        .into_core()?;

    let incoming = decode_timestamp("observed_at", &row.observed_at)?;
    let stored = stored_observed_at
        .as_deref()
        .map(|raw| decode_timestamp("observed_at", raw))
        .transpose()?;

    if stored.is_some_and(|stored| stored > incoming) {
        debug!(
            "Keeping newer stored price for {}; only advancing last_fetched_at",
            row.symbol
        );
        diesel::update(current_dsl::current_prices.find(&row.symbol))
            .set((
                current_dsl::last_fetched_at.eq(&row.last_fetched_at),
                current_dsl::updated_at.eq(&row.updated_at),
            ))
            .execute(conn)
            .into_core()?;
        return Ok(UpsertOutcome::KeptNewer);
    }

    diesel::replace_into(current_dsl::current_prices)
        .values(&row)
        .execute(conn)
        .into_core()?;
    Ok(UpsertOutcome::Applied)
}

#[async_trait]
impl PriceStore for PriceRepository {
    async fn upsert_current(
        &self,
        observation: &PriceObservation,
        fetched_at: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        let row = CurrentPriceDB::from_observation(observation, fetched_at);
        self.writer
            .exec(move |conn: &mut SqliteConnection| upsert_monotonic(conn, row))
            .await
    }

    async fn append_history(&self, points: &[HistoricalPoint]) -> Result<usize> {
        if points.is_empty() {
            return Ok(0);
        }
        let rows: Vec<PriceHistoryDB> = points.iter().map(PriceHistoryDB::from).collect();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                for chunk in rows.chunks(HISTORY_WRITE_CHUNK) {
                    diesel::replace_into(history_dsl::price_history)
                        .values(chunk)
                        .execute(conn)
                        .into_core()?;
                }
                Ok(rows.len())
            })
            .await
    }

    fn get_current(&self, symbol: &str) -> Result<Option<CurrentPrice>> {
        let mut conn = get_connection(&self.pool)?;
        let row = current_dsl::current_prices
            .find(symbol)
            .select(CurrentPriceDB::as_select())
            .first::<CurrentPriceDB>(&mut conn)
            .optional()
            .into_core()?;

        Ok(row.map(CurrentPrice::try_from).transpose()?)
    }

    fn last_fetched(&self, symbols: &[String]) -> Result<HashMap<String, DateTime<Utc>>> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }
        let mut conn = get_connection(&self.pool)?;
        let mut result = HashMap::with_capacity(symbols.len());

        for chunk in chunk_for_sqlite(symbols) {
            let rows: Vec<(String, String)> = current_dsl::current_prices
                .filter(current_dsl::symbol.eq_any(chunk))
                .select((current_dsl::symbol, current_dsl::last_fetched_at))
                .load::<(String, String)>(&mut conn)
                .into_core()?;

            for (symbol, raw) in rows {
                let fetched_at = decode_timestamp("last_fetched_at", &raw)?;
                result.insert(symbol, fetched_at);
            }
        }

        Ok(result)
    }

    fn history_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalPoint>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = history_dsl::price_history
            .filter(history_dsl::symbol.eq(symbol))
            .filter(history_dsl::price_date.ge(encode_date(start)))
            .filter(history_dsl::price_date.le(encode_date(end)))
            .order(history_dsl::price_date.asc())
            .select(PriceHistoryDB::as_select())
            .load::<PriceHistoryDB>(&mut conn)
            .into_core()?;

        rows.into_iter()
            .map(|row| HistoricalPoint::try_from(row).map_err(quotewarden_core::Error::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::open_test_db;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn observation(symbol: &str, price: rust_decimal::Decimal, at: DateTime<Utc>) -> PriceObservation {
        PriceObservation::new(symbol, price, at, "YAHOO")
    }

    #[tokio::test]
    async fn test_upsert_then_read_current() {
        let db = open_test_db();
        let repo = PriceRepository::new(db.pool.clone(), db.writer.clone());
        let observed = Utc.with_ymd_and_hms(2026, 2, 13, 21, 0, 0).unwrap();
        let fetched = Utc.with_ymd_and_hms(2026, 2, 13, 21, 5, 0).unwrap();

        let obs = observation("AAPL", dec!(190.25), observed)
            .with_range(Some(dec!(191)), Some(dec!(188.5)))
            .with_currency(Some("USD".to_string()));
        let outcome = repo.upsert_current(&obs, fetched).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Applied);

        let current = repo.get_current("AAPL").unwrap().unwrap();
        assert_eq!(current.price, dec!(190.25));
        assert_eq!(current.high, Some(dec!(191)));
        assert_eq!(current.open, None);
        assert_eq!(current.currency.as_deref(), Some("USD"));
        assert_eq!(current.observed_at, observed);
        assert_eq!(current.last_fetched_at, fetched);
        assert!(repo.get_current("MSFT").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_older_observation_never_replaces_newer() {
        let db = open_test_db();
        let repo = PriceRepository::new(db.pool.clone(), db.writer.clone());
        let newer = Utc.with_ymd_and_hms(2026, 2, 13, 21, 0, 0).unwrap();
        let older = Utc.with_ymd_and_hms(2026, 2, 12, 21, 0, 0).unwrap();
        let first_fetch = Utc.with_ymd_and_hms(2026, 2, 13, 22, 0, 0).unwrap();
        let second_fetch = Utc.with_ymd_and_hms(2026, 2, 13, 22, 30, 0).unwrap();

        repo.upsert_current(&observation("MSFT", dec!(410), newer), first_fetch)
            .await
            .unwrap();
        let outcome = repo
            .upsert_current(&observation("MSFT", dec!(399), older), second_fetch)
            .await
            .unwrap();

        assert_eq!(outcome, UpsertOutcome::KeptNewer);
        let current = repo.get_current("MSFT").unwrap().unwrap();
        assert_eq!(current.price, dec!(410));
        assert_eq!(current.observed_at, newer);
        assert_eq!(current.last_fetched_at, second_fetch);
    }

    #[tokio::test]
    async fn test_same_day_refetch_keeps_one_history_record() {
        let db = open_test_db();
        let repo = PriceRepository::new(db.pool.clone(), db.writer.clone());
        let day = NaiveDate::from_ymd_opt(2026, 2, 14).unwrap();
        let morning = Utc.with_ymd_and_hms(2026, 2, 14, 15, 0, 0).unwrap();
        let close = Utc.with_ymd_and_hms(2026, 2, 14, 21, 0, 0).unwrap();

        for (price, at) in [(dec!(587.42), morning), (dec!(588.00), close)] {
            let obs = observation("SPY", price, at);
            repo.upsert_current(&obs, at).await.unwrap();
            repo.append_history(&[obs.to_daily_point()]).await.unwrap();
        }

        let history = repo.history_range("SPY", day, day).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].close, dec!(588.00));
        assert_eq!(repo.get_current("SPY").unwrap().unwrap().price, dec!(588.00));
    }

    #[tokio::test]
    async fn test_history_range_is_ascending_and_bounded() {
        let db = open_test_db();
        let repo = PriceRepository::new(db.pool.clone(), db.writer.clone());
        let points: Vec<HistoricalPoint> = (10..=14)
            .rev()
            .map(|d| {
                HistoricalPoint::new(
                    "QQQ",
                    NaiveDate::from_ymd_opt(2026, 2, d).unwrap(),
                    rust_decimal::Decimal::from(500 + d),
                    "YAHOO",
                )
            })
            .collect();

        assert_eq!(repo.append_history(&points).await.unwrap(), 5);
        assert_eq!(repo.append_history(&[]).await.unwrap(), 0);

        let range = repo
            .history_range(
                "QQQ",
                NaiveDate::from_ymd_opt(2026, 2, 11).unwrap(),
                NaiveDate::from_ymd_opt(2026, 2, 13).unwrap(),
            )
            .unwrap();
        let days: Vec<u32> = range.iter().map(|p| chrono::Datelike::day(&p.date)).collect();
        assert_eq!(days, vec![11, 12, 13]);
    }

    #[tokio::test]
    async fn test_last_fetched_omits_unknown_symbols() {
        let db = open_test_db();
        let repo = PriceRepository::new(db.pool.clone(), db.writer.clone());
        let fetched = Utc.with_ymd_and_hms(2026, 2, 13, 21, 0, 0).unwrap();
        repo.upsert_current(&observation("AAPL", dec!(190), fetched), fetched)
            .await
            .unwrap();

        let map = repo
            .last_fetched(&["AAPL".to_string(), "NVDA".to_string()])
            .unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("AAPL"), Some(&fetched));
        assert!(repo.last_fetched(&[]).unwrap().is_empty());
    }
}
