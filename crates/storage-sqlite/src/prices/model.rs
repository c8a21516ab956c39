//! Database models for current prices and daily history.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::StorageError;
use crate::utils::{
    decode_date, decode_decimal, decode_optional_decimal, decode_timestamp, encode_date,
    encode_timestamp,
};
use quotewarden_core::prices::CurrentPrice;
use quotewarden_market_data::{HistoricalPoint, PriceObservation};

/// Row of `current_prices`, one per symbol.
#[derive(
    Queryable, Identifiable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq,
    Serialize, Deserialize,
)]
#[diesel(table_name = crate::schema::current_prices)]
#[diesel(primary_key(symbol))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct CurrentPriceDB {
    pub symbol: String,
    pub price: String,
    pub open_price: Option<String>,
    pub high_price: Option<String>,
    pub low_price: Option<String>,
    pub volume: Option<String>,
    pub currency: Option<String>,
    pub observed_at: String,
    pub source: String,
    pub last_fetched_at: String,
    pub updated_at: String,
}

impl CurrentPriceDB {
    pub fn from_observation(observation: &PriceObservation, fetched_at: DateTime<Utc>) -> Self {
        Self {
            symbol: observation.symbol.clone(),
            price: observation.price.to_string(),
            open_price: observation.open.map(|d| d.to_string()),
            high_price: observation.high.map(|d| d.to_string()),
            low_price: observation.low.map(|d| d.to_string()),
            volume: observation.volume.map(|d| d.to_string()),
            currency: observation.currency.clone(),
            observed_at: encode_timestamp(observation.timestamp),
            source: observation.source.clone(),
            last_fetched_at: encode_timestamp(fetched_at),
            updated_at: encode_timestamp(Utc::now()),
        }
    }
}

impl TryFrom<CurrentPriceDB> for CurrentPrice {
    type Error = StorageError;

    fn try_from(row: CurrentPriceDB) -> Result<Self, Self::Error> {
        Ok(CurrentPrice {
            price: decode_decimal("price", &row.price)?,
            open: decode_optional_decimal("open_price", row.open_price.as_deref())?,
            high: decode_optional_decimal("high_price", row.high_price.as_deref())?,
            low: decode_optional_decimal("low_price", row.low_price.as_deref())?,
            volume: decode_optional_decimal("volume", row.volume.as_deref())?,
            observed_at: decode_timestamp("observed_at", &row.observed_at)?,
            last_fetched_at: decode_timestamp("last_fetched_at", &row.last_fetched_at)?,
            symbol: row.symbol,
            currency: row.currency,
            source: row.source,
        })
    }
}

/// Row of `price_history`, unique per `(symbol, price_date)`.
#[derive(
    Queryable, Identifiable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq,
    Serialize, Deserialize,
)]
#[diesel(table_name = crate::schema::price_history)]
#[diesel(primary_key(symbol, price_date))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct PriceHistoryDB {
    pub symbol: String,
    pub price_date: String,
    pub open: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub close: String,
    pub adj_close: Option<String>,
    pub volume: Option<String>,
    pub source: String,
    pub updated_at: String,
}

impl From<&HistoricalPoint> for PriceHistoryDB {
    fn from(point: &HistoricalPoint) -> Self {
        Self {
            symbol: point.symbol.clone(),
            price_date: encode_date(point.date),
            open: point.open.map(|d| d.to_string()),
            high: point.high.map(|d| d.to_string()),
            low: point.low.map(|d| d.to_string()),
            close: point.close.to_string(),
            adj_close: point.adj_close.map(|d| d.to_string()),
            volume: point.volume.map(|d| d.to_string()),
            source: point.source.clone(),
            updated_at: encode_timestamp(Utc::now()),
        }
    }
}

impl TryFrom<PriceHistoryDB> for HistoricalPoint {
    type Error = StorageError;

    fn try_from(row: PriceHistoryDB) -> Result<Self, Self::Error> {
        Ok(HistoricalPoint {
            date: decode_date("price_date", &row.price_date)?,
            open: decode_optional_decimal("open", row.open.as_deref())?,
            high: decode_optional_decimal("high", row.high.as_deref())?,
            low: decode_optional_decimal("low", row.low.as_deref())?,
            close: decode_decimal("close", &row.close)?,
            adj_close: decode_optional_decimal("adj_close", row.adj_close.as_deref())?,
            volume: decode_optional_decimal("volume", row.volume.as_deref())?,
            symbol: row.symbol,
            source: row.source,
        })
    }
}
