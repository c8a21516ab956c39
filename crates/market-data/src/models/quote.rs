use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single price observation returned by a provider's latest-quote endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceObservation {
    /// Canonical (uppercase) ticker
    pub symbol: String,

    /// Current/last traded price (required)
    pub price: Decimal,

    /// Session open price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,

    /// Quote currency when the provider reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    /// When the provider says the price was observed
    pub timestamp: DateTime<Utc>,

    /// Provider id (YAHOO, FINNHUB, ...)
    pub source: String,
}

impl PriceObservation {
    /// Create an observation with only the required fields
    pub fn new(symbol: &str, price: Decimal, timestamp: DateTime<Utc>, source: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            price,
            open: None,
            high: None,
            low: None,
            volume: None,
            currency: None,
            timestamp,
            source: source.to_string(),
        }
    }

    pub fn with_open(mut self, open: Option<Decimal>) -> Self {
        self.open = open;
        self
    }

    pub fn with_range(mut self, high: Option<Decimal>, low: Option<Decimal>) -> Self {
        self.high = high;
        self.low = low;
        self
    }

    pub fn with_volume(mut self, volume: Option<Decimal>) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_currency(mut self, currency: Option<String>) -> Self {
        self.currency = currency;
        self
    }

    /// An observation is valid only when it carries a strictly positive price.
    pub fn is_valid(&self) -> bool {
        self.price > Decimal::ZERO
    }

    /// Daily point derived from this observation, keyed by the observation's UTC date.
    pub fn to_daily_point(&self) -> HistoricalPoint {
        self.to_daily_point_on(self.timestamp.date_naive())
    }

    /// Daily point filed under `date`, usually the market-local trading date.
    pub fn to_daily_point_on(&self, date: NaiveDate) -> HistoricalPoint {
        HistoricalPoint {
            symbol: self.symbol.clone(),
            date,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.price,
            adj_close: None,
            volume: self.volume,
            source: self.source.clone(),
        }
    }
}

/// One daily OHLCV bar. Unique per `(symbol, date)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalPoint {
    pub symbol: String,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<Decimal>,
    pub close: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adj_close: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,
    pub source: String,
}

impl HistoricalPoint {
    pub fn new(symbol: &str, date: NaiveDate, close: Decimal, source: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            date,
            open: None,
            high: None,
            low: None,
            close,
            adj_close: None,
            volume: None,
            source: source.to_string(),
        }
    }

    /// Create a full OHLCV point
    #[allow(clippy::too_many_arguments)]
    pub fn ohlcv(
        symbol: &str,
        date: NaiveDate,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
        source: &str,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            date,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close,
            adj_close: None,
            volume: Some(volume),
            source: source.to_string(),
        }
    }
}
