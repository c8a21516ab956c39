//! Yahoo Finance market data provider.
//!
//! The only keyless provider in the chain. Calls go through the
//! `yahoo_finance_api` connector, each wrapped in a per-call timeout since the
//! connector does not expose one.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::{debug, warn};
use yahoo_finance_api as yahoo;

use crate::errors::MarketDataError;
use crate::models::{HistoricalPoint, PriceObservation, QuotaClass};
use crate::provider::http::{opt_decimal, require_price};
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

pub const PROVIDER_ID: &str = "YAHOO";

/// Yahoo Finance market data provider.
pub struct YahooProvider {
    connector: yahoo::YahooConnector,
    request_timeout: Duration,
}

impl YahooProvider {
    /// Create a new Yahoo Finance provider.
    pub fn new(request_timeout: Duration) -> Result<Self, MarketDataError> {
        let connector = yahoo::YahooConnector::new().map_err(|e| {
            MarketDataError::transient(
                PROVIDER_ID,
                format!("Failed to initialize Yahoo connector: {}", e),
            )
        })?;
        Ok(Self {
            connector,
            request_timeout,
        })
    }

    /// Run a connector call under the per-call timeout.
    async fn bounded<T, F>(&self, call: F) -> Result<T, MarketDataError>
    where
        F: Future<Output = Result<T, yahoo::YahooError>>,
    {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result.map_err(classify_error),
            Err(_) => Err(MarketDataError::transient(
                PROVIDER_ID,
                format!("request timed out after {:?}", self.request_timeout),
            )),
        }
    }

    fn to_offset_datetime(date: NaiveDate, end_of_day: bool) -> OffsetDateTime {
        let time = if end_of_day {
            date.and_hms_opt(23, 59, 59)
        } else {
            date.and_hms_opt(0, 0, 0)
        };
        let ts = time.unwrap_or_default().and_utc().timestamp();
        OffsetDateTime::from_unix_timestamp(ts).unwrap_or_else(|_| OffsetDateTime::now_utc())
    }
}

/// Map connector errors onto the failure taxonomy.
///
/// Yahoo has no credentials, so HTTP 401 (expired crumb) is treated as transient.
fn classify_error(error: yahoo::YahooError) -> MarketDataError {
    if matches!(error, yahoo::YahooError::NoQuotes | yahoo::YahooError::NoResult) {
        return MarketDataError::SymbolNotFound {
            provider: PROVIDER_ID.to_string(),
            symbol: String::new(),
        };
    }

    let message = error.to_string();
    if message.contains("429") || message.contains("Too Many Requests") {
        MarketDataError::RateLimited {
            provider: PROVIDER_ID.to_string(),
        }
    } else if message.contains("404") || message.contains("Not Found") {
        MarketDataError::SymbolNotFound {
            provider: PROVIDER_ID.to_string(),
            symbol: String::new(),
        }
    } else if message.contains("deserializ") || message.contains("json") {
        MarketDataError::malformed(PROVIDER_ID, message)
    } else {
        MarketDataError::transient(PROVIDER_ID, message)
    }
}

/// Fill in the symbol on not-found errors produced before the symbol was known.
fn with_symbol(error: MarketDataError, symbol: &str) -> MarketDataError {
    match error {
        MarketDataError::SymbolNotFound { provider, .. } => MarketDataError::SymbolNotFound {
            provider,
            symbol: symbol.to_string(),
        },
        other => other,
    }
}

#[allow(clippy::too_many_arguments)]
fn to_observation(
    symbol: &str,
    timestamp: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
) -> Result<PriceObservation, MarketDataError> {
    let timestamp = Utc.timestamp_opt(timestamp, 0).single().ok_or_else(|| {
        MarketDataError::malformed(PROVIDER_ID, format!("Invalid timestamp: {}", timestamp))
    })?;
    let price = require_price(PROVIDER_ID, symbol, Some(close))?;

    Ok(PriceObservation::new(symbol, price, timestamp, PROVIDER_ID)
        .with_open(opt_decimal(Some(open)))
        .with_range(opt_decimal(Some(high)), opt_decimal(Some(low)))
        .with_volume(Decimal::from_u64(volume)))
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::quotes_and_history(QuotaClass::Keyless)
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::per_minute(120)
    }

    /// Share classes use a dash (`BRK-B`).
    fn provider_symbol(&self, symbol: &str) -> String {
        symbol.replace('.', "-")
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<PriceObservation, MarketDataError> {
        let provider_symbol = self.provider_symbol(symbol);
        debug!("Fetching latest quote for {} from Yahoo", provider_symbol);

        let response = self
            .bounded(self.connector.get_latest_quotes(&provider_symbol, "1d"))
            .await
            .map_err(|e| with_symbol(e, symbol))?;

        let quote = response.last_quote().map_err(|e| {
            warn!("No quotes returned for {}: {}", symbol, e);
            MarketDataError::not_found(PROVIDER_ID, symbol)
        })?;

        to_observation(
            symbol,
            quote.timestamp as i64,
            quote.open,
            quote.high,
            quote.low,
            quote.close,
            quote.volume,
        )
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalPoint>, MarketDataError> {
        let provider_symbol = self.provider_symbol(symbol);
        let start_time = Self::to_offset_datetime(start, false);
        let end_time = Self::to_offset_datetime(end, true);

        let response = self
            .bounded(
                self.connector
                    .get_quote_history(&provider_symbol, start_time, end_time),
            )
            .await
            .map_err(|e| with_symbol(e, symbol))?;

        let quotes = response
            .quotes()
            .map_err(|e| with_symbol(classify_error(e), symbol))?;

        let mut points: Vec<HistoricalPoint> = quotes
            .into_iter()
            .filter_map(|q| {
                match to_observation(
                    symbol,
                    q.timestamp as i64,
                    q.open,
                    q.high,
                    q.low,
                    q.close,
                    q.volume,
                ) {
                    Ok(obs) => {
                        let mut point = obs.to_daily_point();
                        point.adj_close = opt_decimal(Some(q.adjclose));
                        Some(point)
                    }
                    Err(e) => {
                        warn!("Skipping Yahoo bar for {}: {}", symbol, e);
                        None
                    }
                }
            })
            .collect();

        if points.is_empty() {
            return Err(MarketDataError::not_found(PROVIDER_ID, symbol));
        }
        points.sort_by(|a, b| a.date.cmp(&b.date));
        points.dedup_by(|later, earlier| later.date == earlier.date);
        Ok(points)
    }
}
