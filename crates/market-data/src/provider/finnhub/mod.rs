//! Finnhub market data provider implementation.
//!
//! - Latest price via the /quote endpoint
//! - Daily history via the /stock/candle endpoint
//!
//! Finnhub free tier is limited to 60 API calls per minute.
//! API documentation: https://finnhub.io/docs/api

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::{HistoricalPoint, PriceObservation, QuotaClass};
use crate::provider::http::{self, require_price};
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

const BASE_URL: &str = "https://finnhub.io/api/v1";
pub const PROVIDER_ID: &str = "FINNHUB";

// ============================================================================
// API Response Structures
// ============================================================================

/// Response from /quote endpoint
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    /// Current price
    c: Option<f64>,
    /// High price of the day
    h: Option<f64>,
    /// Low price of the day
    l: Option<f64>,
    /// Open price of the day
    o: Option<f64>,
    /// Timestamp (Unix)
    t: Option<i64>,
}

/// Response from /stock/candle endpoint
#[derive(Debug, Deserialize)]
struct CandleResponse {
    /// Status: "ok" or "no_data"
    s: String,
    #[serde(default)]
    c: Vec<f64>,
    #[serde(default)]
    h: Vec<f64>,
    #[serde(default)]
    l: Vec<f64>,
    #[serde(default)]
    o: Vec<f64>,
    #[serde(default)]
    v: Vec<f64>,
    #[serde(default)]
    t: Vec<i64>,
}

/// Error response from Finnhub
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
}

// ============================================================================
// FinnhubProvider
// ============================================================================

/// Finnhub market data provider.
pub struct FinnhubProvider {
    client: Client,
    api_key: String,
}

impl FinnhubProvider {
    /// Create a new Finnhub provider with the given API key.
    pub fn new(api_key: String, request_timeout: Duration) -> Result<Self, MarketDataError> {
        Ok(Self {
            client: http::build_client(PROVIDER_ID, request_timeout)?,
            api_key,
        })
    }

    /// Make a GET request to the Finnhub API.
    async fn fetch(
        &self,
        endpoint: &str,
        symbol: &str,
        params: &[(&str, &str)],
    ) -> Result<String, MarketDataError> {
        let url = format!("{}{}", BASE_URL, endpoint);

        debug!("Finnhub request: {} for {}", endpoint, symbol);

        let response = self
            .client
            .get(&url)
            .header("X-Finnhub-Token", &self.api_key)
            .query(params)
            .send()
            .await
            .map_err(|e| http::map_send_error(PROVIDER_ID, e))?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            // Finnhub answers 403 for symbols outside the account's plan; the key itself is fine.
            if status == StatusCode::FORBIDDEN {
                return Err(MarketDataError::not_found(PROVIDER_ID, symbol));
            }

            let message = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error)
                .unwrap_or(body);
            return Err(http::classify_status(PROVIDER_ID, symbol, status, &message));
        }

        response
            .text()
            .await
            .map_err(|e| http::map_send_error(PROVIDER_ID, e))
    }
}

/// Parse a /quote body into an observation.
fn parse_quote(symbol: &str, body: &str) -> Result<PriceObservation, MarketDataError> {
    let response: QuoteResponse = serde_json::from_str(body).map_err(|e| {
        MarketDataError::malformed(PROVIDER_ID, format!("Failed to parse quote response: {}", e))
    })?;

    // Finnhub returns all-zero quotes for unknown symbols instead of an error
    let zero = |v: Option<f64>| v.unwrap_or(0.0) == 0.0;
    if zero(response.c) && zero(response.o) && response.t.unwrap_or(0) == 0 {
        return Err(MarketDataError::not_found(PROVIDER_ID, symbol));
    }

    let price = require_price(PROVIDER_ID, symbol, response.c)?;

    let timestamp = response
        .t
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
        .unwrap_or_else(Utc::now);

    Ok(PriceObservation::new(symbol, price, timestamp, PROVIDER_ID)
        .with_open(http::opt_decimal(response.o))
        .with_range(http::opt_decimal(response.h), http::opt_decimal(response.l)))
}

/// Parse a /stock/candle body into daily points.
fn parse_candles(symbol: &str, body: &str) -> Result<Vec<HistoricalPoint>, MarketDataError> {
    let response: CandleResponse = serde_json::from_str(body).map_err(|e| {
        MarketDataError::malformed(PROVIDER_ID, format!("Failed to parse candle response: {}", e))
    })?;

    if response.s == "no_data" {
        return Err(MarketDataError::not_found(PROVIDER_ID, symbol));
    }

    if response.s != "ok" {
        return Err(MarketDataError::malformed(
            PROVIDER_ID,
            format!("Unexpected candle status: {}", response.s),
        ));
    }

    let len = response.t.len();
    if response.c.len() != len
        || response.o.len() != len
        || response.h.len() != len
        || response.l.len() != len
    {
        return Err(MarketDataError::malformed(
            PROVIDER_ID,
            "Mismatched array lengths in candle response",
        ));
    }

    let mut points = Vec::with_capacity(len);
    for i in 0..len {
        let date = match Utc.timestamp_opt(response.t[i], 0).single() {
            Some(ts) => ts.date_naive(),
            None => {
                warn!("Invalid timestamp at index {}: {}", i, response.t[i]);
                continue;
            }
        };

        let close = match require_price(PROVIDER_ID, symbol, Some(response.c[i])) {
            Ok(close) => close,
            Err(_) => {
                warn!("Invalid close price at index {}: {}", i, response.c[i]);
                continue;
            }
        };

        let mut point = HistoricalPoint::new(symbol, date, close, PROVIDER_ID);
        point.open = http::opt_decimal(Some(response.o[i]));
        point.high = http::opt_decimal(Some(response.h[i]));
        point.low = http::opt_decimal(Some(response.l[i]));
        point.volume = http::opt_decimal(response.v.get(i).copied());
        points.push(point);
    }

    if points.is_empty() {
        return Err(MarketDataError::not_found(PROVIDER_ID, symbol));
    }

    points.sort_by(|a, b| a.date.cmp(&b.date));
    Ok(points)
}

// ============================================================================
// MarketDataProvider Implementation
// ============================================================================

#[async_trait]
impl MarketDataProvider for FinnhubProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::quotes_and_history(QuotaClass::FreeTier)
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::per_minute(60)
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<PriceObservation, MarketDataError> {
        let provider_symbol = self.provider_symbol(symbol);
        let body = self
            .fetch("/quote", symbol, &[("symbol", provider_symbol.as_str())])
            .await?;
        parse_quote(symbol, &body)
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalPoint>, MarketDataError> {
        let provider_symbol = self.provider_symbol(symbol);
        let from_ts = start.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc().timestamp();
        let to_ts = end.and_hms_opt(23, 59, 59).unwrap_or_default().and_utc().timestamp();
        let from_ts = from_ts.to_string();
        let to_ts = to_ts.to_string();

        let params = [
            ("symbol", provider_symbol.as_str()),
            ("resolution", "D"),
            ("from", from_ts.as_str()),
            ("to", to_ts.as_str()),
        ];
        let body = self.fetch("/stock/candle", symbol, &params).await?;
        let points = parse_candles(symbol, &body)?;

        debug!(
            "Finnhub: fetched {} historical points for {} ({} to {})",
            points.len(),
            symbol,
            start,
            end
        );
        Ok(points)
    }
}

// ============================================================================
// Tests
// ============================================================================
