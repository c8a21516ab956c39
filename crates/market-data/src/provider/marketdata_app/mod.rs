//! MarketData.app provider implementation.
//!
//! Equities only, Bearer token authentication.
//!
//! # API Endpoints
//!
//! - Latest price: `https://api.marketdata.app/v1/stocks/prices/{symbol}/`
//! - Historical candles: `https://api.marketdata.app/v1/stocks/candles/D/{symbol}?from={start_date}&to={end_date}`
//!
//! # Response Format
//!
//! The API returns parallel arrays with a status field `s` indicating success
//! (`"ok"`), an empty result (`"no_data"`) or an error (`"error"` plus `errmsg`).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use log::warn;
use reqwest::Client;
use serde::Deserialize;

use crate::errors::MarketDataError;
use crate::models::{HistoricalPoint, PriceObservation, QuotaClass};
use crate::provider::http::{self, require_price};
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

const BASE_URL: &str = "https://api.marketdata.app/v1";
pub const PROVIDER_ID: &str = "MARKETDATA_APP";

/// Response from the candles endpoint for historical data.
#[derive(Debug, Deserialize)]
struct CandlesResponse {
    s: String,
    #[serde(default)]
    errmsg: Option<String>,
    #[serde(default)]
    o: Option<Vec<f64>>,
    #[serde(default)]
    h: Option<Vec<f64>>,
    #[serde(default)]
    l: Option<Vec<f64>>,
    #[serde(default)]
    c: Option<Vec<f64>>,
    #[serde(default)]
    v: Option<Vec<f64>>,
    #[serde(default)]
    t: Option<Vec<i64>>,
}

/// Response from the prices endpoint for latest quote.
#[derive(Debug, Deserialize)]
struct PriceResponse {
    s: String,
    #[serde(default)]
    errmsg: Option<String>,
    /// Mid price (average of bid and ask)
    #[serde(default)]
    mid: Option<Vec<f64>>,
    /// Unix timestamps of last update
    #[serde(default)]
    updated: Option<Vec<i64>>,
}

/// MarketData.app provider for fetching equity market data.
pub struct MarketDataAppProvider {
    client: Client,
    api_key: String,
}

impl MarketDataAppProvider {
    pub fn new(api_key: String, request_timeout: Duration) -> Result<Self, MarketDataError> {
        Ok(Self {
            client: http::build_client(PROVIDER_ID, request_timeout)?,
            api_key,
        })
    }

    /// Fetch data from the API with Bearer token authentication.
    async fn fetch(&self, url: &str, symbol: &str) -> Result<String, MarketDataError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| http::map_send_error(PROVIDER_ID, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| http::map_send_error(PROVIDER_ID, e))?;

        // no_data comes back as 404 with a JSON status body
        if !status.is_success() && !body.contains("\"no_data\"") {
            return Err(http::classify_status(PROVIDER_ID, symbol, status, &body));
        }
        Ok(body)
    }
}

fn status_error(symbol: &str, s: &str, errmsg: Option<String>) -> MarketDataError {
    match s {
        "no_data" => MarketDataError::not_found(PROVIDER_ID, symbol),
        _ => {
            let message = errmsg.unwrap_or_else(|| format!("API returned status: {}", s));
            if message.to_ascii_lowercase().contains("token") {
                MarketDataError::Unauthorized {
                    provider: PROVIDER_ID.to_string(),
                    message,
                }
            } else {
                MarketDataError::malformed(PROVIDER_ID, message)
            }
        }
    }
}

fn parse_price(symbol: &str, body: &str) -> Result<PriceObservation, MarketDataError> {
    let resp: PriceResponse = serde_json::from_str(body).map_err(|e| {
        MarketDataError::malformed(PROVIDER_ID, format!("Failed to parse response: {}", e))
    })?;

    if resp.s != "ok" {
        return Err(status_error(symbol, &resp.s, resp.errmsg));
    }

    let mid = resp.mid.as_ref().and_then(|arr| arr.first()).copied();
    let price = require_price(PROVIDER_ID, symbol, mid)?;

    let timestamp_unix = resp
        .updated
        .as_ref()
        .and_then(|arr| arr.first())
        .copied()
        .ok_or_else(|| MarketDataError::malformed(PROVIDER_ID, "No timestamp in response"))?;

    let timestamp = Utc
        .timestamp_opt(timestamp_unix, 0)
        .single()
        .ok_or_else(|| {
            MarketDataError::malformed(PROVIDER_ID, format!("Invalid timestamp: {}", timestamp_unix))
        })?;

    Ok(PriceObservation::new(symbol, price, timestamp, PROVIDER_ID)
        .with_currency(Some("USD".to_string())))
}

fn parse_candles(symbol: &str, body: &str) -> Result<Vec<HistoricalPoint>, MarketDataError> {
    let resp: CandlesResponse = serde_json::from_str(body).map_err(|e| {
        MarketDataError::malformed(PROVIDER_ID, format!("Failed to parse response: {}", e))
    })?;

    if resp.s != "ok" {
        return Err(status_error(symbol, &resp.s, resp.errmsg));
    }

    let timestamps = resp.t.unwrap_or_default();
    let closes = resp.c.unwrap_or_default();
    if closes.len() != timestamps.len() {
        return Err(MarketDataError::malformed(
            PROVIDER_ID,
            "Mismatched array lengths in candles response",
        ));
    }
    let opens = resp.o.unwrap_or_default();
    let highs = resp.h.unwrap_or_default();
    let lows = resp.l.unwrap_or_default();
    let volumes = resp.v.unwrap_or_default();

    let mut points = Vec::with_capacity(timestamps.len());
    for (i, ts) in timestamps.iter().enumerate() {
        let Some(date) = Utc.timestamp_opt(*ts, 0).single().map(|t| t.date_naive()) else {
            warn!("Skipping candle with invalid timestamp {}", ts);
            continue;
        };
        let Ok(close) = require_price(PROVIDER_ID, symbol, closes.get(i).copied()) else {
            warn!("Skipping candle for {} on {} with invalid close", symbol, date);
            continue;
        };

        let mut point = HistoricalPoint::new(symbol, date, close, PROVIDER_ID);
        point.open = http::opt_decimal(opens.get(i).copied());
        point.high = http::opt_decimal(highs.get(i).copied());
        point.low = http::opt_decimal(lows.get(i).copied());
        point.volume = http::opt_decimal(volumes.get(i).copied());
        points.push(point);
    }

    if points.is_empty() {
        return Err(MarketDataError::not_found(PROVIDER_ID, symbol));
    }
    points.sort_by(|a, b| a.date.cmp(&b.date));
    Ok(points)
}

#[async_trait]
impl MarketDataProvider for MarketDataAppProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::quotes_and_history(QuotaClass::Tiered)
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::per_minute(100)
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<PriceObservation, MarketDataError> {
        let url = format!(
            "{}/stocks/prices/{}/",
            BASE_URL,
            urlencoding::encode(&self.provider_symbol(symbol))
        );
        let body = self.fetch(&url, symbol).await?;
        parse_price(symbol, &body)
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalPoint>, MarketDataError> {
        let url = format!(
            "{}/stocks/candles/D/{}?from={}&to={}",
            BASE_URL,
            urlencoding::encode(&self.provider_symbol(symbol)),
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );
        let body = self.fetch(&url, symbol).await?;
        parse_candles(symbol, &body)
    }
}
