//! Twelve Data provider implementation.
//!
//! - Latest price via `/quote`
//! - Daily history via `/time_series?interval=1day`
//!
//! Twelve Data reports errors with HTTP 200 and a JSON body carrying `code`,
//! `message` and `status: "error"`; the `code` mirrors the HTTP status it would
//! have used. Prices are sent as strings.
//!
//! Free tier: 800 API credits/day, 8 requests/minute.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use log::debug;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::errors::MarketDataError;
use crate::models::{HistoricalPoint, PriceObservation, QuotaClass};
use crate::provider::http::{self, require_price_str};
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

const BASE_URL: &str = "https://api.twelvedata.com";
pub const PROVIDER_ID: &str = "TWELVE_DATA";

/// Error fields present on every failed response.
#[derive(Debug, Default, Deserialize)]
struct ApiStatus {
    code: Option<u16>,
    message: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    currency: Option<String>,
    datetime: Option<String>,
    /// Unix time of the last quote
    timestamp: Option<i64>,
    open: Option<String>,
    high: Option<String>,
    low: Option<String>,
    close: Option<String>,
    volume: Option<String>,
    #[serde(flatten)]
    status: ApiStatus,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    values: Option<Vec<TimeSeriesValue>>,
    #[serde(flatten)]
    status: ApiStatus,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesValue {
    datetime: String,
    open: Option<String>,
    high: Option<String>,
    low: Option<String>,
    close: String,
    volume: Option<String>,
}

pub struct TwelveDataProvider {
    client: Client,
    api_key: String,
}

impl TwelveDataProvider {
    pub fn new(api_key: String, request_timeout: Duration) -> Result<Self, MarketDataError> {
        Ok(Self {
            client: http::build_client(PROVIDER_ID, request_timeout)?,
            api_key,
        })
    }

    async fn fetch(
        &self,
        endpoint: &str,
        symbol: &str,
        params: &[(&str, &str)],
    ) -> Result<String, MarketDataError> {
        let url = format!("{}{}", BASE_URL, endpoint);
        debug!("Twelve Data request: {} for {}", endpoint, symbol);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("apikey {}", self.api_key))
            .query(params)
            .send()
            .await
            .map_err(|e| http::map_send_error(PROVIDER_ID, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| http::map_send_error(PROVIDER_ID, e))?;

        if !status.is_success() {
            return Err(http::classify_status(PROVIDER_ID, symbol, status, &body));
        }
        Ok(body)
    }
}

/// Map an in-body error onto the failure taxonomy.
fn check_status(symbol: &str, status: &ApiStatus) -> Result<(), MarketDataError> {
    let is_error = status.code.is_some() || status.status.as_deref() == Some("error");
    if !is_error {
        return Ok(());
    }

    let message = status.message.clone().unwrap_or_default();
    let code = status
        .code
        .and_then(|c| StatusCode::from_u16(c).ok())
        .unwrap_or(StatusCode::BAD_REQUEST);

    // 400 is used for "symbol not found" and other invalid parameters
    if code == StatusCode::BAD_REQUEST && message.to_ascii_lowercase().contains("symbol") {
        return Err(MarketDataError::not_found(PROVIDER_ID, symbol));
    }
    Err(http::classify_status(PROVIDER_ID, symbol, code, &message))
}

fn parse_quote(symbol: &str, body: &str) -> Result<PriceObservation, MarketDataError> {
    let data: QuoteResponse = serde_json::from_str(body).map_err(|e| {
        MarketDataError::malformed(PROVIDER_ID, format!("Failed to parse quote response: {}", e))
    })?;
    check_status(symbol, &data.status)?;

    let price = require_price_str(PROVIDER_ID, symbol, data.close.as_deref())?;

    let timestamp = data
        .timestamp
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
        .or_else(|| {
            data.datetime
                .as_deref()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                .and_then(|d| d.and_hms_opt(21, 0, 0))
                .map(|dt| dt.and_utc())
        })
        .ok_or_else(|| MarketDataError::malformed(PROVIDER_ID, "Quote has no timestamp"))?;

    Ok(PriceObservation::new(symbol, price, timestamp, PROVIDER_ID)
        .with_open(http::opt_decimal_str(data.open.as_deref()))
        .with_range(
            http::opt_decimal_str(data.high.as_deref()),
            http::opt_decimal_str(data.low.as_deref()),
        )
        .with_volume(http::opt_decimal_str(data.volume.as_deref()))
        .with_currency(data.currency))
}

fn parse_time_series(symbol: &str, body: &str) -> Result<Vec<HistoricalPoint>, MarketDataError> {
    let data: TimeSeriesResponse = serde_json::from_str(body).map_err(|e| {
        MarketDataError::malformed(
            PROVIDER_ID,
            format!("Failed to parse time series response: {}", e),
        )
    })?;
    check_status(symbol, &data.status)?;

    let values = data
        .values
        .ok_or_else(|| MarketDataError::not_found(PROVIDER_ID, symbol))?;

    let mut points: Vec<HistoricalPoint> = values
        .iter()
        .filter_map(|v| {
            // Intraday-looking datetimes still start with the date
            let date = NaiveDate::parse_from_str(v.datetime.get(..10)?, "%Y-%m-%d").ok()?;
            let close = require_price_str(PROVIDER_ID, symbol, Some(&v.close)).ok()?;
            let mut point = HistoricalPoint::new(symbol, date, close, PROVIDER_ID);
            point.open = http::opt_decimal_str(v.open.as_deref());
            point.high = http::opt_decimal_str(v.high.as_deref());
            point.low = http::opt_decimal_str(v.low.as_deref());
            point.volume = http::opt_decimal_str(v.volume.as_deref());
            Some(point)
        })
        .collect();

    if points.is_empty() {
        return Err(MarketDataError::not_found(PROVIDER_ID, symbol));
    }
    points.sort_by_key(|p| p.date);
    Ok(points)
}

#[async_trait]
impl MarketDataProvider for TwelveDataProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::quotes_and_history(QuotaClass::FreeTier)
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::per_minute(8)
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
        let start_date = start.format("%Y-%m-%d").to_string();
        let end_date = end.format("%Y-%m-%d").to_string();
        let params = [
            ("symbol", provider_symbol.as_str()),
            ("interval", "1day"),
            ("start_date", start_date.as_str()),
            ("end_date", end_date.as_str()),
        ];
        let body = self.fetch("/time_series", symbol, &params).await?;
        parse_time_series(symbol, &body)
    }
}
