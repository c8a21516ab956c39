//! Alpha Vantage market data provider implementation.
//!
//! - Latest price via the GLOBAL_QUOTE function
//! - Daily history via the TIME_SERIES_DAILY function
//!
//! Alpha Vantage reports most failures with HTTP 200 and an in-body `Note`,
//! `Information` or `Error Message` field, so classification happens after parsing.
//!
//! Note: Alpha Vantage free tier is limited to 5 API calls per minute.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;

use crate::errors::MarketDataError;
use crate::models::{HistoricalPoint, PriceObservation, QuotaClass};
use crate::provider::http::{self, require_price_str};
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

const BASE_URL: &str = "https://www.alphavantage.co/query";
pub const PROVIDER_ID: &str = "ALPHA_VANTAGE";

/// GLOBAL_QUOTE only reports the trading day; stamp observations at the US close.
const SESSION_CLOSE_UTC: (u32, u32) = (21, 0);

/// Alpha Vantage market data provider.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
}

// ============================================================================
// Response structures for Alpha Vantage API
// ============================================================================

/// Fields every Alpha Vantage function may return instead of data.
#[derive(Debug, Default, Deserialize)]
struct ApiNotice {
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(flatten)]
    notice: ApiNotice,
}

#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "02. open")]
    open: Option<String>,
    #[serde(rename = "03. high")]
    high: Option<String>,
    #[serde(rename = "04. low")]
    low: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
}

/// TIME_SERIES_DAILY response for equities
#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<HashMap<String, DailyQuote>>,
    #[serde(flatten)]
    notice: ApiNotice,
}

#[derive(Debug, Deserialize)]
struct DailyQuote {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: String,
}

impl AlphaVantageProvider {
    pub fn new(api_key: String, request_timeout: Duration) -> Result<Self, MarketDataError> {
        Ok(Self {
            client: http::build_client(PROVIDER_ID, request_timeout)?,
            api_key,
        })
    }

    /// Make a request to the Alpha Vantage API.
    async fn fetch(&self, symbol: &str, params: &[(&str, &str)]) -> Result<String, MarketDataError> {
        let mut all_params: Vec<(&str, &str)> = params.to_vec();
        all_params.push(("apikey", &self.api_key));

        let url = reqwest::Url::parse_with_params(BASE_URL, &all_params).map_err(|e| {
            MarketDataError::malformed(PROVIDER_ID, format!("Failed to build URL: {}", e))
        })?;

        debug!(
            "Alpha Vantage request: {}",
            url.as_str().replace(&self.api_key, "***")
        );

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| http::map_send_error(PROVIDER_ID, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http::classify_status(PROVIDER_ID, symbol, status, &body));
        }

        response
            .text()
            .await
            .map_err(|e| http::map_send_error(PROVIDER_ID, e))
    }
}

/// Map in-body notices onto the failure taxonomy.
fn check_notice(symbol: &str, notice: &ApiNotice) -> Result<(), MarketDataError> {
    if let Some(msg) = &notice.error_message {
        if msg.contains("apikey") {
            return Err(MarketDataError::Unauthorized {
                provider: PROVIDER_ID.to_string(),
                message: msg.clone(),
            });
        }
        if msg.contains("Invalid API call") || msg.contains("not found") {
            return Err(MarketDataError::not_found(PROVIDER_ID, symbol));
        }
        return Err(MarketDataError::malformed(PROVIDER_ID, msg.clone()));
    }

    for msg in [&notice.note, &notice.information].into_iter().flatten() {
        let lower = msg.to_ascii_lowercase();
        if lower.contains("call frequency")
            || lower.contains("rate limit")
            || lower.contains("requests per day")
        {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }
        if lower.contains("api key") || lower.contains("premium") {
            return Err(MarketDataError::Unauthorized {
                provider: PROVIDER_ID.to_string(),
                message: msg.clone(),
            });
        }
        warn!("Alpha Vantage notice: {}", msg);
    }

    Ok(())
}

fn parse_date(date_str: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok()
}

fn parse_global_quote(symbol: &str, body: &str) -> Result<PriceObservation, MarketDataError> {
    let response: GlobalQuoteResponse = serde_json::from_str(body).map_err(|e| {
        MarketDataError::malformed(PROVIDER_ID, format!("Failed to parse response: {}", e))
    })?;
    check_notice(symbol, &response.notice)?;

    // Unknown symbols come back as an empty "Global Quote" object
    let quote = response
        .global_quote
        .filter(|q| q.price.is_some())
        .ok_or_else(|| MarketDataError::not_found(PROVIDER_ID, symbol))?;

    let price = require_price_str(PROVIDER_ID, symbol, quote.price.as_deref())?;

    let day = quote
        .latest_trading_day
        .as_deref()
        .and_then(parse_date)
        .ok_or_else(|| MarketDataError::malformed(PROVIDER_ID, "Missing latest trading day"))?;
    let (h, m) = SESSION_CLOSE_UTC;
    let timestamp = day
        .and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default())
        .and_utc();

    Ok(PriceObservation::new(symbol, price, timestamp, PROVIDER_ID)
        .with_open(http::opt_decimal_str(quote.open.as_deref()))
        .with_range(
            http::opt_decimal_str(quote.high.as_deref()),
            http::opt_decimal_str(quote.low.as_deref()),
        )
        .with_volume(http::opt_decimal_str(quote.volume.as_deref()))
        .with_currency(Some("USD".to_string())))
}

fn parse_time_series(
    symbol: &str,
    body: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<HistoricalPoint>, MarketDataError> {
    let response: TimeSeriesResponse = serde_json::from_str(body).map_err(|e| {
        MarketDataError::malformed(PROVIDER_ID, format!("Failed to parse response: {}", e))
    })?;
    check_notice(symbol, &response.notice)?;

    let time_series = response
        .time_series
        .ok_or_else(|| MarketDataError::not_found(PROVIDER_ID, symbol))?;

    let mut points: Vec<HistoricalPoint> = time_series
        .into_iter()
        .filter_map(|(date_str, daily)| {
            let date = parse_date(&date_str)?;
            if date < start || date > end {
                return None;
            }
            let close = require_price_str(PROVIDER_ID, symbol, Some(&daily.close)).ok()?;
            let mut point = HistoricalPoint::new(symbol, date, close, PROVIDER_ID);
            point.open = http::opt_decimal_str(Some(&daily.open));
            point.high = http::opt_decimal_str(Some(&daily.high));
            point.low = http::opt_decimal_str(Some(&daily.low));
            point.volume = http::opt_decimal_str(Some(&daily.volume));
            Some(point)
        })
        .collect();

    if points.is_empty() {
        return Err(MarketDataError::not_found(PROVIDER_ID, symbol));
    }
    points.sort_by(|a, b| a.date.cmp(&b.date));
    Ok(points)
}

#[async_trait]
impl MarketDataProvider for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::quotes_and_history(QuotaClass::FreeTier)
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::per_minute(5)
    }

    /// Share classes use a dash (`BRK-B`).
    fn provider_symbol(&self, symbol: &str) -> String {
        symbol.replace('.', "-")
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<PriceObservation, MarketDataError> {
        let provider_symbol = self.provider_symbol(symbol);
        let params = [("function", "GLOBAL_QUOTE"), ("symbol", provider_symbol.as_str())];
        let body = self.fetch(symbol, &params).await?;
        parse_global_quote(symbol, &body)
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalPoint>, MarketDataError> {
        let provider_symbol = self.provider_symbol(symbol);
        let params = [
            ("function", "TIME_SERIES_DAILY"),
            ("symbol", provider_symbol.as_str()),
            ("outputsize", "compact"), // 'full' is premium-only
        ];
        let body = self.fetch(symbol, &params).await?;
        let points = parse_time_series(symbol, &body, start, end)?;
        debug!(
            "Alpha Vantage: fetched {} daily points for {}",
            points.len(),
            symbol
        );
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FailureKind;
    use chrono::Timelike;
    use rust_decimal_macros::dec;

    #[test]
    fn test_provider_symbol() {
        let provider = AlphaVantageProvider::new("k".to_string(), Duration::from_secs(5)).unwrap();
        assert_eq!(provider.provider_symbol("BRK.B"), "BRK-B");
        assert_eq!(provider.provider_symbol("AAPL"), "AAPL");
    }

    #[test]
    fn test_parse_global_quote() {
        let json = r#"{
            "Global Quote": {
                "01. symbol": "IBM",
                "02. open": "245.1000",
                "03. high": "247.3000",
                "04. low": "244.0100",
                "05. price": "246.8800",
                "06. volume": "3921833",
                "07. latest trading day": "2026-02-13",
                "08. previous close": "244.9000",
                "09. change": "1.9800",
                "10. change percent": "0.8085%"
            }
        }"#;
        let obs = parse_global_quote("IBM", json).unwrap();
        assert_eq!(obs.price, dec!(246.8800));
        assert_eq!(obs.open, Some(dec!(245.1000)));
        assert_eq!(obs.volume, Some(dec!(3921833)));
        assert_eq!(obs.timestamp.date_naive(), NaiveDate::from_ymd_opt(2026, 2, 13).unwrap());
        assert_eq!(obs.timestamp.hour(), 21);
    }

    #[test]
    fn test_empty_global_quote_is_not_found() {
        let err = parse_global_quote("ZZZZ", r#"{"Global Quote": {}}"#).unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotFound);
    }

    #[test]
    fn test_frequency_note_is_rate_limited() {
        let json = r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute and 500 calls per day."}"#;
        let err = parse_global_quote("IBM", json).unwrap_err();
        assert_eq!(err.kind(), FailureKind::RateLimited);
    }

    #[test]
    fn test_daily_limit_information_is_rate_limited() {
        let json = r#"{"Information": "We have detected your API key as XYZ and our standard API rate limit is 25 requests per day."}"#;
        let err = parse_global_quote("IBM", json).unwrap_err();
        assert_eq!(err.kind(), FailureKind::RateLimited);
    }

    #[test]
    fn test_invalid_apikey_is_unauthorized() {
        let json = r#"{"Error Message": "the parameter apikey is invalid or missing."}"#;
        let err = parse_global_quote("IBM", json).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Unauthorized);
    }

    #[test]
    fn test_zero_price_is_invalid() {
        let json = r#"{"Global Quote": {"05. price": "0.0000", "07. latest trading day": "2026-02-13"}}"#;
        let err = parse_global_quote("IBM", json).unwrap_err();
        assert!(matches!(err, MarketDataError::InvalidPrice { .. }));
    }

    #[test]
    fn test_parse_time_series_filters_range() {
        let json = r#"{
            "Meta Data": {"2. Symbol": "SPY"},
            "Time Series (Daily)": {
                "2026-02-16": {"1. open": "589.0", "2. high": "590.0", "3. low": "586.0", "4. close": "589.5", "5. volume": "100"},
                "2026-02-13": {"1. open": "586.0", "2. high": "589.0", "3. low": "585.0", "4. close": "588.0", "5. volume": "200"},
                "2026-02-12": {"1. open": "584.0", "2. high": "587.0", "3. low": "583.0", "4. close": "586.1", "5. volume": "300"}
            }
        }"#;
        let start = NaiveDate::from_ymd_opt(2026, 2, 12).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 2, 13).unwrap();
        let points = parse_time_series("SPY", json, start, end).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, start);
        assert_eq!(points[1].close, dec!(588.0));
    }
}
