//! Shared HTTP plumbing for the keyed REST providers.
//!
//! Every adapter builds its client with a bounded per-call timeout and funnels
//! transport errors, status codes and price fields through these helpers so that
//! classification is identical across providers.

use std::str::FromStr;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;

use crate::errors::MarketDataError;

/// Default per-call timeout when the caller does not configure one.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build a client whose every request is bounded by `timeout`.
pub fn build_client(provider: &str, timeout: Duration) -> Result<Client, MarketDataError> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(5)))
        .build()
        .map_err(|e| {
            MarketDataError::transient(provider, format!("Failed to build HTTP client: {}", e))
        })
}

/// Classify a transport-level failure.
pub fn map_send_error(provider: &str, error: reqwest::Error) -> MarketDataError {
    if error.is_timeout() {
        MarketDataError::transient(provider, "request timed out")
    } else if error.is_connect() {
        MarketDataError::transient(provider, format!("connection failed: {}", error))
    } else if error.is_decode() {
        MarketDataError::malformed(provider, format!("undecodable body: {}", error))
    } else {
        MarketDataError::transient(provider, format!("request failed: {}", error))
    }
}

/// Classify a non-success HTTP status.
///
/// `body` is included in the message, truncated, so operators can see the
/// provider's own explanation in the run summary.
pub fn classify_status(provider: &str, symbol: &str, status: StatusCode, body: &str) -> MarketDataError {
    let detail = truncate(body, 200);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::PAYMENT_REQUIRED => {
            MarketDataError::Unauthorized {
                provider: provider.to_string(),
                message: format!("HTTP {} - {}", status.as_u16(), detail),
            }
        }
        StatusCode::TOO_MANY_REQUESTS => MarketDataError::RateLimited {
            provider: provider.to_string(),
        },
        StatusCode::NOT_FOUND => MarketDataError::not_found(provider, symbol),
        StatusCode::REQUEST_TIMEOUT => MarketDataError::transient(provider, "HTTP 408"),
        s if s.is_server_error() => {
            MarketDataError::transient(provider, format!("HTTP {} - {}", s.as_u16(), detail))
        }
        s => MarketDataError::malformed(provider, format!("HTTP {} - {}", s.as_u16(), detail)),
    }
}

/// Require a finite, strictly positive price.
pub fn require_price(provider: &str, symbol: &str, value: Option<f64>) -> Result<Decimal, MarketDataError> {
    let invalid = |message: String| MarketDataError::InvalidPrice {
        provider: provider.to_string(),
        symbol: symbol.to_string(),
        message,
    };

    let raw = value.ok_or_else(|| invalid("price missing".to_string()))?;
    if !raw.is_finite() || raw <= 0.0 {
        return Err(invalid(format!("price must be positive, got {}", raw)));
    }
    Decimal::try_from(raw).map_err(|_| invalid(format!("price not representable: {}", raw)))
}

/// Same as [`require_price`] for providers that send prices as strings.
pub fn require_price_str(provider: &str, symbol: &str, value: Option<&str>) -> Result<Decimal, MarketDataError> {
    let invalid = |message: String| MarketDataError::InvalidPrice {
        provider: provider.to_string(),
        symbol: symbol.to_string(),
        message,
    };

    let raw = value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid("price missing".to_string()))?;
    let price = Decimal::from_str(raw).map_err(|_| invalid(format!("unparseable price '{}'", raw)))?;
    if price <= Decimal::ZERO {
        return Err(invalid(format!("price must be positive, got {}", price)));
    }
    Ok(price)
}

/// Lenient conversion for optional OHLCV fields.
pub fn opt_decimal(value: Option<f64>) -> Option<Decimal> {
    value
        .filter(|v| v.is_finite())
        .and_then(|v| Decimal::try_from(v).ok())
}

pub fn opt_decimal_str(value: Option<&str>) -> Option<Decimal> {
    value.and_then(|v| Decimal::from_str(v.trim()).ok())
}

fn truncate(body: &str, max: usize) -> &str {
    match body.char_indices().nth(max) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
