//! Error types and failure classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all provider operations
//! - [`FailureKind`]: The five-way classification every provider failure maps to

mod kind;

pub use kind::FailureKind;

use thiserror::Error;

/// Errors that can occur during market data operations.
///
/// Each variant is classified into a [`FailureKind`] via the [`kind`](Self::kind)
/// method, which the fallback resolver uses to pick the reported failure reason.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The provider rejected our credentials.
    /// The provider is skipped for every remaining symbol in the run.
    #[error("Unauthorized: {provider} - {message}")]
    Unauthorized { provider: String, message: String },

    /// The provider rate limited the request (HTTP 429 or an in-body quota note),
    /// or the local limiter refused to wait that long.
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The requested symbol was not found by the provider.
    #[error("Symbol not found: {provider} - {symbol}")]
    SymbolNotFound { provider: String, symbol: String },

    /// Timeouts, connection resets and upstream 5xx responses.
    #[error("Transient failure: {provider} - {message}")]
    Transient { provider: String, message: String },

    /// The provider answered, but the body could not be understood.
    #[error("Malformed response: {provider} - {message}")]
    Malformed { provider: String, message: String },

    /// The provider returned a zero, negative or missing price.
    #[error("Invalid price from {provider} for {symbol}: {message}")]
    InvalidPrice {
        provider: String,
        symbol: String,
        message: String,
    },

    /// The provider does not implement the requested operation.
    #[error("Operation not supported by {provider}: {operation}")]
    NotSupported { provider: String, operation: String },

    /// No providers are usable for this request.
    #[error("No providers available")]
    NoProvidersAvailable,

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    /// Returns the failure classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use quotewarden_market_data::errors::{FailureKind, MarketDataError};
    ///
    /// let error = MarketDataError::RateLimited { provider: "FINNHUB".to_string() };
    /// assert_eq!(error.kind(), FailureKind::RateLimited);
    ///
    /// let error = MarketDataError::InvalidPrice {
    ///     provider: "YAHOO".to_string(),
    ///     symbol: "AAPL".to_string(),
    ///     message: "price is zero".to_string(),
    /// };
    /// assert_eq!(error.kind(), FailureKind::Malformed);
    /// ```
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Unauthorized { .. } => FailureKind::Unauthorized,
            Self::RateLimited { .. } => FailureKind::RateLimited,
            Self::SymbolNotFound { .. } | Self::NotSupported { .. } => FailureKind::NotFound,
            Self::Transient { .. } | Self::NoProvidersAvailable => FailureKind::Transient,
            Self::Malformed { .. } | Self::InvalidPrice { .. } => FailureKind::Malformed,
            Self::Network(e) => {
                if e.is_decode() {
                    FailureKind::Malformed
                } else {
                    FailureKind::Transient
                }
            }
        }
    }

    pub fn transient(provider: &str, message: impl Into<String>) -> Self {
        Self::Transient {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn malformed(provider: &str, message: impl Into<String>) -> Self {
        Self::Malformed {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(provider: &str, symbol: &str) -> Self {
        Self::SymbolNotFound {
            provider: provider.to_string(),
            symbol: symbol.to_string(),
        }
    }
}
