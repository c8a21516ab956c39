//! Market data provider trait definitions.
//!
//! This module defines the core `MarketDataProvider` trait that all
//! market data providers must implement.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::MarketDataError;
use crate::models::{HistoricalPoint, PriceObservation};

use super::capabilities::{ProviderCapabilities, RateLimit};

/// Trait for market data providers.
///
/// Implement this trait to add support for a new market data source.
/// Each implementation owns its URL scheme, auth header and response shape,
/// and must map every failure onto a [`MarketDataError`] whose
/// [`kind`](MarketDataError::kind) is meaningful to the fallback resolver.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use quotewarden_market_data::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};
///
/// struct MyProvider {
///     api_key: String,
/// }
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     fn capabilities(&self) -> ProviderCapabilities {
///         ProviderCapabilities::quotes_and_history(QuotaClass::FreeTier)
///     }
///
///     fn rate_limit(&self) -> RateLimit {
///         RateLimit::per_minute(30)
///     }
///
///     // ... implement fetch methods
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "YAHOO", "ALPHA_VANTAGE", etc.
    /// Used for logging, credential lookup, rate limiting and outcomes.
    fn id(&self) -> &'static str;

    /// Describes what this provider can do.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Steady-state request quota for this provider.
    fn rate_limit(&self) -> RateLimit;

    /// Maps a canonical ticker to the form this provider expects.
    fn provider_symbol(&self, symbol: &str) -> String {
        symbol.to_string()
    }

    /// Fetch the latest price for a canonical symbol.
    ///
    /// Implementations must return an error instead of an observation whose
    /// price is zero, negative or absent.
    async fn fetch_quote(&self, symbol: &str) -> Result<PriceObservation, MarketDataError>;

    /// Fetch daily history for a canonical symbol, `start..=end`, ordered by date ascending.
    ///
    /// Default implementation returns `NotSupported`.
    async fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalPoint>, MarketDataError> {
        let _ = (symbol, start, end);
        Err(MarketDataError::NotSupported {
            operation: "history".to_string(),
            provider: self.id().to_string(),
        })
    }
}
