//! Quotewarden Market Data Crate
//!
//! Provider-agnostic price acquisition: five upstream adapters behind one
//! trait, a credential resolver, per-provider rate limiting and a fallback
//! resolver that walks providers in a fixed priority order.
//!
//! # Architecture
//!
//! ```text
//! +--------------------+     +--------------------+
//! | CredentialResolver | --> |  ProviderRegistry  |  (priority order, usable set)
//! +--------------------+     +--------------------+
//!                                      |
//!                                      v
//!                            +--------------------+
//!                            |    RateLimiter     |  (sliding window + penalty)
//!                            +--------------------+
//!                                      |
//!                                      v
//!                            +--------------------+
//!                            |      Provider      |  (Yahoo, Finnhub, ...)
//!                            +--------------------+
//!                                      |
//!                                      v
//!                            +--------------------+
//!                            |   QuoteValidator   |
//!                            +--------------------+
//!                                      |
//!                                      v
//!                            +--------------------+
//!                            |     Resolution     |  (Fetched / Failed / NotAttempted)
//!                            +--------------------+
//! ```
//!
//! # Core Types
//!
//! - [`PriceObservation`] - Latest price as reported by one provider
//! - [`HistoricalPoint`] - Daily OHLCV bar, unique per symbol and date
//! - [`FailureKind`] - Five-way failure classification with fixed precedence
//! - [`ProviderRegistry`] - Fallback resolver over the configured providers
//! - [`CredentialResolver`] - Cached API key lookup
//!
//! # Type Aliases
//!
//! - [`ProviderId`] - Provider identifier (e.g., "YAHOO", "ALPHA_VANTAGE")

pub mod credentials;
pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;

pub use credentials::{CredentialResolver, CredentialSource};
pub use errors::{FailureKind, MarketDataError};

pub use models::{
    normalize_symbol, HistoricalPoint, PriceObservation, ProviderDescriptor, ProviderId,
    QuotaClass,
};

// Re-export provider types
pub use provider::alpha_vantage::AlphaVantageProvider;
pub use provider::finnhub::FinnhubProvider;
pub use provider::marketdata_app::MarketDataAppProvider;
pub use provider::twelve_data::TwelveDataProvider;
pub use provider::yahoo::YahooProvider;
pub use provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

// Re-export registry types
pub use registry::{
    AttemptGate, BackoffProfile, FetchDiagnostics, HistoryResolution, NoDeadline,
    ProviderAttempt, ProviderRegistry, QuoteResolution, QuoteValidator, RateLimiter,
    RegisteredProvider, Resolution, RunScope, SkipReason, ValidationSeverity,
};
