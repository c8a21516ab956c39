//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all providers implement
//! - Provider capabilities and rate limiting configuration
//! - Shared HTTP classification helpers
//! - Concrete provider implementations
//!
//! Providers only know how to talk to their upstream. Ordering, credential
//! checks, pacing and fallback all live in the registry.

mod capabilities;
pub mod http;
mod traits;

pub mod alpha_vantage;
pub mod finnhub;
pub mod marketdata_app;
pub mod twelve_data;
pub mod yahoo;

// Re-exports
pub use capabilities::{ProviderCapabilities, RateLimit};
pub use traits::MarketDataProvider;
