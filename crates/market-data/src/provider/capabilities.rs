//! Provider capabilities and rate limiting configuration.
//!
//! This module defines structures for describing what a market data provider
//! can do and how it should be rate-limited.

use std::time::Duration;

use crate::models::QuotaClass;

/// Describes the capabilities of a market data provider.
#[derive(Clone, Debug)]
pub struct ProviderCapabilities {
    /// Whether the provider supports daily history fetching.
    pub supports_history: bool,

    /// Whether calls require an API key from the credential resolver.
    pub requires_api_key: bool,

    pub quota_class: QuotaClass,
}

impl ProviderCapabilities {
    pub fn quotes_and_history(quota_class: QuotaClass) -> Self {
        Self {
            supports_history: true,
            requires_api_key: quota_class != QuotaClass::Keyless,
            quota_class,
        }
    }
}

/// Rate limiting configuration for a provider.
///
/// At most `requests` calls are dispatched within any sliding window of
/// length `interval`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimit {
    /// Maximum requests allowed per interval.
    pub requests: u32,

    /// Length of the sliding window.
    pub interval: Duration,
}

impl RateLimit {
    pub fn new(requests: u32, interval: Duration) -> Self {
        Self {
            requests: requests.max(1),
            interval,
        }
    }

    pub fn per_minute(requests: u32) -> Self {
        Self::new(requests, Duration::from_secs(60))
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::per_minute(60)
    }
}
