//! Provider registry module.
//!
//! This module provides orchestration for market data providers, including:
//! - Provider registration and priority ordering
//! - Sliding-window rate limiting per provider with backoff profiles
//! - Fallback resolution across providers with failure precedence
//! - Quote data validation and attempt diagnostics

mod backoff;
mod rate_limiter;
#[allow(clippy::module_inception)]
mod registry;
mod skip_reason;
mod validator;

pub use backoff::BackoffProfile;
pub use rate_limiter::RateLimiter;
pub use registry::{
    AttemptGate, HistoryResolution, NoDeadline, ProviderRegistry, QuoteResolution,
    RegisteredProvider, Resolution, RunScope, DEFAULT_PROVIDER_TIMEOUT,
};
pub use skip_reason::{FetchDiagnostics, ProviderAttempt, SkipReason};
pub use validator::{QuoteValidator, ValidationIssue, ValidationSeverity};
