//! Provider registry and fallback resolution.
//!
//! The registry owns the configured providers in fixed priority order and
//! resolves one symbol at a time by walking that order:
//! - Skip providers that are disabled, unconfigured, or rejected our credentials earlier in the run
//! - Wait for a rate limiter slot (bounded by the backoff profile and the caller's budget)
//! - Call the provider under a per-call timeout
//! - Validate the result; the first valid one wins
//!
//! When every provider fails the most specific [`FailureKind`] is reported.
//! "Use one explicit source" is the same walk over a single-entry list.

use std::borrow::Cow;
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use log::{debug, info, warn};

use super::skip_reason::{FetchDiagnostics, SkipReason};
use super::{QuoteValidator, RateLimiter};
use crate::errors::{FailureKind, MarketDataError};
use crate::models::{HistoricalPoint, PriceObservation, ProviderDescriptor, ProviderId, QuotaClass};
use crate::provider::{MarketDataProvider, RateLimit};

/// Default per-call ceiling when the caller does not configure one.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Cooperative cancellation seam between the resolver and whatever owns the deadline.
pub trait AttemptGate: Send + Sync {
    /// Whether a new provider attempt may start.
    fn may_attempt(&self) -> bool;

    /// Largest duration a single wait or call may take, given a configured maximum.
    fn call_timeout(&self, max: Duration) -> Duration;
}

/// Gate for callers without a deadline (interactive use, tests).
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDeadline;

impl AttemptGate for NoDeadline {
    fn may_attempt(&self) -> bool {
        true
    }

    fn call_timeout(&self, max: Duration) -> Duration {
        max
    }
}

/// State shared by every resolution within one invocation.
#[derive(Debug, Default)]
pub struct RunScope {
    unauthorized: Mutex<HashSet<String>>,
}

impl RunScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_unauthorized(&self, provider: &str) {
        self.unauthorized
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(provider.to_string());
    }

    pub fn is_unauthorized(&self, provider: &str) -> bool {
        self.unauthorized
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(provider)
    }

    pub fn unauthorized_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .unauthorized
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

/// Result of walking the provider chain for one symbol.
#[derive(Debug)]
pub enum Resolution<T> {
    /// A provider returned a valid result.
    Fetched {
        value: T,
        source: String,
        diagnostics: FetchDiagnostics,
    },
    /// Every eligible provider failed, or none was eligible.
    Failed {
        kind: FailureKind,
        message: String,
        diagnostics: FetchDiagnostics,
    },
    /// The gate closed before any provider was called.
    NotAttempted { diagnostics: FetchDiagnostics },
}

impl<T> Resolution<T> {
    pub fn diagnostics(&self) -> &FetchDiagnostics {
        match self {
            Resolution::Fetched { diagnostics, .. }
            | Resolution::Failed { diagnostics, .. }
            | Resolution::NotAttempted { diagnostics } => diagnostics,
        }
    }
}

pub type QuoteResolution = Resolution<PriceObservation>;
pub type HistoryResolution = Resolution<Vec<HistoricalPoint>>;

/// A provider slot in the registry. Unusable providers keep a descriptor so
/// diagnostics and health output can explain why they were skipped.
pub struct RegisteredProvider {
    pub descriptor: ProviderDescriptor,
    provider: Option<Arc<dyn MarketDataProvider>>,
}

impl RegisteredProvider {
    pub fn available(provider: Arc<dyn MarketDataProvider>, priority: u8, enabled: bool) -> Self {
        let capabilities = provider.capabilities();
        Self {
            descriptor: ProviderDescriptor {
                id: Cow::Borrowed(provider.id()),
                priority,
                has_credentials: true,
                quota_class: capabilities.quota_class,
                rate_limit: provider.rate_limit(),
                enabled,
            },
            provider: Some(provider),
        }
    }

    /// A provider that could not be constructed, usually for lack of a key.
    pub fn unconfigured(id: ProviderId, priority: u8, quota_class: QuotaClass, enabled: bool) -> Self {
        Self {
            descriptor: ProviderDescriptor {
                id,
                priority,
                has_credentials: false,
                quota_class,
                rate_limit: RateLimit::default(),
                enabled,
            },
            provider: None,
        }
    }

    fn usable(&self) -> Option<&Arc<dyn MarketDataProvider>> {
        if self.descriptor.is_usable() {
            self.provider.as_ref()
        } else {
            None
        }
    }
}

/// Provider registry for orchestrating market data fetching.
pub struct ProviderRegistry {
    entries: Vec<RegisteredProvider>,
    rate_limiter: Arc<RateLimiter>,
    validator: QuoteValidator,
    provider_timeout: Duration,
}

impl ProviderRegistry {
    /// Create a registry. Entries are ordered by `(priority, id)` and their
    /// quotas are pushed into the rate limiter.
    pub fn new(mut entries: Vec<RegisteredProvider>, rate_limiter: Arc<RateLimiter>) -> Self {
        entries.sort_by(|a, b| {
            a.descriptor
                .priority
                .cmp(&b.descriptor.priority)
                .then_with(|| a.descriptor.id.cmp(&b.descriptor.id))
        });

        for entry in entries.iter().filter(|e| e.provider.is_some()) {
            rate_limiter.configure(&entry.descriptor.id, entry.descriptor.rate_limit.clone());
        }

        info!(
            "Provider registry initialized: [{}]",
            entries
                .iter()
                .map(|e| format!(
                    "{}{}",
                    e.descriptor.id,
                    if e.descriptor.is_usable() { "" } else { " (inactive)" }
                ))
                .collect::<Vec<_>>()
                .join(", ")
        );

        Self {
            entries,
            rate_limiter,
            validator: QuoteValidator::new(),
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Descriptors in priority order.
    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        self.entries.iter().map(|e| e.descriptor.clone()).collect()
    }

    pub fn usable_count(&self) -> usize {
        self.entries.iter().filter(|e| e.usable().is_some()).count()
    }

    pub fn contains(&self, provider_id: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.descriptor.id.eq_ignore_ascii_case(provider_id))
    }

    /// Resolve the latest price for `symbol`, optionally restricted to one source.
    pub async fn resolve_quote(
        &self,
        symbol: &str,
        scope: &RunScope,
        gate: &dyn AttemptGate,
        only: Option<&str>,
    ) -> QuoteResolution {
        let validator = &self.validator;
        self.run_chain(symbol, scope, gate, only, false, |provider| async move {
            let observation = provider.fetch_quote(symbol).await?;
            validator.validate(&observation)?;
            Ok(observation)
        })
        .await
    }

    /// Resolve daily history for `symbol` over `start..=end`.
    ///
    /// Invalid points are dropped; an empty remainder counts as `NotFound`.
    pub async fn resolve_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        scope: &RunScope,
        gate: &dyn AttemptGate,
        only: Option<&str>,
    ) -> HistoryResolution {
        let validator = &self.validator;
        self.run_chain(symbol, scope, gate, only, true, |provider| async move {
            let points = provider.fetch_history(symbol, start, end).await?;
            let points = validator.filter_points(points);
            if points.is_empty() {
                return Err(MarketDataError::not_found(provider.id(), symbol));
            }
            Ok(points)
        })
        .await
    }

    async fn run_chain<T, F, Fut>(
        &self,
        symbol: &str,
        scope: &RunScope,
        gate: &dyn AttemptGate,
        only: Option<&str>,
        needs_history: bool,
        call: F,
    ) -> Resolution<T>
    where
        F: Fn(Arc<dyn MarketDataProvider>) -> Fut,
        Fut: Future<Output = Result<T, MarketDataError>>,
    {
        let mut diagnostics = FetchDiagnostics::new();
        let mut budget_stopped = false;

        let candidates = self
            .entries
            .iter()
            .filter(|e| only.map_or(true, |id| e.descriptor.id.eq_ignore_ascii_case(id)));

        for entry in candidates {
            let provider_id = entry.descriptor.id.clone();

            let skip = if !entry.descriptor.enabled {
                Some(SkipReason::Disabled)
            } else if !entry.descriptor.has_credentials {
                Some(SkipReason::NotConfigured)
            } else if scope.is_unauthorized(&provider_id) {
                Some(SkipReason::UnauthorizedThisRun)
            } else if needs_history
                && !entry.usable().is_some_and(|p| p.capabilities().supports_history)
            {
                Some(SkipReason::HistoricalNotSupported)
            } else {
                None
            };
            if let Some(reason) = skip {
                debug!("Skipping provider '{}' for {}: {}", provider_id, symbol, reason);
                diagnostics.record_skip(provider_id, reason);
                continue;
            }

            let Some(provider) = entry.usable() else {
                continue;
            };

            if !gate.may_attempt() {
                diagnostics.record_skip(provider_id, SkipReason::BudgetExhausted);
                budget_stopped = true;
                break;
            }

            let max_wait = gate.call_timeout(self.rate_limiter.profile().max_wait());
            if let Err(e) = self.rate_limiter.acquire_within(&provider_id, max_wait).await {
                warn!("Provider '{}' unavailable for {}: {}", provider_id, symbol, e);
                diagnostics.record_failure(provider_id, e.kind(), e.to_string());
                continue;
            }

            let timeout = gate.call_timeout(self.provider_timeout);
            if timeout.is_zero() {
                diagnostics.record_skip(provider_id, SkipReason::BudgetExhausted);
                budget_stopped = true;
                break;
            }

            debug!("Fetching {} from provider '{}'", symbol, provider_id);
            let result = match tokio::time::timeout(timeout, call(Arc::clone(provider))).await {
                Ok(result) => result,
                Err(_) => Err(MarketDataError::transient(
                    &provider_id,
                    format!("call timed out after {:?}", timeout),
                )),
            };

            match result {
                Ok(value) => {
                    self.rate_limiter.record_success(&provider_id);
                    diagnostics.record_success(provider_id.clone());
                    debug!("Resolved {} via {} ({})", symbol, provider_id, diagnostics.summary());
                    return Resolution::Fetched {
                        value,
                        source: provider_id.into_owned(),
                        diagnostics,
                    };
                }
                Err(e) => {
                    let kind = e.kind();
                    match kind {
                        FailureKind::Unauthorized => {
                            warn!(
                                "Provider '{}' rejected credentials: {}; skipping it for the rest of this run",
                                provider_id, e
                            );
                            scope.mark_unauthorized(&provider_id);
                        }
                        FailureKind::RateLimited => {
                            self.rate_limiter.penalize(&provider_id);
                        }
                        _ => debug!("Provider '{}' failed for {}: {}", provider_id, symbol, e),
                    }
                    diagnostics.record_failure(provider_id, kind, e.to_string());
                }
            }
        }

        if let Some(kind) = diagnostics.most_specific_failure() {
            let message = diagnostics.message_for(kind).unwrap_or_default().to_string();
            return Resolution::Failed {
                kind,
                message,
                diagnostics,
            };
        }

        if budget_stopped {
            return Resolution::NotAttempted { diagnostics };
        }

        let skipped_unauthorized = diagnostics
            .skip_reasons()
            .iter()
            .any(|(_, r)| **r == SkipReason::UnauthorizedThisRun);
        if skipped_unauthorized {
            return Resolution::Failed {
                kind: FailureKind::Unauthorized,
                message: "credentials rejected earlier in this run".to_string(),
                diagnostics,
            };
        }

        let err = MarketDataError::NoProvidersAvailable;
        Resolution::Failed {
            kind: err.kind(),
            message: err.to_string(),
            diagnostics,
        }
    }
}
