//! Sliding-window rate limiter for market data providers.
//!
//! Each provider keeps a log of dispatch instants. A call is admitted only when
//! fewer than `requests` calls were dispatched in the trailing `interval`, so at
//! most N calls land in any T-second window regardless of how many symbols are
//! resolved concurrently. Provider-reported rate limits add an exponential
//! penalty on top of the steady-state pacing.
//!
//! State is process-local and best-effort; a cold process starts with empty windows.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use super::backoff::BackoffProfile;
use crate::errors::MarketDataError;
use crate::provider::RateLimit;

/// Dispatch log and penalty state for a single provider.
#[derive(Debug)]
struct ProviderWindow {
    limit: RateLimit,
    dispatched: VecDeque<Instant>,
    penalty_until: Option<Instant>,
    consecutive_penalties: u32,
}

impl ProviderWindow {
    fn new(limit: RateLimit) -> Self {
        Self {
            dispatched: VecDeque::with_capacity(limit.requests as usize),
            limit,
            penalty_until: None,
            consecutive_penalties: 0,
        }
    }

    /// Forget dispatches that left the window.
    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.dispatched.front() {
            if now.duration_since(*front) >= self.limit.interval {
                self.dispatched.pop_front();
            } else {
                break;
            }
        }
    }

    /// How long until the next call is allowed; zero when it may go now.
    fn time_until_available(&mut self, now: Instant) -> Duration {
        self.prune(now);

        let penalty_wait = self
            .penalty_until
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);

        let window_wait = if self.dispatched.len() < self.limit.requests as usize {
            Duration::ZERO
        } else {
            self.dispatched
                .front()
                .map(|oldest| (*oldest + self.limit.interval).saturating_duration_since(now))
                .unwrap_or(Duration::ZERO)
        };

        penalty_wait.max(window_wait)
    }
}

/// Per-provider request pacing.
pub struct RateLimiter {
    profile: BackoffProfile,
    windows: Mutex<HashMap<String, ProviderWindow>>,
}

impl RateLimiter {
    pub fn new(profile: BackoffProfile) -> Self {
        Self {
            profile,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn profile(&self) -> BackoffProfile {
        self.profile
    }

    /// Lock the windows mutex, recovering from poison if necessary.
    fn lock_windows(&self) -> MutexGuard<'_, HashMap<String, ProviderWindow>> {
        self.windows.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter windows mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Set the quota for a provider. Existing pacing state for it is dropped.
    pub fn configure(&self, provider: &str, limit: RateLimit) {
        self.lock_windows()
            .insert(provider.to_string(), ProviderWindow::new(limit));
    }

    /// Wait until the provider's next call is permitted, up to the profile's max wait.
    pub async fn acquire(&self, provider: &str) -> Result<(), MarketDataError> {
        self.acquire_within(provider, self.profile.max_wait()).await
    }

    /// Like [`acquire`](Self::acquire) with a caller-supplied ceiling, capped by the profile.
    ///
    /// Returns `RateLimited` without sleeping when the required wait exceeds
    /// the ceiling; no slot is consumed in that case.
    pub async fn acquire_within(
        &self,
        provider: &str,
        max_wait: Duration,
    ) -> Result<(), MarketDataError> {
        let ceiling = max_wait.min(self.profile.max_wait());
        let mut waited = Duration::ZERO;

        loop {
            let wait = {
                let mut windows = self.lock_windows();
                let window = windows
                    .entry(provider.to_string())
                    .or_insert_with(|| ProviderWindow::new(RateLimit::default()));

                let now = Instant::now();
                let wait = window.time_until_available(now);
                if wait.is_zero() {
                    window.dispatched.push_back(now);
                    debug!("Rate limiter: admitted call to '{}'", provider);
                    return Ok(());
                }
                wait
            };

            if waited + wait > ceiling {
                debug!(
                    "Rate limiter: '{}' needs {:?} more, over the {:?} ceiling",
                    provider, wait, ceiling
                );
                return Err(MarketDataError::RateLimited {
                    provider: provider.to_string(),
                });
            }

            debug!("Rate limiter: waiting {:?} for provider '{}'", wait, provider);
            tokio::time::sleep(wait).await;
            waited += wait;
        }
    }

    /// Record a provider-reported rate limit; pushes its next-allowed time out exponentially.
    pub fn penalize(&self, provider: &str) -> Duration {
        let mut windows = self.lock_windows();
        let window = windows
            .entry(provider.to_string())
            .or_insert_with(|| ProviderWindow::new(RateLimit::default()));

        window.consecutive_penalties = window.consecutive_penalties.saturating_add(1);
        let penalty = self.profile.penalty(window.consecutive_penalties);
        let until = Instant::now() + penalty;
        window.penalty_until = Some(match window.penalty_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });

        warn!(
            "Provider '{}' reported rate limiting ({} in a row), backing off {:?}",
            provider, window.consecutive_penalties, penalty
        );
        penalty
    }

    /// A successful call clears the consecutive-penalty counter.
    pub fn record_success(&self, provider: &str) {
        if let Some(window) = self.lock_windows().get_mut(provider) {
            window.consecutive_penalties = 0;
        }
    }

    /// Calls still available in the current window.
    pub fn remaining(&self, provider: &str) -> u32 {
        let mut windows = self.lock_windows();
        match windows.get_mut(provider) {
            Some(window) => {
                window.prune(Instant::now());
                window
                    .limit
                    .requests
                    .saturating_sub(window.dispatched.len() as u32)
            }
            None => RateLimit::default().requests,
        }
    }

    /// Clear dispatch history and penalties for every provider.
    pub fn reset_all(&self) {
        for window in self.lock_windows().values_mut() {
            *window = ProviderWindow::new(window.limit.clone());
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(BackoffProfile::default())
    }
}
