//! Engine context.
//!
//! One instance per process holds the credential cache, the rate limiter and
//! the provider registry. Invocations within a warm process reuse it; a cold
//! process rebuilds it from settings. [`EngineContext::reset`] drops all cached
//! state and rebuilds the registry.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use log::{debug, info, warn};

use quotewarden_market_data::provider::{alpha_vantage, finnhub, marketdata_app, twelve_data, yahoo};
use quotewarden_market_data::{
    AlphaVantageProvider, BackoffProfile, CredentialResolver, CredentialSource, FinnhubProvider,
    MarketDataAppProvider, MarketDataError, MarketDataProvider, ProviderRegistry, QuotaClass,
    RateLimiter, RegisteredProvider, TwelveDataProvider, YahooProvider,
};

use crate::constants::{DEFAULT_PROVIDER_ORDER, DEFAULT_PROVIDER_TIMEOUT_SECS};

/// Provider-related settings for the engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Fixed priority order; earlier ids are tried first
    pub provider_order: Vec<String>,
    pub disabled_providers: HashSet<String>,
    pub backoff_profile: BackoffProfile,
    /// Per-call ceiling; the budget may shorten it further
    pub provider_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            provider_order: DEFAULT_PROVIDER_ORDER.iter().map(|s| s.to_string()).collect(),
            disabled_providers: HashSet::new(),
            backoff_profile: BackoffProfile::default(),
            provider_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
        }
    }
}

/// Builds provider instances from credentials.
pub trait ProviderFactory: Send + Sync {
    /// The provider for `id`, or `None` when it cannot run (missing key, unknown id).
    fn create(
        &self,
        id: &str,
        credentials: &CredentialResolver,
        timeout: Duration,
    ) -> Option<Arc<dyn MarketDataProvider>>;

    /// Quota class reported for providers that could not be created.
    fn quota_class(&self, id: &str) -> QuotaClass;
}

/// Factory for the five HTTP providers.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpProviderFactory;

fn shared<P: MarketDataProvider + 'static>(provider: P) -> Arc<dyn MarketDataProvider> {
    Arc::new(provider)
}

impl ProviderFactory for HttpProviderFactory {
    fn create(
        &self,
        id: &str,
        credentials: &CredentialResolver,
        timeout: Duration,
    ) -> Option<Arc<dyn MarketDataProvider>> {
        let key = if id == yahoo::PROVIDER_ID {
            None
        } else {
            let Some(key) = credentials.get_key(id) else {
                debug!("Provider {} requires API key but none found, skipping", id);
                return None;
            };
            Some(key)
        };

        let created: Result<Arc<dyn MarketDataProvider>, MarketDataError> = match (id, key) {
            (yahoo::PROVIDER_ID, _) => YahooProvider::new(timeout).map(shared),
            (finnhub::PROVIDER_ID, Some(key)) => FinnhubProvider::new(key, timeout).map(shared),
            (marketdata_app::PROVIDER_ID, Some(key)) => {
                MarketDataAppProvider::new(key, timeout).map(shared)
            }
            (twelve_data::PROVIDER_ID, Some(key)) => {
                TwelveDataProvider::new(key, timeout).map(shared)
            }
            (alpha_vantage::PROVIDER_ID, Some(key)) => {
                AlphaVantageProvider::new(key, timeout).map(shared)
            }
            (other, _) => {
                warn!("Unknown market data provider '{}', ignoring", other);
                return None;
            }
        };

        match created {
            Ok(provider) => Some(provider),
            Err(e) => {
                warn!("Failed to initialize provider {}: {}", id, e);
                None
            }
        }
    }

    fn quota_class(&self, id: &str) -> QuotaClass {
        match id {
            yahoo::PROVIDER_ID => QuotaClass::Keyless,
            marketdata_app::PROVIDER_ID => QuotaClass::Tiered,
            _ => QuotaClass::FreeTier,
        }
    }
}

/// Process-wide engine state.
pub struct EngineContext {
    settings: EngineSettings,
    credentials: Arc<CredentialResolver>,
    rate_limiter: Arc<RateLimiter>,
    factory: Arc<dyn ProviderFactory>,
    registry: RwLock<Arc<ProviderRegistry>>,
}

impl EngineContext {
    pub fn new(settings: EngineSettings, source: Arc<dyn CredentialSource>) -> Self {
        Self::with_factory(settings, source, Arc::new(HttpProviderFactory))
    }

    pub fn with_factory(
        settings: EngineSettings,
        source: Arc<dyn CredentialSource>,
        factory: Arc<dyn ProviderFactory>,
    ) -> Self {
        let credentials = Arc::new(CredentialResolver::new(source));
        let rate_limiter = Arc::new(RateLimiter::new(settings.backoff_profile));
        let registry = build_registry(&settings, &credentials, &rate_limiter, factory.as_ref());

        Self {
            settings,
            credentials,
            rate_limiter,
            factory,
            registry: RwLock::new(Arc::new(registry)),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn credentials(&self) -> &Arc<CredentialResolver> {
        &self.credentials
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Snapshot of the current registry.
    pub fn registry(&self) -> Arc<ProviderRegistry> {
        self.registry
            .read()
            .unwrap_or_else(|poisoned| {
                warn!("Provider registry lock was poisoned, recovering");
                poisoned.into_inner()
            })
            .clone()
    }

    /// Clear the credential cache and rate-limiter state, then rebuild the registry.
    pub fn reset(&self) {
        self.credentials.reset();
        self.rate_limiter.reset_all();
        let registry = build_registry(
            &self.settings,
            &self.credentials,
            &self.rate_limiter,
            self.factory.as_ref(),
        );
        *self.registry.write().unwrap_or_else(|poisoned| {
            warn!("Provider registry lock was poisoned, recovering");
            poisoned.into_inner()
        }) = Arc::new(registry);
        info!("Engine context reset");
    }
}

fn build_registry(
    settings: &EngineSettings,
    credentials: &CredentialResolver,
    rate_limiter: &Arc<RateLimiter>,
    factory: &dyn ProviderFactory,
) -> ProviderRegistry {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for (index, raw_id) in settings.provider_order.iter().enumerate() {
        let id = raw_id.trim().to_ascii_uppercase();
        if id.is_empty() || !seen.insert(id.clone()) {
            continue;
        }
        let priority = u8::try_from(index).unwrap_or(u8::MAX);
        let enabled = !settings
            .disabled_providers
            .iter()
            .any(|d| d.eq_ignore_ascii_case(&id));

        let entry = match factory.create(&id, credentials, settings.provider_timeout) {
            Some(provider) => RegisteredProvider::available(provider, priority, enabled),
            None => RegisteredProvider::unconfigured(
                id.clone().into(),
                priority,
                factory.quota_class(&id),
                enabled,
            ),
        };
        entries.push(entry);
    }

    ProviderRegistry::new(entries, Arc::clone(rate_limiter))
        .with_provider_timeout(settings.provider_timeout)
}
