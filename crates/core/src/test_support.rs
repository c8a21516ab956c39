//! In-memory mocks shared by the core unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use quotewarden_market_data::{
    CredentialResolver, CredentialSource, FailureKind, HistoricalPoint, MarketDataError,
    MarketDataProvider, PriceObservation, ProviderCapabilities, QuotaClass, RateLimit,
};

use crate::calendar::{ConfigEntry, ConfigStore};
use crate::context::ProviderFactory;
use crate::errors::{Error, Result};
use crate::prices::{CurrentPrice, PriceStore, UpsertOutcome, WatchListEntry, WatchListStore};

// =========================================================================
// Mock PriceStore
// =========================================================================

#[derive(Clone, Default)]
pub struct MockPriceStore {
    current: Arc<Mutex<HashMap<String, CurrentPrice>>>,
    history: Arc<Mutex<BTreeMap<(String, NaiveDate), HistoricalPoint>>>,
    fail_on_write: Arc<Mutex<bool>>,
}

impl MockPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_write(&self, fail: bool) {
        *self.fail_on_write.lock().unwrap() = fail;
    }

    /// Pretend `symbol` was fetched at `at`.
    pub fn mark_fetched(&self, symbol: &str, price: Decimal, at: DateTime<Utc>) {
        self.current.lock().unwrap().insert(
            symbol.to_string(),
            CurrentPrice {
                symbol: symbol.to_string(),
                price,
                open: None,
                high: None,
                low: None,
                volume: None,
                currency: None,
                observed_at: at,
                source: "SEED".to_string(),
                last_fetched_at: at,
            },
        );
    }

    pub fn history(&self) -> Vec<HistoricalPoint> {
        self.history.lock().unwrap().values().cloned().collect()
    }

    fn check_write(&self) -> Result<()> {
        if *self.fail_on_write.lock().unwrap() {
            return Err(Error::Unexpected("Intentional write failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl PriceStore for MockPriceStore {
    async fn upsert_current(
        &self,
        observation: &PriceObservation,
        fetched_at: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        self.check_write()?;
        let mut current = self.current.lock().unwrap();
        if let Some(existing) = current.get_mut(&observation.symbol) {
            if existing.observed_at > observation.timestamp {
                existing.last_fetched_at = fetched_at;
                return Ok(UpsertOutcome::KeptNewer);
            }
        }
        current.insert(
            observation.symbol.clone(),
            CurrentPrice {
                symbol: observation.symbol.clone(),
                price: observation.price,
                open: observation.open,
                high: observation.high,
                low: observation.low,
                volume: observation.volume,
                currency: observation.currency.clone(),
                observed_at: observation.timestamp,
                source: observation.source.clone(),
                last_fetched_at: fetched_at,
            },
        );
        Ok(UpsertOutcome::Applied)
    }

    async fn append_history(&self, points: &[HistoricalPoint]) -> Result<usize> {
        self.check_write()?;
        let mut history = self.history.lock().unwrap();
        for point in points {
            history.insert((point.symbol.clone(), point.date), point.clone());
        }
        Ok(points.len())
    }

    fn get_current(&self, symbol: &str) -> Result<Option<CurrentPrice>> {
        Ok(self.current.lock().unwrap().get(symbol).cloned())
    }

    fn last_fetched(&self, symbols: &[String]) -> Result<HashMap<String, DateTime<Utc>>> {
        let current = self.current.lock().unwrap();
        Ok(symbols
            .iter()
            .filter_map(|s| current.get(s).map(|c| (s.clone(), c.last_fetched_at)))
            .collect())
    }

    fn history_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalPoint>> {
        Ok(self
            .history
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.symbol == symbol && p.date >= start && p.date <= end)
            .cloned()
            .collect())
    }
}

// =========================================================================
// Mock WatchListStore
// =========================================================================

#[derive(Clone, Default)]
pub struct MockWatchList {
    entries: Arc<Mutex<Vec<WatchListEntry>>>,
}

impl MockWatchList {
    pub fn with_symbols(symbols: &[&str]) -> Self {
        let entries = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| WatchListEntry::new(s, i as i32))
            .collect();
        Self {
            entries: Arc::new(Mutex::new(entries)),
        }
    }
}

#[async_trait]
impl WatchListStore for MockWatchList {
    fn list_enabled(&self) -> Result<Vec<WatchListEntry>> {
        let mut entries: Vec<_> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.enabled)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.symbol.cmp(&b.symbol)));
        Ok(entries)
    }

    async fn upsert_entry(&self, entry: &WatchListEntry) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|e| e.symbol != entry.symbol);
        entries.push(entry.clone());
        Ok(())
    }
}

// =========================================================================
// Mock ConfigStore
// =========================================================================

#[derive(Clone, Default)]
pub struct MockConfigStore {
    entries: Arc<Mutex<HashMap<(String, String), ConfigEntry>>>,
}

impl MockConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MockConfigStore {
    fn get_config(&self, config_type: &str, config_key: &str) -> Result<Option<ConfigEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(&(config_type.to_string(), config_key.to_string()))
            .cloned())
    }

    async fn put_config(&self, entry: &ConfigEntry) -> Result<()> {
        self.entries.lock().unwrap().insert(
            (entry.config_type.clone(), entry.config_key.clone()),
            entry.clone(),
        );
        Ok(())
    }
}

// =========================================================================
// Mock credentials
// =========================================================================

#[derive(Default)]
pub struct MockCredentials {
    keys: Mutex<HashMap<String, String>>,
}

impl MockCredentials {
    pub fn with_keys(keys: &[(&str, &str)]) -> Self {
        Self {
            keys: Mutex::new(
                keys.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
        }
    }

    pub fn set_key(&self, id: &str, key: &str) {
        self.keys
            .lock()
            .unwrap()
            .insert(id.to_string(), key.to_string());
    }
}

impl CredentialSource for MockCredentials {
    fn load_bundle(&self) -> Option<HashMap<String, String>> {
        Some(self.keys.lock().unwrap().clone())
    }

    fn setting(&self, _name: &str) -> Option<String> {
        None
    }
}

// =========================================================================
// Mock providers
// =========================================================================

#[derive(Clone, Debug)]
pub enum Behavior {
    Price(Decimal),
    Fail(FailureKind),
    /// Answer with the price after a delay.
    Slow(Duration, Decimal),
}

pub struct MockProvider {
    id: &'static str,
    default: Behavior,
    per_symbol: HashMap<String, Behavior>,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(id: &'static str, default: Behavior) -> Self {
        Self {
            id,
            default,
            per_symbol: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_symbol(mut self, symbol: &str, behavior: Behavior) -> Self {
        self.per_symbol.insert(symbol.to_string(), behavior);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn respond(&self, symbol: &str) -> std::result::Result<Decimal, MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.per_symbol.get(symbol).unwrap_or(&self.default);
        match behavior {
            Behavior::Price(p) => Ok(*p),
            Behavior::Slow(delay, p) => {
                tokio::time::sleep(*delay).await;
                Ok(*p)
            }
            Behavior::Fail(kind) => Err(match kind {
                FailureKind::Unauthorized => MarketDataError::Unauthorized {
                    provider: self.id.to_string(),
                    message: "invalid key".to_string(),
                },
                FailureKind::RateLimited => MarketDataError::RateLimited {
                    provider: self.id.to_string(),
                },
                FailureKind::NotFound => MarketDataError::not_found(self.id, symbol),
                FailureKind::Transient => MarketDataError::transient(self.id, "503"),
                FailureKind::Malformed => MarketDataError::malformed(self.id, "garbage"),
            }),
        }
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::quotes_and_history(QuotaClass::FreeTier)
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::per_minute(10_000)
    }

    async fn fetch_quote(
        &self,
        symbol: &str,
    ) -> std::result::Result<PriceObservation, MarketDataError> {
        let price = self.respond(symbol).await?;
        Ok(PriceObservation::new(symbol, price, Utc::now(), self.id))
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> std::result::Result<Vec<HistoricalPoint>, MarketDataError> {
        let price = self.respond(symbol).await?;
        Ok(start
            .iter_days()
            .take_while(|d| *d <= end)
            .map(|d| HistoricalPoint::new(symbol, d, price, self.id))
            .collect())
    }
}

/// Hands out pre-built mock providers; an id without a configured key yields `None`
/// unless the provider is registered as keyless.
#[derive(Default)]
pub struct MockFactory {
    providers: HashMap<String, Arc<MockProvider>>,
    keyless: Vec<String>,
}

impl MockFactory {
    /// Factory whose providers answer every symbol with a fixed price.
    pub fn new(ids: &[&'static str]) -> Self {
        let mut factory = Self::default();
        for id in ids {
            factory = factory.with_provider(Arc::new(MockProvider::new(
                id,
                Behavior::Price(Decimal::ONE),
            )));
        }
        factory
    }

    pub fn with_provider(mut self, provider: Arc<MockProvider>) -> Self {
        self.providers.insert(provider.id.to_string(), provider);
        self
    }

    pub fn keyless(mut self, id: &str) -> Self {
        self.keyless.push(id.to_string());
        self
    }
}

impl ProviderFactory for MockFactory {
    fn create(
        &self,
        id: &str,
        credentials: &CredentialResolver,
        _timeout: Duration,
    ) -> Option<Arc<dyn MarketDataProvider>> {
        let provider = self.providers.get(id)?;
        if !self.keyless.iter().any(|k| k == id) && credentials.get_key(id).is_none() {
            return None;
        }
        Some(provider.clone() as Arc<dyn MarketDataProvider>)
    }

    fn quota_class(&self, _id: &str) -> QuotaClass {
        QuotaClass::FreeTier
    }
}
