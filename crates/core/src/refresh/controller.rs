//! Batch controller.
//!
//! Drives one refresh invocation through `Initializing -> Running -> Draining -> Done`:
//! load and filter the symbol set, resolve each symbol under the execution
//! budget, persist results and classify the run.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};

use quotewarden_market_data::{normalize_symbol, ProviderRegistry, Resolution, RunScope};

use super::outcome::{BatchSummary, ErrorKind, FetchOutcome, OutcomeStatus};
use super::request::RefreshRequest;
use crate::budget::ExecutionBudget;
use crate::calendar::CalendarService;
use crate::constants::{DEFAULT_MAX_SYMBOLS_PER_RUN, DEFAULT_STALENESS_MINUTES};
use crate::context::EngineContext;
use crate::errors::{Error, Result};
use crate::prices::{PersistenceWriter, PriceStore, WatchListStore};

/// Tuning for a refresh run.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    /// Symbols fetched more recently than this are skipped unless forced
    pub staleness: Duration,
    pub max_symbols_per_run: usize,
    /// Concurrent symbol resolutions; 1 resolves sequentially
    pub workers: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            staleness: Duration::minutes(DEFAULT_STALENESS_MINUTES),
            max_symbols_per_run: DEFAULT_MAX_SYMBOLS_PER_RUN,
            workers: 1,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BatchState {
    Initializing,
    Running,
    Draining,
    Done,
}

impl std::fmt::Display for BatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BatchState::Initializing => "initializing",
            BatchState::Running => "running",
            BatchState::Draining => "draining",
            BatchState::Done => "done",
        };
        f.write_str(s)
    }
}

pub struct BatchController {
    context: Arc<EngineContext>,
    prices: Arc<dyn PriceStore>,
    watch_list: Arc<dyn WatchListStore>,
    calendar: Arc<CalendarService>,
    writer: PersistenceWriter,
    settings: BatchSettings,
}

impl BatchController {
    pub fn new(
        context: Arc<EngineContext>,
        prices: Arc<dyn PriceStore>,
        watch_list: Arc<dyn WatchListStore>,
        calendar: Arc<CalendarService>,
        settings: BatchSettings,
    ) -> Self {
        Self {
            writer: PersistenceWriter::new(prices.clone()),
            context,
            prices,
            watch_list,
            calendar,
            settings,
        }
    }

    /// Run one refresh invocation.
    ///
    /// Provider and persistence failures become per-symbol outcomes; only an
    /// engine-level fault (no usable provider, unreadable watch list) or an
    /// invalid request is returned as an error.
    pub async fn run(&self, request: &RefreshRequest, budget: &ExecutionBudget) -> Result<BatchSummary> {
        info!("Batch state: {}", BatchState::Initializing);

        let registry = self.context.registry();
        if registry.usable_count() == 0 {
            return Err(Error::EngineFatal(
                "no market data provider is configured".to_string(),
            ));
        }
        if let Some(source) = &request.source {
            if !registry.contains(source) {
                return Err(Error::InvalidRequest(format!("unknown source '{}'", source)));
            }
        }

        let symbols = load_symbols(request.symbols.as_deref(), self.watch_list.as_ref())?;
        let now = Utc::now();
        let calendar = self.calendar.effective(now);
        let market_tz = calendar.tz();

        if !request.force_refresh && !calendar.is_trading_day(calendar.local_date(now)) {
            info!(
                "Not a trading day for market {}; {} symbol(s) left as is",
                self.calendar.market(),
                symbols.len()
            );
            let outcomes = symbols.iter().map(|s| FetchOutcome::skipped_stale(s)).collect();
            return Ok(self.finish(outcomes, Vec::new(), budget));
        }

        let (stale, fresh) = if request.force_refresh {
            (symbols, Vec::new())
        } else {
            self.partition_by_staleness(symbols, now)?
        };

        let (to_fetch, deferred) = cap_symbols(stale, self.settings.max_symbols_per_run);
        if !deferred.is_empty() {
            info!(
                "Per-run cap of {} reached; {} symbol(s) deferred",
                self.settings.max_symbols_per_run,
                deferred.len()
            );
        }

        info!(
            "Batch state: {} ({} to fetch, {} fresh)",
            BatchState::Running,
            to_fetch.len(),
            fresh.len()
        );

        let scope = RunScope::new();
        let draining = AtomicBool::new(false);
        let source = request.source.as_deref();
        let registry = registry.as_ref();

        let mut results: Vec<(usize, FetchOutcome)> = stream::iter(0..to_fetch.len())
            .map(|index| {
                let symbol = to_fetch[index].as_str();
                let scope = &scope;
                let draining = &draining;
                async move {
                    if budget.should_stop() {
                        if !draining.swap(true, Ordering::SeqCst) {
                            debug!(
                                "Budget reached the safety buffer ({:.1}s remaining)",
                                budget.remaining_seconds()
                            );
                        }
                        return (index, FetchOutcome::skipped_timeout(symbol));
                    }
                    let outcome = self
                        .process_symbol(symbol, registry, scope, budget, source, market_tz)
                        .await;
                    (index, outcome)
                }
            })
            .buffer_unordered(self.settings.workers.max(1))
            .collect()
            .await;
        results.sort_by_key(|(index, _)| *index);

        let mut outcomes: Vec<FetchOutcome> = results.into_iter().map(|(_, o)| o).collect();
        let unattempted = outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::SkippedTimeout)
            .count();
        if unattempted > 0 {
            warn!(
                "Batch state: {} ({} symbol(s) unattempted, {:.1}s remaining)",
                BatchState::Draining,
                unattempted,
                budget.remaining_seconds()
            );
        }

        outcomes.extend(fresh.iter().map(|s| FetchOutcome::skipped_stale(s)));

        let unauthorized = scope.unauthorized_providers();
        if !unauthorized.is_empty() {
            warn!("Providers rejected credentials this run: {}", unauthorized.join(", "));
        }

        Ok(self.finish(outcomes, deferred, budget))
    }

    async fn process_symbol(
        &self,
        symbol: &str,
        registry: &ProviderRegistry,
        scope: &RunScope,
        budget: &ExecutionBudget,
        source: Option<&str>,
        market_tz: Tz,
    ) -> FetchOutcome {
        match registry.resolve_quote(symbol, scope, budget, source).await {
            Resolution::Fetched {
                value,
                source,
                diagnostics,
            } => match self.writer.record_fetch(&value, market_tz).await {
                Ok(_) => FetchOutcome::fetched(symbol, &source, value.price, diagnostics.summary()),
                Err(e) => FetchOutcome::failed(
                    symbol,
                    ErrorKind::PersistenceError,
                    e.to_string(),
                    Some(diagnostics.summary()),
                ),
            },
            Resolution::Failed {
                kind,
                message,
                diagnostics,
            } => {
                debug!("{} failed ({}): {}", symbol, kind, diagnostics.summary());
                FetchOutcome::failed(symbol, kind.into(), message, Some(diagnostics.summary()))
            }
            Resolution::NotAttempted { .. } => FetchOutcome::skipped_timeout(symbol),
        }
    }

    /// Split into (stale, fresh) using each symbol's last fetch time.
    fn partition_by_staleness(
        &self,
        symbols: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<(Vec<String>, Vec<String>)> {
        let last_fetched = self.prices.last_fetched(&symbols).map_err(|e| {
            Error::EngineFatal(format!("failed to read last fetch times: {}", e))
        })?;
        let threshold = now - self.settings.staleness;

        Ok(symbols.into_iter().partition(|symbol| {
            last_fetched
                .get(symbol)
                .map_or(true, |fetched_at| *fetched_at <= threshold)
        }))
    }

    fn finish(
        &self,
        outcomes: Vec<FetchOutcome>,
        deferred: Vec<String>,
        budget: &ExecutionBudget,
    ) -> BatchSummary {
        let summary =
            BatchSummary::from_outcomes(outcomes, deferred, budget.elapsed().as_secs_f64());
        info!(
            "Batch state: {} - {:?}: {} fetched, {} failed, {} skipped of {} in {:.1}s",
            BatchState::Done,
            summary.status,
            summary.fetched,
            summary.failed,
            summary.skipped,
            summary.total_considered,
            summary.elapsed_seconds
        );
        summary
    }
}

/// Normalized, de-duplicated symbols from the request, or the enabled watch list.
pub(crate) fn load_symbols(
    requested: Option<&[String]>,
    watch_list: &dyn WatchListStore,
) -> Result<Vec<String>> {
    let raw: Vec<String> = match requested {
        Some(symbols) => symbols.to_vec(),
        None => watch_list
            .list_enabled()
            .map_err(|e| Error::EngineFatal(format!("failed to load watch list: {}", e)))?
            .into_iter()
            .map(|entry| entry.symbol)
            .collect(),
    };

    let mut seen = HashSet::new();
    let mut symbols = Vec::with_capacity(raw.len());
    for value in raw {
        match normalize_symbol(&value) {
            Some(symbol) => {
                if seen.insert(symbol.clone()) {
                    symbols.push(symbol);
                }
            }
            None => warn!("Ignoring invalid symbol {:?}", value),
        }
    }
    Ok(symbols)
}

fn cap_symbols(mut symbols: Vec<String>, max: usize) -> (Vec<String>, Vec<String>) {
    if symbols.len() <= max {
        return (symbols, Vec::new());
    }
    let deferred = symbols.split_off(max);
    (symbols, deferred)
}
