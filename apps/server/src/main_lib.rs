use std::sync::Arc;

use tokio::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::{config::Config, credentials::EnvCredentialSource};
use quotewarden_core::{
    calendar::CalendarService,
    prices::{PersistenceWriter, PriceStore, WatchListStore},
    refresh::{BatchController, HistoryBackfill},
    EngineContext, HttpProviderFactory, ProviderFactory,
};
use quotewarden_storage_sqlite::{
    db, ConfigRepository, PriceRepository, WatchListRepository,
};

pub struct AppState {
    pub engine: Arc<EngineContext>,
    pub controller: BatchController,
    pub backfill: HistoryBackfill,
    pub calendar: Arc<CalendarService>,
    pub safety_buffer_seconds: f64,
    pub default_hard_limit_seconds: f64,
    /// Held for the duration of an invocation; a second caller gets 409.
    pub in_flight: Mutex<()>,
    pub db_path: String,
}

pub fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    build_state_with(config, Arc::new(HttpProviderFactory)).await
}

/// Wires storage, the engine context and the runners around `factory`.
pub async fn build_state_with(
    config: &Config,
    factory: Arc<dyn ProviderFactory>,
) -> anyhow::Result<Arc<AppState>> {
    let db_path = db::init(&config.db_path)?;
    tracing::info!("Database path in use: {}", db_path);

    let pool = db::create_pool(&db_path)?;
    db::run_migrations(&pool)?;
    let writer = db::spawn_writer((*pool).clone());

    let prices: Arc<dyn PriceStore> = Arc::new(PriceRepository::new(pool.clone(), writer.clone()));
    let watch_list: Arc<dyn WatchListStore> =
        Arc::new(WatchListRepository::new(pool.clone(), writer.clone()));
    let config_store = Arc::new(ConfigRepository::new(pool.clone(), writer.clone()));
    let calendar = Arc::new(CalendarService::new(config_store, &config.market));

    let engine = Arc::new(EngineContext::with_factory(
        config.engine.clone(),
        Arc::new(EnvCredentialSource::from_config(config)),
        factory,
    ));
    let registry = engine.registry();
    tracing::info!(
        "Engine ready: {} of {} provider(s) usable, backoff profile {:?}",
        registry.usable_count(),
        registry.descriptors().len(),
        config.engine.backoff_profile
    );

    let controller = BatchController::new(
        engine.clone(),
        prices.clone(),
        watch_list.clone(),
        calendar.clone(),
        config.batch.clone(),
    );
    let backfill = HistoryBackfill::new(engine.clone(), watch_list, PersistenceWriter::new(prices));

    Ok(Arc::new(AppState {
        engine,
        controller,
        backfill,
        calendar,
        safety_buffer_seconds: config.safety_buffer_seconds,
        default_hard_limit_seconds: config.default_hard_limit_seconds,
        in_flight: Mutex::new(()),
        db_path,
    }))
}
