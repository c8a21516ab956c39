use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::{error::ApiResult, main_lib::AppState};
use quotewarden_market_data::{BackoffProfile, ProviderDescriptor};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    backoff_profile: BackoffProfile,
    usable_providers: usize,
    providers: Vec<ProviderDescriptor>,
    market: String,
    trading_today: bool,
    invocation_running: bool,
}

/// Reports configuration only; never calls a provider.
async fn get_health(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    let registry = state.engine.registry();
    let usable_providers = registry.usable_count();
    Ok(Json(HealthResponse {
        status: if usable_providers > 0 { "ok" } else { "degraded" },
        backoff_profile: state.engine.settings().backoff_profile,
        usable_providers,
        providers: registry.descriptors(),
        market: state.calendar.market().to_string(),
        trading_today: state.calendar.is_trading_today(Utc::now()),
        invocation_running: state.in_flight.try_lock().is_err(),
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}
