use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::de::DeserializeOwned;
use tokio::sync::MutexGuard;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};
use quotewarden_core::{
    refresh::{BackfillRequest, BackfillSummary, BatchSummary, RefreshRequest},
    ExecutionBudget,
};

fn claim_invocation(state: &AppState) -> ApiResult<MutexGuard<'_, ()>> {
    state
        .in_flight
        .try_lock()
        .map_err(|_| ApiError::Conflict("another invocation is already running".to_string()))
}

/// Parses a JSON body. A blank body yields `empty`, or a 400 when there is none.
fn parse_body<T: DeserializeOwned>(body: &Bytes, empty: Option<T>) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return empty.ok_or_else(|| ApiError::BadRequest("request body is required".to_string()));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid body: {}", e)))
}

fn budget_for(state: &AppState, hard_limit_seconds: Option<f64>) -> ExecutionBudget {
    ExecutionBudget::from_secs(
        hard_limit_seconds.unwrap_or(state.default_hard_limit_seconds),
        state.safety_buffer_seconds,
    )
}

async fn refresh_prices(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<BatchSummary>)> {
    let request: RefreshRequest = parse_body(&body, Some(RefreshRequest::default()))?;
    let _guard = claim_invocation(&state)?;
    let budget = budget_for(&state, request.hard_limit_seconds);

    let run_id = Uuid::new_v4();
    let summary = state
        .controller
        .run(&request, &budget)
        .instrument(info_span!("refresh", %run_id))
        .await?;

    info!(
        "Refresh {} finished: {:?} fetched={} failed={} skipped={} unattempted={} in {:.1}s",
        run_id,
        summary.status,
        summary.fetched,
        summary.failed,
        summary.skipped,
        summary.unattempted.len(),
        summary.elapsed_seconds
    );
    let status = StatusCode::from_u16(summary.http_status).unwrap_or(StatusCode::OK);
    Ok((status, Json(summary)))
}

async fn backfill_history(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<BackfillSummary>)> {
    let request: BackfillRequest = parse_body(&body, None)?;
    let _guard = claim_invocation(&state)?;
    let budget = budget_for(&state, request.hard_limit_seconds);

    let run_id = Uuid::new_v4();
    let summary = state
        .backfill
        .run(&request, &budget)
        .instrument(info_span!("backfill", %run_id))
        .await?;

    info!(
        "Backfill {} finished: completed={} failed={} remaining={} points={}",
        run_id,
        summary.completed.len(),
        summary.failed.len(),
        summary.remaining.len(),
        summary.points_written
    );
    let status = if summary.budget_expired {
        StatusCode::PARTIAL_CONTENT
    } else if !summary.failed.is_empty() {
        StatusCode::MULTI_STATUS
    } else {
        StatusCode::OK
    };
    Ok((status, Json(summary)))
}

/// Drops cached credentials and limiter state, then rebuilds the provider registry.
async fn reset_engine(State(state): State<Arc<AppState>>) -> ApiResult<StatusCode> {
    let _guard = claim_invocation(&state)?;
    state.engine.reset();
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/refresh", post(refresh_prices))
        .route("/backfill", post(backfill_history))
        .route("/engine/reset", post(reset_engine))
}
