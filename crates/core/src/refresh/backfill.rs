//! History backfill.
//!
//! Fetches daily history for a date range over the same provider chain as the
//! refresh run. Each symbol may cost several provider calls, so the loop uses
//! the budget's escape hatch (`ensure_time()?`) and the caller turns
//! [`BudgetExpired`] into a partial summary.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use log::{info, warn};
use serde::Serialize;

use quotewarden_market_data::{Resolution, RunScope};

use super::controller::load_symbols;
use super::outcome::{ErrorKind, FetchOutcome};
use super::request::BackfillRequest;
use crate::budget::ExecutionBudget;
use crate::context::EngineContext;
use crate::errors::{BudgetExpired, Error, Result};
use crate::prices::{PersistenceWriter, WatchListStore};

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillSummary {
    pub completed: Vec<String>,
    pub failed: Vec<FetchOutcome>,
    /// Symbols not reached before the budget expired
    pub remaining: Vec<String>,
    pub points_written: usize,
    pub budget_expired: bool,
    pub elapsed_seconds: f64,
}

pub struct HistoryBackfill {
    context: Arc<EngineContext>,
    watch_list: Arc<dyn WatchListStore>,
    writer: PersistenceWriter,
}

impl HistoryBackfill {
    pub fn new(
        context: Arc<EngineContext>,
        watch_list: Arc<dyn WatchListStore>,
        writer: PersistenceWriter,
    ) -> Self {
        Self {
            context,
            watch_list,
            writer,
        }
    }

    pub async fn run(&self, request: &BackfillRequest, budget: &ExecutionBudget) -> Result<BackfillSummary> {
        let end = request.end.unwrap_or_else(|| Utc::now().date_naive());
        if request.start > end {
            return Err(Error::InvalidRequest(format!(
                "start {} is after end {}",
                request.start, end
            )));
        }

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
        info!(
            "Backfilling {} symbol(s) from {} to {}",
            symbols.len(),
            request.start,
            end
        );

        let mut summary = BackfillSummary::default();
        let mut processed = 0;
        if let Err(expired) = self
            .backfill_symbols(&symbols, request, end, budget, &mut summary, &mut processed)
            .await
        {
            warn!("Backfill stopped early: {}", expired);
            summary.budget_expired = true;
        }

        summary.remaining = symbols[processed..].to_vec();
        summary.elapsed_seconds = budget.elapsed().as_secs_f64();
        info!(
            "Backfill finished: {} completed, {} failed, {} remaining, {} point(s) written",
            summary.completed.len(),
            summary.failed.len(),
            summary.remaining.len(),
            summary.points_written
        );
        Ok(summary)
    }

    async fn backfill_symbols(
        &self,
        symbols: &[String],
        request: &BackfillRequest,
        end: NaiveDate,
        budget: &ExecutionBudget,
        summary: &mut BackfillSummary,
        processed: &mut usize,
    ) -> std::result::Result<(), BudgetExpired> {
        let registry = self.context.registry();
        let scope = RunScope::new();

        for symbol in symbols {
            budget.ensure_time()?;

            let resolution = registry
                .resolve_history(
                    symbol,
                    request.start,
                    end,
                    &scope,
                    budget,
                    request.source.as_deref(),
                )
                .await;

            match resolution {
                Resolution::Fetched {
                    value, diagnostics, ..
                } => match self.writer.append_history(&value).await {
                    Ok(written) => {
                        summary.points_written += written;
                        summary.completed.push(symbol.clone());
                    }
                    Err(e) => summary.failed.push(FetchOutcome::failed(
                        symbol,
                        ErrorKind::PersistenceError,
                        e.to_string(),
                        Some(diagnostics.summary()),
                    )),
                },
                Resolution::Failed {
                    kind,
                    message,
                    diagnostics,
                } => summary.failed.push(FetchOutcome::failed(
                    symbol,
                    kind.into(),
                    message,
                    Some(diagnostics.summary()),
                )),
                Resolution::NotAttempted { .. } => {
                    return Err(BudgetExpired {
                        remaining_seconds: budget.remaining_seconds(),
                    });
                }
            }
            *processed += 1;
        }
        Ok(())
    }
}
