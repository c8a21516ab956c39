//! Per-symbol outcomes and the batch summary returned by every invocation.

use rust_decimal::Decimal;
use serde::Serialize;

use quotewarden_market_data::FailureKind;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Fetched,
    Failed,
    /// Fetched recently enough, or not a trading day
    SkippedStale,
    /// The budget ran out before the symbol was attempted
    SkippedTimeout,
}

/// Reported error kind. Provider kinds plus storage failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Unauthorized,
    RateLimited,
    NotFound,
    Transient,
    Malformed,
    PersistenceError,
}

impl From<FailureKind> for ErrorKind {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Unauthorized => ErrorKind::Unauthorized,
            FailureKind::RateLimited => ErrorKind::RateLimited,
            FailureKind::NotFound => ErrorKind::NotFound,
            FailureKind::Transient => ErrorKind::Transient,
            FailureKind::Malformed => ErrorKind::Malformed,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOutcome {
    pub symbol: String,
    pub status: OutcomeStatus,
    pub source_used: Option<String>,
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Rendered provider trail, e.g. `YAHOO: NOT_FOUND -> FINNHUB: SUCCESS`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<String>,
}

impl FetchOutcome {
    fn bare(symbol: &str, status: OutcomeStatus) -> Self {
        Self {
            symbol: symbol.to_string(),
            status,
            source_used: None,
            error_kind: None,
            price: None,
            message: None,
            attempts: None,
        }
    }

    pub fn fetched(symbol: &str, source: &str, price: Decimal, attempts: String) -> Self {
        Self {
            source_used: Some(source.to_string()),
            price: Some(price),
            attempts: Some(attempts),
            ..Self::bare(symbol, OutcomeStatus::Fetched)
        }
    }

    pub fn failed(
        symbol: &str,
        kind: ErrorKind,
        message: impl Into<String>,
        attempts: Option<String>,
    ) -> Self {
        Self {
            error_kind: Some(kind),
            message: Some(message.into()),
            attempts,
            ..Self::bare(symbol, OutcomeStatus::Failed)
        }
    }

    pub fn skipped_stale(symbol: &str) -> Self {
        Self::bare(symbol, OutcomeStatus::SkippedStale)
    }

    pub fn skipped_timeout(symbol: &str) -> Self {
        Self::bare(symbol, OutcomeStatus::SkippedTimeout)
    }
}

/// Overall classification of a run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    AllFetched,
    PartialTimeout,
    PartialFailures,
    NoWorkNeeded,
}

impl BatchStatus {
    pub fn http_status(&self) -> u16 {
        match self {
            BatchStatus::AllFetched | BatchStatus::NoWorkNeeded => 200,
            BatchStatus::PartialTimeout => 206,
            BatchStatus::PartialFailures => 207,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub status: BatchStatus,
    pub http_status: u16,
    pub total_considered: usize,
    pub fetched: usize,
    pub failed: usize,
    pub skipped: usize,
    pub elapsed_seconds: f64,
    /// Symbols skipped because the budget ran out
    pub unattempted: Vec<String>,
    /// Symbols beyond the per-run cap; not counted in `total_considered`
    pub deferred: Vec<String>,
    pub outcomes: Vec<FetchOutcome>,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: Vec<FetchOutcome>, deferred: Vec<String>, elapsed_seconds: f64) -> Self {
        let count = |status| outcomes.iter().filter(|o| o.status == status).count();
        let fetched = count(OutcomeStatus::Fetched);
        let failed = count(OutcomeStatus::Failed);
        let skipped = count(OutcomeStatus::SkippedStale) + count(OutcomeStatus::SkippedTimeout);
        let unattempted: Vec<String> = outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::SkippedTimeout)
            .map(|o| o.symbol.clone())
            .collect();

        let status = if fetched + failed + unattempted.len() == 0 {
            BatchStatus::NoWorkNeeded
        } else if !unattempted.is_empty() {
            BatchStatus::PartialTimeout
        } else if failed > 0 {
            BatchStatus::PartialFailures
        } else {
            BatchStatus::AllFetched
        };

        Self {
            status,
            http_status: status.http_status(),
            total_considered: outcomes.len(),
            fetched,
            failed,
            skipped,
            elapsed_seconds,
            unattempted,
            deferred,
            outcomes,
        }
    }

    /// `fetched + failed + skipped == total_considered`
    pub fn is_complete(&self) -> bool {
        self.fetched + self.failed + self.skipped == self.total_considered
    }

    pub fn outcome(&self, symbol: &str) -> Option<&FetchOutcome> {
        self.outcomes.iter().find(|o| o.symbol == symbol)
    }
}
