use chrono::NaiveDate;
use serde::Deserialize;

/// Input of one refresh invocation.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    /// Ignore the staleness filter and the trading calendar
    #[serde(default)]
    pub force_refresh: bool,
    /// Replaces the watch list for this run
    pub symbols: Option<Vec<String>>,
    /// Seconds the host grants this invocation
    pub hard_limit_seconds: Option<f64>,
    /// Restrict resolution to one provider
    pub source: Option<String>,
}

/// Input of one history backfill invocation.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillRequest {
    pub symbols: Option<Vec<String>>,
    pub start: NaiveDate,
    /// Defaults to today (UTC)
    pub end: Option<NaiveDate>,
    pub hard_limit_seconds: Option<f64>,
    pub source: Option<String>,
}
