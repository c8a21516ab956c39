//! Refresh and backfill runs.
//!
//! - [`controller`] - Batch controller for price refresh invocations
//! - [`backfill`] - Daily history backfill under the same budget rules
//! - [`outcome`] - Per-symbol outcomes and the batch summary
//! - [`request`] - Invocation inputs

pub mod backfill;
pub mod controller;
pub mod outcome;
pub mod request;

#[cfg(test)]
mod controller_tests;

pub use backfill::{BackfillSummary, HistoryBackfill};
pub use controller::{BatchController, BatchSettings, BatchState};
pub use outcome::{BatchStatus, BatchSummary, ErrorKind, FetchOutcome, OutcomeStatus};
pub use request::{BackfillRequest, RefreshRequest};
