//! Property-based integration tests for outcome aggregation and failure precedence.
//!
//! These tests verify that universal properties hold across all valid inputs,
//! using the `proptest` crate for random test case generation.

use proptest::prelude::*;
use quotewarden_core::refresh::{BatchStatus, BatchSummary, ErrorKind, FetchOutcome, OutcomeStatus};
use quotewarden_market_data::FailureKind;
use rust_decimal::Decimal;

// =============================================================================
// Generators
// =============================================================================

fn arb_failure_kind() -> impl Strategy<Value = FailureKind> {
    prop_oneof![
        Just(FailureKind::Unauthorized),
        Just(FailureKind::RateLimited),
        Just(FailureKind::NotFound),
        Just(FailureKind::Transient),
        Just(FailureKind::Malformed),
    ]
}

fn arb_outcome() -> impl Strategy<Value = FetchOutcome> {
    ("[A-Z]{1,5}", 0u8..4).prop_map(|(symbol, status)| match status {
        0 => FetchOutcome::fetched(&symbol, "YAHOO", Decimal::ONE, String::new()),
        1 => FetchOutcome::failed(&symbol, ErrorKind::Transient, "503", None),
        2 => FetchOutcome::skipped_stale(&symbol),
        _ => FetchOutcome::skipped_timeout(&symbol),
    })
}

/// Explicit precedence rank; lower wins.
fn rank(kind: FailureKind) -> u8 {
    match kind {
        FailureKind::Unauthorized => 0,
        FailureKind::RateLimited => 1,
        FailureKind::NotFound => 2,
        FailureKind::Transient => 3,
        FailureKind::Malformed => 4,
    }
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    /// The reported kind is always the highest-precedence kind observed.
    #[test]
    fn prop_most_specific_follows_precedence(kinds in prop::collection::vec(arb_failure_kind(), 1..12)) {
        let expected = kinds.iter().copied().min_by_key(|k| rank(*k));
        prop_assert_eq!(FailureKind::most_specific(kinds.clone()), expected);
    }

    /// Order of attempts never changes the reported kind.
    #[test]
    fn prop_most_specific_is_order_independent(kinds in prop::collection::vec(arb_failure_kind(), 1..12)) {
        let mut reversed = kinds.clone();
        reversed.reverse();
        prop_assert_eq!(FailureKind::most_specific(kinds), FailureKind::most_specific(reversed));
    }

    /// fetched + failed + skipped == total for any mix of outcomes.
    #[test]
    fn prop_summary_is_complete(outcomes in prop::collection::vec(arb_outcome(), 0..40)) {
        let total = outcomes.len();
        let summary = BatchSummary::from_outcomes(outcomes, Vec::new(), 1.0);
        prop_assert_eq!(summary.total_considered, total);
        prop_assert!(summary.is_complete());
    }

    /// Timeouts dominate failures; an idle run is NoWorkNeeded.
    #[test]
    fn prop_status_classification(outcomes in prop::collection::vec(arb_outcome(), 0..40)) {
        let has_timeout = outcomes.iter().any(|o| o.status == OutcomeStatus::SkippedTimeout);
        let has_failure = outcomes.iter().any(|o| o.status == OutcomeStatus::Failed);
        let has_fetch = outcomes.iter().any(|o| o.status == OutcomeStatus::Fetched);

        let summary = BatchSummary::from_outcomes(outcomes, Vec::new(), 1.0);
        let expected = if has_timeout {
            BatchStatus::PartialTimeout
        } else if has_failure {
            BatchStatus::PartialFailures
        } else if has_fetch {
            BatchStatus::AllFetched
        } else {
            BatchStatus::NoWorkNeeded
        };
        prop_assert_eq!(summary.status, expected);
        prop_assert_eq!(summary.http_status, expected.http_status());
    }
}
