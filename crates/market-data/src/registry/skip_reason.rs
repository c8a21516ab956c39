//! Skip reason tracking for provider selection diagnostics.

use crate::errors::FailureKind;
use crate::models::ProviderId;

/// Why a provider was not called for a symbol.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// Provider is switched off in configuration.
    Disabled,

    /// Provider needs an API key and none is configured.
    NotConfigured,

    /// Provider rejected credentials earlier in this run.
    UnauthorizedThisRun,

    /// Provider doesn't support historical quotes (for backfill).
    HistoricalNotSupported,

    /// The invocation budget ran out before this provider was reached.
    BudgetExhausted,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SkipReason::Disabled => "disabled",
            SkipReason::NotConfigured => "not configured",
            SkipReason::UnauthorizedThisRun => "unauthorized this run",
            SkipReason::HistoricalNotSupported => "history not supported",
            SkipReason::BudgetExhausted => "budget exhausted",
        };
        f.write_str(s)
    }
}

/// Record of a single provider attempt during a fetch.
#[derive(Clone, Debug)]
pub struct ProviderAttempt {
    pub provider_id: ProviderId,
    pub skipped: Option<SkipReason>,
    pub failure: Option<(FailureKind, String)>,
    pub success: bool,
}

/// Ordered trail of what the resolver did for one symbol.
#[derive(Clone, Debug, Default)]
pub struct FetchDiagnostics {
    pub attempts: Vec<ProviderAttempt>,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self {
            attempts: Vec::new(),
        }
    }

    pub fn record_skip(&mut self, provider_id: ProviderId, reason: SkipReason) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            skipped: Some(reason),
            failure: None,
            success: false,
        });
    }

    pub fn record_failure(&mut self, provider_id: ProviderId, kind: FailureKind, message: String) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            skipped: None,
            failure: Some((kind, message)),
            success: false,
        });
    }

    pub fn record_success(&mut self, provider_id: ProviderId) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            skipped: None,
            failure: None,
            success: true,
        });
    }

    /// Summary for logging/debugging, e.g. `YAHOO: NOT_FOUND -> FINNHUB: SUCCESS`.
    pub fn summary(&self) -> String {
        self.attempts
            .iter()
            .map(|a| {
                if a.success {
                    format!("{}: SUCCESS", a.provider_id)
                } else if let Some(skip) = &a.skipped {
                    format!("{}: SKIPPED ({})", a.provider_id, skip)
                } else if let Some((kind, _)) = &a.failure {
                    format!("{}: {}", a.provider_id, kind)
                } else {
                    format!("{}: UNKNOWN", a.provider_id)
                }
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    pub fn has_success(&self) -> bool {
        self.attempts.iter().any(|a| a.success)
    }

    /// Whether any provider was actually called.
    pub fn has_attempts(&self) -> bool {
        self.attempts.iter().any(|a| a.skipped.is_none())
    }

    /// Failure kinds observed, in attempt order.
    pub fn failure_kinds(&self) -> impl Iterator<Item = FailureKind> + '_ {
        self.attempts
            .iter()
            .filter_map(|a| a.failure.as_ref().map(|(kind, _)| *kind))
    }

    /// Most specific failure kind across all attempts.
    pub fn most_specific_failure(&self) -> Option<FailureKind> {
        FailureKind::most_specific(self.failure_kinds())
    }

    /// Message of the first failure with the given kind.
    pub fn message_for(&self, kind: FailureKind) -> Option<&str> {
        self.attempts.iter().find_map(|a| match &a.failure {
            Some((k, msg)) if *k == kind => Some(msg.as_str()),
            _ => None,
        })
    }

    pub fn skip_reasons(&self) -> Vec<(&ProviderId, &SkipReason)> {
        self.attempts
            .iter()
            .filter_map(|a| a.skipped.as_ref().map(|s| (&a.provider_id, s)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;

    #[test]
    fn test_diagnostics_summary() {
        let mut diag = FetchDiagnostics::new();
        diag.record_skip(Cow::Borrowed("YAHOO"), SkipReason::Disabled);
        diag.record_failure(
            Cow::Borrowed("ALPHA_VANTAGE"),
            FailureKind::Transient,
            "Timeout".to_string(),
        );
        diag.record_success(Cow::Borrowed("FINNHUB"));

        assert_eq!(
            diag.summary(),
            "YAHOO: SKIPPED (disabled) -> ALPHA_VANTAGE: TRANSIENT -> FINNHUB: SUCCESS"
        );
    }

    #[test]
    fn test_has_success_and_attempts() {
        let mut diag = FetchDiagnostics::new();
        diag.record_skip(Cow::Borrowed("YAHOO"), SkipReason::NotConfigured);
        assert!(!diag.has_success());
        assert!(!diag.has_attempts());

        diag.record_success(Cow::Borrowed("FINNHUB"));
        assert!(diag.has_success());
        assert!(diag.has_attempts());
    }

    #[test]
    fn test_most_specific_failure() {
        let mut diag = FetchDiagnostics::new();
        diag.record_failure(Cow::Borrowed("A"), FailureKind::Malformed, "bad".into());
        diag.record_failure(Cow::Borrowed("B"), FailureKind::RateLimited, "429".into());
        diag.record_failure(Cow::Borrowed("C"), FailureKind::NotFound, "404".into());

        assert_eq!(diag.most_specific_failure(), Some(FailureKind::RateLimited));
        assert_eq!(diag.message_for(FailureKind::RateLimited), Some("429"));
    }

    #[test]
    fn test_skip_reasons() {
        let mut diag = FetchDiagnostics::new();
        diag.record_skip(Cow::Borrowed("A"), SkipReason::UnauthorizedThisRun);
        diag.record_skip(Cow::Borrowed("B"), SkipReason::HistoricalNotSupported);
        diag.record_success(Cow::Borrowed("C"));

        assert_eq!(diag.skip_reasons().len(), 2);
        assert_eq!(diag.most_specific_failure(), None);
    }
}
