//! Backoff profiles for the rate limiter.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How long the limiter may wait, and how hard it penalizes provider-reported
/// rate limits. Chosen by configuration, never auto-detected.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffProfile {
    /// Outside the bounded execution context: long waits are acceptable.
    Interactive,
    /// Inside a bounded invocation: waiting burns the shared execution budget.
    #[default]
    Bounded,
}

impl BackoffProfile {
    /// Longest single `acquire` wait before giving up on the provider.
    pub fn max_wait(&self) -> Duration {
        match self {
            BackoffProfile::Interactive => Duration::from_secs(120),
            BackoffProfile::Bounded => Duration::from_secs(5),
        }
    }

    /// First penalty after a provider-reported rate limit; doubles per repeat.
    pub fn penalty_base(&self) -> Duration {
        match self {
            BackoffProfile::Interactive => Duration::from_secs(5),
            BackoffProfile::Bounded => Duration::from_secs(1),
        }
    }

    pub fn max_penalty(&self) -> Duration {
        match self {
            BackoffProfile::Interactive => Duration::from_secs(180),
            BackoffProfile::Bounded => Duration::from_secs(8),
        }
    }

    /// Penalty for the `n`-th consecutive rate-limit report (1-based).
    pub fn penalty(&self, consecutive: u32) -> Duration {
        let exponent = consecutive.saturating_sub(1).min(16);
        self.penalty_base()
            .saturating_mul(1u32 << exponent)
            .min(self.max_penalty())
    }
}

impl FromStr for BackoffProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "interactive" => Ok(BackoffProfile::Interactive),
            "bounded" => Ok(BackoffProfile::Bounded),
            other => Err(format!("unknown backoff profile '{}'", other)),
        }
    }
}
