use serde::{Deserialize, Serialize};

/// Classification of a provider failure.
///
/// Variants are declared in precedence order: when every provider fails for a
/// symbol, the reported kind is the *smallest* one observed.
///
/// | Kind | Resolver behavior | Rate limiter |
/// |------|-------------------|--------------|
/// | `Unauthorized` | Next provider; provider skipped for the rest of the run | - |
/// | `RateLimited` | Next provider | Exponential penalty |
/// | `NotFound` | Next provider | - |
/// | `Transient` | Next provider | - |
/// | `Malformed` | Next provider | - |
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Credentials were rejected (401/403, invalid key messages).
    Unauthorized,
    /// The provider reported quota exhaustion, or the local wait would exceed the backoff profile.
    RateLimited,
    /// The provider does not know the symbol or has no data for it.
    NotFound,
    /// Timeouts, connection errors, 5xx responses.
    Transient,
    /// Unparseable bodies and invalid prices.
    Malformed,
}

impl FailureKind {
    /// Picks the most specific kind according to the fixed precedence
    /// `Unauthorized > RateLimited > NotFound > Transient > Malformed`.
    pub fn most_specific<I>(kinds: I) -> Option<FailureKind>
    where
        I: IntoIterator<Item = FailureKind>,
    {
        kinds.into_iter().min()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Unauthorized => "UNAUTHORIZED",
            FailureKind::RateLimited => "RATE_LIMITED",
            FailureKind::NotFound => "NOT_FOUND",
            FailureKind::Transient => "TRANSIENT",
            FailureKind::Malformed => "MALFORMED",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
