//! Quote data validation.
//!
//! Every observation passes through the validator before the resolver accepts it:
//! - Price must be strictly positive
//! - Timestamp must not be implausibly far in the future
//! - OHLC invariants (high >= low; open/close inside the range is a soft check)

use chrono::{DateTime, Duration, Utc};
use log::warn;
use rust_decimal::Decimal;

use crate::errors::MarketDataError;
use crate::models::{HistoricalPoint, PriceObservation};

/// Validation severity levels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationSeverity {
    /// Hard failure - reject the observation, try next provider.
    Hard,
    /// Soft warning - accept but log.
    Soft,
}

/// Validation result details.
#[derive(Clone, Debug)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,
    pub message: String,
}

/// Quote validator limits.
#[derive(Clone, Debug)]
struct ValidatorConfig {
    /// Reject quotes where high < low.
    reject_invalid_ohlc: bool,
    /// Maximum allowed price value (sanity check).
    max_price: Option<Decimal>,
    /// How far past "now" a provider timestamp may be.
    max_future_skew: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            reject_invalid_ohlc: true,
            max_price: Some(Decimal::from(1_000_000_000i64)),
            max_future_skew: Duration::days(1),
        }
    }
}

/// Quote data validator.
#[derive(Clone, Debug, Default)]
pub struct QuoteValidator {
    config: ValidatorConfig,
}

impl QuoteValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate an observation against the current time.
    ///
    /// Hard issues are returned as errors classified `Malformed`; soft issues are logged.
    pub fn validate(&self, obs: &PriceObservation) -> Result<(), MarketDataError> {
        self.validate_at(obs, Utc::now())
    }

    pub fn validate_at(
        &self,
        obs: &PriceObservation,
        now: DateTime<Utc>,
    ) -> Result<(), MarketDataError> {
        let mut issues = Vec::new();

        if !obs.is_valid() {
            return Err(MarketDataError::InvalidPrice {
                provider: obs.source.clone(),
                symbol: obs.symbol.clone(),
                message: format!("price must be positive, got {}", obs.price),
            });
        }

        if let Some(max) = self.config.max_price {
            if obs.price > max {
                issues.push(ValidationIssue {
                    severity: ValidationSeverity::Hard,
                    message: format!("Price {} exceeds sanity limit {}", obs.price, max),
                });
            }
        }

        if obs.timestamp > now + self.config.max_future_skew {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Hard,
                message: format!("Timestamp {} is in the future", obs.timestamp),
            });
        }

        self.check_ohlc(obs.open, obs.high, obs.low, obs.price, &mut issues);

        let hard: Vec<&str> = issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Hard)
            .map(|i| i.message.as_str())
            .collect();
        if !hard.is_empty() {
            return Err(MarketDataError::malformed(&obs.source, hard.join("; ")));
        }

        for issue in issues.iter().filter(|i| i.severity == ValidationSeverity::Soft) {
            warn!(
                "Quote validation warning for {} from {}: {}",
                obs.symbol, obs.source, issue.message
            );
        }
        Ok(())
    }

    /// Keep only points with a positive close and sane OHLC.
    pub fn filter_points(&self, points: Vec<HistoricalPoint>) -> Vec<HistoricalPoint> {
        points
            .into_iter()
            .filter(|p| {
                let mut issues = Vec::new();
                self.check_ohlc(p.open, p.high, p.low, p.close, &mut issues);
                let ok = p.close > Decimal::ZERO
                    && !issues.iter().any(|i| i.severity == ValidationSeverity::Hard);
                if !ok {
                    warn!("Dropping invalid history point {} {}", p.symbol, p.date);
                }
                ok
            })
            .collect()
    }

    fn check_ohlc(
        &self,
        open: Option<Decimal>,
        high: Option<Decimal>,
        low: Option<Decimal>,
        close: Decimal,
        issues: &mut Vec<ValidationIssue>,
    ) {
        let (Some(high), Some(low)) = (high, low) else {
            return;
        };

        if self.config.reject_invalid_ohlc && high < low {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Hard,
                message: format!("High ({}) is less than Low ({})", high, low),
            });
            return;
        }

        if let Some(open) = open {
            if open < low || open > high {
                issues.push(ValidationIssue {
                    severity: ValidationSeverity::Soft,
                    message: format!("Open ({}) is outside High/Low range ({}-{})", open, low, high),
                });
            }
        }

        if close < low || close > high {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Soft,
                message: format!("Close ({}) is outside High/Low range ({}-{})", close, low, high),
            });
        }
    }
}
