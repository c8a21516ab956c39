use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// Default market timezone.
/// Used to convert UTC instants to trading dates when a calendar names no usable zone.
pub const DEFAULT_MARKET_TZ: Tz = chrono_tz::America::New_York;

/// Converts a UTC instant to a market date in the given timezone.
///
/// This is the single source of truth for deriving a trading date from a timestamp.
pub fn market_date_from_utc(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}
