use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::utils::time_utils::{market_date_from_utc, DEFAULT_MARKET_TZ};

/// Trading days for one market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingCalendar {
    pub market: String,
    /// IANA timezone used to decide what "today" is for this market
    pub timezone: String,
    pub trading_weekdays: Vec<Weekday>,
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
    /// Sessions that close early; still trading days
    #[serde(default)]
    pub early_closes: Vec<NaiveDate>,
}

impl TradingCalendar {
    /// Monday to Friday with no holidays.
    pub fn weekdays(market: &str) -> Self {
        Self {
            market: market.to_string(),
            timezone: DEFAULT_MARKET_TZ.name().to_string(),
            trading_weekdays: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            holidays: Vec::new(),
            early_closes: Vec::new(),
        }
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        self.trading_weekdays.contains(&date.weekday()) && !self.holidays.contains(&date)
    }

    pub fn is_early_close(&self, date: NaiveDate) -> bool {
        self.early_closes.contains(&date)
    }

    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or(DEFAULT_MARKET_TZ)
    }

    /// The market-local date of `instant`.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        market_date_from_utc(instant, self.tz())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_weekdays_calendar() {
        let cal = TradingCalendar::weekdays("US");
        let fri = NaiveDate::from_ymd_opt(2026, 2, 13).unwrap();
        let sat = NaiveDate::from_ymd_opt(2026, 2, 14).unwrap();
        assert!(cal.is_trading_day(fri));
        assert!(!cal.is_trading_day(sat));
    }

    #[test]
    fn test_holiday_is_not_trading() {
        let mut cal = TradingCalendar::weekdays("US");
        let presidents_day = NaiveDate::from_ymd_opt(2026, 2, 16).unwrap();
        cal.holidays.push(presidents_day);
        assert!(!cal.is_trading_day(presidents_day));
    }

    #[test]
    fn test_local_date_uses_market_timezone() {
        let cal = TradingCalendar::weekdays("US");
        // 02:00 UTC Saturday is still Friday evening in New York.
        let instant = Utc.with_ymd_and_hms(2026, 2, 14, 2, 0, 0).unwrap();
        assert_eq!(
            cal.local_date(instant),
            NaiveDate::from_ymd_opt(2026, 2, 13).unwrap()
        );
    }

    #[test]
    fn test_serde_shape() {
        let json = r#"{"market":"US","timezone":"America/New_York","tradingWeekdays":["Mon","Tue"]}"#;
        let cal: TradingCalendar = serde_json::from_str(json).unwrap();
        assert_eq!(cal.trading_weekdays, vec![Weekday::Mon, Weekday::Tue]);
        assert!(cal.holidays.is_empty());
    }
}
