use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, warn};

use super::model::TradingCalendar;
use super::store::{ConfigEntry, ConfigStore};
use crate::constants::CONFIG_TYPE_TRADING_CALENDAR;
use crate::errors::Result;

/// Answers "is this a trading day" for one market.
pub struct CalendarService {
    store: Arc<dyn ConfigStore>,
    market: String,
}

impl CalendarService {
    pub fn new(store: Arc<dyn ConfigStore>, market: &str) -> Self {
        Self {
            store,
            market: market.to_string(),
        }
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    /// The stored calendar if present, parseable and unexpired.
    pub fn load(&self, now: DateTime<Utc>) -> Option<TradingCalendar> {
        let entry = match self.store.get_config(CONFIG_TYPE_TRADING_CALENDAR, &self.market) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!("No trading calendar stored for market {}", self.market);
                return None;
            }
            Err(e) => {
                warn!("Failed to load trading calendar for {}: {}", self.market, e);
                return None;
            }
        };

        if entry.is_expired(now) {
            warn!(
                "Trading calendar for {} expired at {:?}",
                self.market, entry.expires_at
            );
            return None;
        }

        match serde_json::from_str::<TradingCalendar>(&entry.value) {
            Ok(calendar) => Some(calendar),
            Err(e) => {
                warn!("Stored trading calendar for {} is invalid: {}", self.market, e);
                None
            }
        }
    }

    /// Stored calendar, or the Monday to Friday fallback.
    pub fn effective(&self, now: DateTime<Utc>) -> TradingCalendar {
        self.load(now).unwrap_or_else(|| {
            warn!(
                "Using Monday-Friday fallback calendar for market {}",
                self.market
            );
            TradingCalendar::weekdays(&self.market)
        })
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        self.effective(Utc::now()).is_trading_day(date)
    }

    /// Whether the market-local date of `now` is a trading day.
    pub fn is_trading_today(&self, now: DateTime<Utc>) -> bool {
        let calendar = self.effective(now);
        calendar.is_trading_day(calendar.local_date(now))
    }

    /// Write a calendar for this service's market with the given lifetime.
    pub async fn store(&self, calendar: &TradingCalendar, ttl: Duration) -> Result<()> {
        let entry = ConfigEntry {
            config_type: CONFIG_TYPE_TRADING_CALENDAR.to_string(),
            config_key: self.market.clone(),
            value: serde_json::to_string(calendar)?,
            expires_at: Some(Utc::now() + ttl),
        };
        self.store.put_config(&entry).await
    }
}
