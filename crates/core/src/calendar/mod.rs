//! Trading calendar.
//!
//! Calendars live in the config collection under
//! `(TRADING_CALENDAR, <market>)` with an expiry. When no unexpired calendar
//! is stored the service falls back to Monday through Friday.

mod model;
mod service;
mod store;

pub use model::TradingCalendar;
pub use service::CalendarService;
pub use store::{ConfigEntry, ConfigStore};
