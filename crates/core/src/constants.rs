/// Provider fallback order used when none is configured
pub const DEFAULT_PROVIDER_ORDER: [&str; 5] = [
    "YAHOO",
    "FINNHUB",
    "MARKETDATA_APP",
    "TWELVE_DATA",
    "ALPHA_VANTAGE",
];

/// Symbols fetched more recently than this are skipped on non-forced runs
pub const DEFAULT_STALENESS_MINUTES: i64 = 15;

/// Cap on symbols attempted in one invocation
pub const DEFAULT_MAX_SYMBOLS_PER_RUN: usize = 200;

/// Seconds reserved at the end of an invocation to flush partial results
pub const DEFAULT_SAFETY_BUFFER_SECS: u64 = 60;

/// Hard limit used when the caller does not supply one
pub const DEFAULT_HARD_LIMIT_SECS: u64 = 900;

/// Per-call provider timeout ceiling
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;

/// `app_config.config_type` for trading calendars
pub const CONFIG_TYPE_TRADING_CALENDAR: &str = "TRADING_CALENDAR";

/// Default trading-calendar market key
pub const DEFAULT_MARKET: &str = "US";

/// Default lifetime of a stored trading calendar
pub const DEFAULT_CALENDAR_TTL_DAYS: i64 = 30;
