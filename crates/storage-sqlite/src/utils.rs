//! Helpers for SQLite statements and the TEXT column encodings.
//!
//! Decimals are stored as their canonical string, timestamps as RFC 3339 in UTC
//! with millisecond precision (so they sort lexically), dates as `YYYY-MM-DD`.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::errors::StorageError;

/// Maximum number of bound parameters per `IN (...)` query.
///
/// SQLite caps parameters per statement (SQLITE_MAX_VARIABLE_NUMBER, 999 on
/// older builds); 500 leaves room for the rest of the statement.
pub const SQLITE_MAX_PARAMS_CHUNK: usize = 500;

/// Splits `items` into slices of at most [`SQLITE_MAX_PARAMS_CHUNK`] entries.
///
/// ```ignore
/// for chunk in chunk_for_sqlite(&symbols) {
///     rows.extend(current_prices.filter(symbol.eq_any(chunk)).load(&mut conn)?);
/// }
/// ```
pub fn chunk_for_sqlite<T>(items: &[T]) -> impl Iterator<Item = &[T]> {
    items.chunks(SQLITE_MAX_PARAMS_CHUNK)
}

pub fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn decode_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|_| StorageError::corrupt(column, raw))
}

pub fn encode_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn decode_date(column: &str, raw: &str) -> Result<NaiveDate, StorageError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| StorageError::corrupt(column, raw))
}

pub fn decode_decimal(column: &str, raw: &str) -> Result<Decimal, StorageError> {
    Decimal::from_str(raw).map_err(|_| StorageError::corrupt(column, raw))
}

pub fn decode_optional_decimal(
    column: &str,
    raw: Option<&str>,
) -> Result<Option<Decimal>, StorageError> {
    raw.map(|value| decode_decimal(column, value)).transpose()
}
