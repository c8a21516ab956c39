//! Core error types for the quotewarden engine.
//!
//! This module defines database-agnostic error types. Storage-specific errors
//! (from Diesel, SQLite, etc.) are converted to these types by the storage layer.

use thiserror::Error;

use quotewarden_market_data::errors::MarketDataError;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the engine.
///
/// Provider failures never surface here during a refresh run: the fallback
/// resolver turns them into per-symbol outcomes. Only `EngineFatal` (and
/// storage failures outside the persistence writer) abort an invocation.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Market data operation failed: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The engine cannot run at all, e.g. no provider is usable.
    #[error("Engine fault: {0}")]
    EngineFatal(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Database-agnostic error type for storage operations.
///
/// This enum uses `String` for all error details, allowing the storage layer
/// to convert storage-specific errors (Diesel, SQLite, etc.) into this format.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish a database connection.
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to create or configure the connection pool.
    #[error("Failed to create database pool: {0}")]
    PoolCreationFailed(String),

    /// A database query failed to execute.
    #[error("Database query failed: {0}")]
    QueryFailed(String),

    /// The requested record was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A database transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Database migration failed.
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Internal/unexpected database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

/// The invocation ran out of time.
///
/// Returned by [`ExecutionBudget::ensure_time`](crate::budget::ExecutionBudget::ensure_time)
/// for callers that cannot poll `should_stop()` themselves. It is a recoverable
/// value: catch it and finalize partial results.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("Execution budget expired ({remaining_seconds:.1}s remaining)")]
pub struct BudgetExpired {
    pub remaining_seconds: f64,
}

// === From implementations for common error types ===

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Unexpected(format!("JSON error: {}", err))
    }
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}
