//! Quotewarden Core - price acquisition engine.
//!
//! This crate contains the engine's business logic: the execution budget,
//! the engine context, the batch controller and history backfill, the trading
//! calendar and the persistence writer. It is database-agnostic and defines
//! traits that are implemented by the `storage-sqlite` crate.

pub mod budget;
pub mod calendar;
pub mod constants;
pub mod context;
pub mod errors;
pub mod prices;
pub mod refresh;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use budget::ExecutionBudget;
pub use context::{EngineContext, EngineSettings, HttpProviderFactory, ProviderFactory};

// Re-export error types
pub use errors::Error;
pub use errors::Result;
