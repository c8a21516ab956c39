//! SQLite storage for quotewarden.
//!
//! Implements the storage traits of `quotewarden-core` with Diesel over SQLite:
//! - connection pooling and embedded migrations
//! - a single writer actor; every mutation runs in an immediate transaction
//! - repositories for current prices, daily history, the watch list and the
//!   config collection
//!
//! ```text
//! quotewarden-core (PriceStore, WatchListStore, ConfigStore)
//!                  │
//!                  ▼
//!          storage-sqlite (this crate)
//!                  │
//!                  ▼
//!              SQLite DB
//! ```

pub mod db;
pub mod errors;
pub mod schema;
pub mod utils;

pub mod config;
pub mod prices;
pub mod watch_list;

#[cfg(test)]
mod test_support;

pub use db::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbConnection, DbPool,
    WriteHandle,
};

pub use errors::{IntoCore, StorageError};

pub use config::ConfigRepository;
pub use prices::PriceRepository;
pub use watch_list::WatchListRepository;

pub use quotewarden_core::errors::{DatabaseError, Error, Result};
