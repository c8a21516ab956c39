//! Price persistence.
//!
//! - [`model`] - Stored current prices and watch-list entries
//! - [`store`] - Storage traits implemented by the storage crate
//! - [`writer`] - Persistence writer used by the refresh and backfill runs

pub mod model;
pub mod store;
pub mod writer;

pub use model::{CurrentPrice, UpsertOutcome, WatchListEntry};
pub use store::{PriceStore, WatchListStore};
pub use writer::PersistenceWriter;
