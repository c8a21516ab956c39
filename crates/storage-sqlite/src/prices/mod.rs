//! Current prices and daily history.

mod model;
mod repository;

pub use model::{CurrentPriceDB, PriceHistoryDB};
pub use repository::PriceRepository;
