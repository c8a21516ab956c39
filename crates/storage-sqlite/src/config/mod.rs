//! The `app_config` collection (trading calendars and similar keyed documents).

mod model;
mod repository;

pub use model::AppConfigDB;
pub use repository::ConfigRepository;
