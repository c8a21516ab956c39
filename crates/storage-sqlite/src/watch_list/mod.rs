mod model;
mod repository;

pub use model::WatchListDB;
pub use repository::WatchListRepository;
