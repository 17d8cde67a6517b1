pub mod repo;
pub mod repo_types;
pub mod services;

pub use repo::{JsonFileStore, StoreBackend};
pub use services::DailyLogStore;
