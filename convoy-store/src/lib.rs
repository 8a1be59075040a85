pub mod app_config;
pub mod database;
pub mod memory;
pub mod redis_repo;
pub mod trip_repo;
pub mod user_repo;

pub use database::DbClient;
pub use memory::{InMemoryTripStore, InMemoryUserDirectory};
pub use redis_repo::RedisClient;
pub use trip_repo::PostgresTripStore;
pub use user_repo::PostgresUserDirectory;
