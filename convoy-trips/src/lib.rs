pub mod capacity;
pub mod query;
pub mod service;

#[cfg(test)]
mod testing;

pub use capacity::{CapacityManager, RetryPolicy};
pub use query::{PagingPolicy, TripQueryEngine};
pub use service::TripService;
