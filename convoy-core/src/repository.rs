use async_trait::async_trait;

use crate::search::{TripPredicate, TripSort};
use crate::trip::{NewTrip, Trip, TripId};

/// Mutation applied by [`TripStore::update_if_version_matches`] to the stored
/// trip. It runs only when the version check passes.
pub type TripMutation<'a> = &'a (dyn Fn(&mut Trip) + Send + Sync);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Trip not found: {0}")]
    NotFound(TripId),

    #[error("Version conflict on trip {id}: expected {expected}, found {actual}")]
    VersionConflict { id: TripId, expected: u64, actual: u64 },

    #[error("Stored trip is invalid: {0}")]
    Corrupt(String),

    #[error("Storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Backend(Box::new(err))
    }
}

/// Persistence contract for trip documents.
///
/// `update_if_version_matches` is the only write path for an existing trip:
/// it applies the mutation and bumps `version` by one as a single atomic step,
/// or reports `VersionConflict` without touching anything.
#[async_trait]
pub trait TripStore: Send + Sync {
    async fn get_by_id(&self, id: TripId) -> Result<Trip, StoreError>;

    /// Persist a new trip. The store assigns the id and sets `version = 0`.
    async fn insert(&self, trip: NewTrip) -> Result<Trip, StoreError>;

    async fn update_if_version_matches(
        &self,
        id: TripId,
        expected_version: u64,
        mutate: TripMutation<'_>,
    ) -> Result<Trip, StoreError>;

    /// Read-only ordered scan. `limit = None` means unbounded.
    async fn search(
        &self,
        predicate: &TripPredicate,
        sort: TripSort,
        skip: usize,
        limit: Option<usize>,
    ) -> Result<Vec<Trip>, StoreError>;
}
