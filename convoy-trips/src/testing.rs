//! Store doubles for exercising the retry loop.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use convoy_core::{
    NewTrip, Route, StoreError, Trip, TripId, TripMutation, TripPredicate, TripSort, TripStore,
};
use convoy_store::InMemoryTripStore;

pub(crate) fn future(days: i64) -> DateTime<Utc> {
    Utc::now() + Duration::days(days)
}

pub(crate) fn madrid_paris() -> Route {
    Route::new("Madrid", "Paris")
}

/// Every conditional write loses.
pub(crate) struct AlwaysConflictingStore {
    inner: Arc<InMemoryTripStore>,
    attempts: AtomicU32,
}

impl AlwaysConflictingStore {
    pub(crate) fn new(inner: Arc<InMemoryTripStore>) -> Self {
        Self { inner, attempts: AtomicU32::new(0) }
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TripStore for AlwaysConflictingStore {
    async fn get_by_id(&self, id: TripId) -> Result<Trip, StoreError> {
        self.inner.get_by_id(id).await
    }

    async fn insert(&self, trip: NewTrip) -> Result<Trip, StoreError> {
        self.inner.insert(trip).await
    }

    async fn update_if_version_matches(
        &self,
        id: TripId,
        expected_version: u64,
        _mutate: TripMutation<'_>,
    ) -> Result<Trip, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::VersionConflict {
            id,
            expected: expected_version,
            actual: expected_version + 1,
        })
    }

    async fn search(
        &self,
        predicate: &TripPredicate,
        sort: TripSort,
        skip: usize,
        limit: Option<usize>,
    ) -> Result<Vec<Trip>, StoreError> {
        self.inner.search(predicate, sort, skip, limit).await
    }
}

/// Commits `rival` right before the first conditional write it sees, so that
/// write is guaranteed to be based on a stale read.
pub(crate) struct InterferingStore<F> {
    inner: Arc<InMemoryTripStore>,
    rival: F,
    fired: AtomicBool,
    writes: AtomicU32,
}

impl<F> InterferingStore<F>
where
    F: Fn(&mut Trip) + Send + Sync + 'static,
{
    pub(crate) fn new(inner: Arc<InMemoryTripStore>, rival: F) -> Self {
        Self {
            inner,
            rival,
            fired: AtomicBool::new(false),
            writes: AtomicU32::new(0),
        }
    }

    pub(crate) fn conditional_writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<F> TripStore for InterferingStore<F>
where
    F: Fn(&mut Trip) + Send + Sync + 'static,
{
    async fn get_by_id(&self, id: TripId) -> Result<Trip, StoreError> {
        self.inner.get_by_id(id).await
    }

    async fn insert(&self, trip: NewTrip) -> Result<Trip, StoreError> {
        self.inner.insert(trip).await
    }

    async fn update_if_version_matches(
        &self,
        id: TripId,
        expected_version: u64,
        mutate: TripMutation<'_>,
    ) -> Result<Trip, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if !self.fired.swap(true, Ordering::SeqCst) {
            let current = self.inner.get_by_id(id).await?;
            self.inner
                .update_if_version_matches(id, current.version, &self.rival)
                .await?;
        }
        self.inner.update_if_version_matches(id, expected_version, mutate).await
    }

    async fn search(
        &self,
        predicate: &TripPredicate,
        sort: TripSort,
        skip: usize,
        limit: Option<usize>,
    ) -> Result<Vec<Trip>, StoreError> {
        self.inner.search(predicate, sort, skip, limit).await
    }
}
