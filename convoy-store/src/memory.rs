use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use convoy_core::{
    NewTrip, StoreError, Trip, TripId, TripMutation, TripPredicate, TripSort, TripStore, UserDirectory,
    UserId, UserSummary,
};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local trip storage. The write guard is taken only for the duration
/// of a single version check plus mutation, never across other awaits.
#[derive(Default)]
pub struct InMemoryTripStore {
    trips: RwLock<HashMap<TripId, Trip>>,
}

impl InMemoryTripStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a fully formed trip, bypassing creation rules. Used for fixtures
    /// such as trips that already departed.
    pub async fn put(&self, trip: Trip) {
        self.trips.write().await.insert(trip.id, trip);
    }
}

#[async_trait]
impl TripStore for InMemoryTripStore {
    async fn get_by_id(&self, id: TripId) -> Result<Trip, StoreError> {
        self.trips
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn insert(&self, new_trip: NewTrip) -> Result<Trip, StoreError> {
        let trip = Trip::from_new(Uuid::new_v4(), new_trip, Utc::now());
        self.trips.write().await.insert(trip.id, trip.clone());
        Ok(trip)
    }

    async fn update_if_version_matches(
        &self,
        id: TripId,
        expected_version: u64,
        mutate: TripMutation<'_>,
    ) -> Result<Trip, StoreError> {
        let mut trips = self.trips.write().await;
        let stored = trips.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if stored.version != expected_version {
            return Err(StoreError::VersionConflict {
                id,
                expected: expected_version,
                actual: stored.version,
            });
        }

        // Mutate a copy so a mutation that breaks the seat invariant never lands.
        let mut updated = stored.mutated(mutate);
        if !updated.is_seat_count_consistent() {
            return Err(StoreError::Corrupt(format!(
                "update would break seat count on trip {}",
                id
            )));
        }
        updated.version = expected_version + 1;
        *stored = updated.clone();

        Ok(updated)
    }

    async fn search(
        &self,
        predicate: &TripPredicate,
        sort: TripSort,
        skip: usize,
        limit: Option<usize>,
    ) -> Result<Vec<Trip>, StoreError> {
        let mut matching: Vec<Trip> = self
            .trips
            .read()
            .await
            .values()
            .filter(|trip| predicate.matches(trip))
            .cloned()
            .collect();

        matching.sort_by(|a, b| sort.compare(a, b));

        Ok(matching
            .into_iter()
            .skip(skip)
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<UserId, UserSummary>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, user: UserSummary) {
        self.users.write().await.insert(user.id, user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn summaries(&self, ids: &[UserId]) -> Result<HashMap<UserId, UserSummary>, StoreError> {
        let users = self.users.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| users.get(id).map(|user| (*id, user.clone())))
            .collect())
    }
}
