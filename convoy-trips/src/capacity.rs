use std::sync::Arc;

use chrono::{DateTime, Utc};
use convoy_core::{
    NewTrip, Route, StoreError, Trip, TripError, TripId, TripMutation, TripPatch, TripResult, TripStore,
    UserId,
};
use tracing::{debug, info, warn};

/// How many read-check-write cycles a write gets before giving up with
/// [`TripError::ConcurrentModification`]. Retries are immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl RetryPolicy {
    pub fn attempts(max_attempts: u32) -> Self {
        Self { max_attempts: max_attempts.max(1) }
    }
}

/// Owns every write to a trip and keeps `free_seats` honest under concurrent
/// admissions. No lock is held across storage calls: each write is
/// conditioned on the version that was read, and a losing writer re-reads.
pub struct CapacityManager {
    store: Arc<dyn TripStore>,
    retry: RetryPolicy,
}

impl CapacityManager {
    pub fn new(store: Arc<dyn TripStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub async fn create_trip(
        &self,
        driver_id: UserId,
        route: &Route,
        total_seats: u32,
        departure: DateTime<Utc>,
    ) -> TripResult<Trip> {
        if total_seats == 0 {
            return Err(TripError::Validation("A trip needs at least one seat".to_string()));
        }
        ensure_future(departure)?;
        let route = route.normalized();
        ensure_route(&route.from, &route.to)?;

        let trip = self
            .store
            .insert(NewTrip {
                driver_id,
                from: route.from,
                to: route.to,
                departure,
                total_seats,
            })
            .await?;

        info!(trip_id = %trip.id, %driver_id, total_seats, "Trip created");
        Ok(trip)
    }

    /// Give `passenger_id` one seat on the trip.
    ///
    /// Exactly one of: the seat is taken and both `passengers` and
    /// `free_seats` change in one committed write; or a typed error is
    /// returned and the trip is unchanged.
    pub async fn admit_passenger(&self, trip_id: TripId, passenger_id: UserId) -> TripResult<Trip> {
        let admit = move |trip: &mut Trip| trip.admit(passenger_id);

        let trip = self
            .commit_with_retry(
                trip_id,
                "admit_passenger",
                |trip: &Trip| {
                    if trip.has_passenger(&passenger_id) {
                        return Err(TripError::DuplicatePassenger { trip_id, passenger_id });
                    }
                    if !trip.has_free_seat() {
                        return Err(TripError::CapacityExceeded { trip_id });
                    }
                    Ok(())
                },
                &admit,
            )
            .await?;

        info!(%trip_id, %passenger_id, free_seats = trip.free_seats, version = trip.version, "Passenger admitted");
        Ok(trip)
    }

    /// Apply an allow-listed edit. Seat counts and passengers are out of reach.
    pub async fn update_trip(&self, trip_id: TripId, patch: &TripPatch) -> TripResult<Trip> {
        if patch.is_empty() {
            return Err(TripError::Validation("Nothing to update".to_string()));
        }
        let patch = patch.normalized();
        if let Some(departure) = patch.departure {
            ensure_future(departure)?;
        }
        for place in [&patch.from, &patch.to].into_iter().flatten() {
            if place.is_empty() {
                return Err(TripError::Validation("Route endpoints cannot be blank".to_string()));
            }
        }

        let apply = |trip: &mut Trip| trip.apply_patch(&patch);

        let trip = self
            .commit_with_retry(
                trip_id,
                "update_trip",
                |trip: &Trip| {
                    let mut preview = trip.clone();
                    preview.apply_patch(&patch);
                    ensure_route(&preview.from, &preview.to)
                },
                &apply,
            )
            .await?;

        info!(%trip_id, version = trip.version, "Trip updated");
        Ok(trip)
    }

    /// The optimistic-concurrency loop: read, check, conditional write; on a
    /// version conflict start over against the fresh state.
    async fn commit_with_retry<C>(
        &self,
        trip_id: TripId,
        operation: &'static str,
        check: C,
        mutate: TripMutation<'_>,
    ) -> TripResult<Trip>
    where
        C: Fn(&Trip) -> TripResult<()> + Send + Sync,
    {
        let max_attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let current = self.store.get_by_id(trip_id).await?;
            check(&current)?;

            match self
                .store
                .update_if_version_matches(trip_id, current.version, mutate)
                .await
            {
                Ok(updated) => return Ok(updated),
                Err(StoreError::VersionConflict { expected, actual, .. }) => {
                    debug!(%trip_id, operation, attempt, expected, actual, "Version conflict, retrying");
                }
                Err(err) => {
                    warn!(%trip_id, operation, error = %err, "Conditional write failed");
                    return Err(err.into());
                }
            }
        }

        warn!(%trip_id, operation, attempts = max_attempts, "Giving up after repeated version conflicts");
        Err(TripError::ConcurrentModification { trip_id, attempts: max_attempts })
    }
}

fn ensure_future(departure: DateTime<Utc>) -> TripResult<()> {
    if departure <= Utc::now() {
        return Err(TripError::Validation("Departure must be in the future".to_string()));
    }
    Ok(())
}

fn ensure_route(from: &str, to: &str) -> TripResult<()> {
    if from.is_empty() || to.is_empty() {
        return Err(TripError::Validation("Route endpoints cannot be blank".to_string()));
    }
    if from == to {
        return Err(TripError::Validation(format!("Trip cannot start and end in {}", from)));
    }
    Ok(())
}
