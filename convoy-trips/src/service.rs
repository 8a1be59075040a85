use std::sync::Arc;

use chrono::{DateTime, Utc};
use convoy_core::{
    FilterCriteria, Route, Trip, TripId, TripPatch, TripResult, TripStore, TripView, UserDirectory, UserId,
};

use crate::capacity::{CapacityManager, RetryPolicy};
use crate::query::{PagingPolicy, TripQueryEngine};

/// Application-facing facade. Writes go through the [`CapacityManager`],
/// reads through the [`TripQueryEngine`]; errors pass through untouched.
pub struct TripService {
    capacity: CapacityManager,
    queries: TripQueryEngine,
}

impl TripService {
    pub fn new(
        store: Arc<dyn TripStore>,
        users: Arc<dyn UserDirectory>,
        retry: RetryPolicy,
        paging: PagingPolicy,
    ) -> Self {
        Self {
            capacity: CapacityManager::new(store.clone(), retry),
            queries: TripQueryEngine::new(store, users, paging),
        }
    }

    pub async fn create(
        &self,
        driver_id: UserId,
        route: &Route,
        total_seats: u32,
        departure: DateTime<Utc>,
    ) -> TripResult<Trip> {
        self.capacity.create_trip(driver_id, route, total_seats, departure).await
    }

    pub async fn search(&self, criteria: &FilterCriteria) -> TripResult<Vec<TripView>> {
        self.queries.filter(criteria).await
    }

    pub async fn join(&self, trip_id: TripId, passenger_id: UserId) -> TripResult<Trip> {
        self.capacity.admit_passenger(trip_id, passenger_id).await
    }

    pub async fn edit(&self, trip_id: TripId, patch: &TripPatch) -> TripResult<Trip> {
        self.capacity.update_trip(trip_id, patch).await
    }

    /// Raw trip, as stored. Used where the caller needs the driver id or version.
    pub async fn trip(&self, trip_id: TripId) -> TripResult<Trip> {
        self.queries.by_id(trip_id).await
    }

    pub async fn get(&self, trip_id: TripId) -> TripResult<TripView> {
        let trip = self.queries.by_id(trip_id).await?;
        self.queries.view(trip).await
    }

    /// Trips departing at or after `after` (default: now), soonest first.
    pub async fn upcoming(&self, after: Option<DateTime<Utc>>) -> TripResult<Vec<Trip>> {
        self.queries.find_departing_after(after.unwrap_or_else(Utc::now)).await
    }

    pub async fn driver_trips(&self, driver_id: UserId) -> TripResult<Vec<Trip>> {
        self.queries.find_by_driver(driver_id).await
    }

    pub async fn list_all(&self) -> TripResult<Vec<Trip>> {
        self.queries.all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{future, madrid_paris};
    use chrono::Duration;
    use convoy_core::{TripError, UserSummary};
    use convoy_store::{InMemoryTripStore, InMemoryUserDirectory};
    use uuid::Uuid;

    fn service() -> (TripService, Arc<InMemoryTripStore>, Arc<InMemoryUserDirectory>) {
        let store = Arc::new(InMemoryTripStore::new());
        let users = Arc::new(InMemoryUserDirectory::new());
        let service = TripService::new(store.clone(), users.clone(), RetryPolicy::default(), PagingPolicy::default());
        (service, store, users)
    }

    #[tokio::test]
    async fn test_madrid_paris_search() {
        let (service, _, _) = service();
        let driver = Uuid::new_v4();

        let a = service.create(driver, &madrid_paris(), 2, future(1)).await.unwrap();
        service.join(a.id, Uuid::new_v4()).await.unwrap();

        let b = service.create(driver, &madrid_paris(), 1, future(2)).await.unwrap();
        service.join(b.id, Uuid::new_v4()).await.unwrap();

        service.create(driver, &Route::new("Paris", "Madrid"), 3, future(1)).await.unwrap();

        let criteria = FilterCriteria {
            from: Some("madrid".into()),
            to: Some("paris".into()),
            free_seats: Some(1),
            ..Default::default()
        };
        let found = service.search(&criteria).await.unwrap();

        assert_eq!(found.iter().map(|t| t.id).collect::<Vec<_>>(), vec![a.id]);
        assert_eq!(found[0].free_seats, 1);
    }

    #[tokio::test]
    async fn test_join_then_edit_keeps_seats() {
        let (service, _, _) = service();
        let trip = service.create(Uuid::new_v4(), &madrid_paris(), 3, future(1)).await.unwrap();
        let passenger = Uuid::new_v4();

        service.join(trip.id, passenger).await.unwrap();
        let edited = service
            .edit(trip.id, &TripPatch { from: Some("barcelona".into()), ..Default::default() })
            .await
            .unwrap();

        assert_eq!(edited.from, "Barcelona");
        assert_eq!(edited.passengers, vec![passenger]);
        assert_eq!(edited.free_seats, 2);
        assert_eq!(edited.version, 2);
    }

    #[tokio::test]
    async fn test_get_resolves_driver() {
        let (service, _, users) = service();
        let driver = Uuid::new_v4();
        users.register(UserSummary::new(driver, "dana")).await;
        let trip = service.create(driver, &madrid_paris(), 3, future(1)).await.unwrap();

        let view = service.get(trip.id).await.unwrap();
        assert_eq!(view.driver.username, "dana");
        assert!(view.passengers.is_empty());

        let missing = service.get(Uuid::new_v4()).await;
        assert!(matches!(missing, Err(TripError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_upcoming_and_driver_history() {
        let (service, store, _) = service();
        let driver = Uuid::new_v4();
        let upcoming = service.create(driver, &madrid_paris(), 3, future(1)).await.unwrap();

        let mut past = upcoming.clone();
        past.id = Uuid::new_v4();
        past.departure = Utc::now() - Duration::days(2);
        store.put(past.clone()).await;

        let soon: Vec<_> = service.upcoming(None).await.unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(soon, vec![upcoming.id]);

        let history = service.driver_trips(driver).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().any(|t| t.id == past.id));

        assert_eq!(service.list_all().await.unwrap().len(), 2);
        assert_eq!(service.trip(past.id).await.unwrap(), past);
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let (service, _, _) = service();
        let trip = service.create(Uuid::new_v4(), &madrid_paris(), 1, future(1)).await.unwrap();
        let passenger = Uuid::new_v4();

        service.join(trip.id, passenger).await.unwrap();

        assert!(matches!(
            service.join(trip.id, passenger).await,
            Err(TripError::DuplicatePassenger { .. })
        ));
        assert!(matches!(
            service.join(trip.id, Uuid::new_v4()).await,
            Err(TripError::CapacityExceeded { .. })
        ));
    }
}
