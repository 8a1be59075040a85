use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use convoy_core::{
    FilterCriteria, Trip, TripId, TripPredicate, TripResult, TripSort, TripStore, TripView, UserDirectory, UserId,
    UserSummary,
};
use tracing::debug;

/// Page size bounds for searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingPolicy {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PagingPolicy {
    fn default() -> Self {
        Self { default_page_size: 20, max_page_size: 100 }
    }
}

impl PagingPolicy {
    /// `(skip, limit)` for a 1-based page. Pages below 1 read as 1; a missing,
    /// zero or negative size falls back to the default; sizes above the maximum
    /// are clamped.
    pub fn window(&self, page: Option<i64>, page_size: Option<i64>) -> (usize, usize) {
        let page = u64::try_from(page.unwrap_or(1).max(1)).unwrap_or(1);
        let max = u64::from(self.max_page_size.max(1));
        let size = match page_size.and_then(|size| u64::try_from(size).ok()) {
            None | Some(0) => u64::from(self.default_page_size),
            Some(size) => size,
        }
        .clamp(1, max);

        let skip = (page - 1).saturating_mul(size);
        (usize::try_from(skip).unwrap_or(usize::MAX), usize::try_from(size).unwrap_or(usize::MAX))
    }
}

/// Read side: filtered, ordered, paginated trip listings.
pub struct TripQueryEngine {
    store: Arc<dyn TripStore>,
    users: Arc<dyn UserDirectory>,
    paging: PagingPolicy,
}

impl TripQueryEngine {
    pub fn new(store: Arc<dyn TripStore>, users: Arc<dyn UserDirectory>, paging: PagingPolicy) -> Self {
        Self { store, users, paging }
    }

    /// One page of trips matching every supplied criterion, with driver and
    /// passengers resolved. Past departures are excluded unless the caller
    /// passes an explicit `departure_after`.
    pub async fn filter(&self, criteria: &FilterCriteria) -> TripResult<Vec<TripView>> {
        let predicate = TripPredicate::from_criteria(criteria, Utc::now());
        let sort = criteria.sort.unwrap_or_default();
        let (skip, limit) = self.paging.window(criteria.page, criteria.page_size);

        let trips = self.store.search(&predicate, sort, skip, Some(limit)).await?;
        debug!(?predicate, skip, limit, found = trips.len(), "Trip filter");

        self.resolve(trips).await
    }

    pub async fn find_departing_after(&self, date: DateTime<Utc>) -> TripResult<Vec<Trip>> {
        let predicate = TripPredicate { departure_after: Some(date), ..Default::default() };
        Ok(self.store.search(&predicate, TripSort::by_departure(), 0, None).await?)
    }

    /// The driver's whole history, past trips included. No ordering promised.
    pub async fn find_by_driver(&self, driver_id: UserId) -> TripResult<Vec<Trip>> {
        let predicate = TripPredicate { driver_id: Some(driver_id), ..Default::default() };
        Ok(self.store.search(&predicate, TripSort::by_departure(), 0, None).await?)
    }

    pub async fn all(&self) -> TripResult<Vec<Trip>> {
        Ok(self.store.search(&TripPredicate::any(), TripSort::by_departure(), 0, None).await?)
    }

    pub async fn by_id(&self, trip_id: TripId) -> TripResult<Trip> {
        Ok(self.store.get_by_id(trip_id).await?)
    }

    pub async fn view(&self, trip: Trip) -> TripResult<TripView> {
        let mut views = self.resolve(vec![trip]).await?;
        Ok(views.remove(0))
    }

    /// Read-time join against the user directory: one lookup for the whole page.
    async fn resolve(&self, trips: Vec<Trip>) -> TripResult<Vec<TripView>> {
        let mut ids: Vec<UserId> = trips
            .iter()
            .flat_map(|trip| std::iter::once(trip.driver_id).chain(trip.passengers.iter().copied()))
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let users = if ids.is_empty() {
            HashMap::new()
        } else {
            self.users.summaries(&ids).await?
        };
        let summary = |id: &UserId| users.get(id).cloned().unwrap_or_else(|| UserSummary::unresolved(*id));

        Ok(trips
            .into_iter()
            .map(|trip| TripView {
                id: trip.id,
                driver: summary(&trip.driver_id),
                passengers: trip.passengers.iter().map(summary).collect(),
                from: trip.from,
                to: trip.to,
                departure: trip.departure,
                total_seats: trip.total_seats,
                free_seats: trip.free_seats,
                version: trip.version,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::future;
    use chrono::Duration;
    use convoy_core::{NewTrip, SortDirection, SortKey};
    use convoy_store::{InMemoryTripStore, InMemoryUserDirectory};
    use uuid::Uuid;

    struct Fixture {
        store: Arc<InMemoryTripStore>,
        users: Arc<InMemoryUserDirectory>,
        engine: TripQueryEngine,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryTripStore::new());
        let users = Arc::new(InMemoryUserDirectory::new());
        let engine = TripQueryEngine::new(store.clone(), users.clone(), PagingPolicy::default());
        Fixture { store, users, engine }
    }

    async fn seed(store: &InMemoryTripStore, from: &str, to: &str, departure: DateTime<Utc>, free_seats: u32) -> Trip {
        let mut trip = Trip::from_new(
            Uuid::new_v4(),
            NewTrip {
                driver_id: Uuid::new_v4(),
                from: from.into(),
                to: to.into(),
                departure,
                total_seats: 3,
            },
            Utc::now(),
        );
        for _ in free_seats..3 {
            trip.admit(Uuid::new_v4());
        }
        store.put(trip.clone()).await;
        trip
    }

    #[test]
    fn test_paging_window() {
        let paging = PagingPolicy::default();
        assert_eq!(paging.window(None, None), (0, 20));
        assert_eq!(paging.window(Some(0), Some(5)), (0, 5));
        assert_eq!(paging.window(Some(3), Some(5)), (10, 5));
        assert_eq!(paging.window(Some(2), Some(0)), (20, 20));
        assert_eq!(paging.window(Some(1), Some(1000)), (0, 100));
        assert_eq!(paging.window(Some(-1), Some(5)), (0, 5));
        assert_eq!(paging.window(Some(2), Some(-5)), (20, 20));
    }

    #[tokio::test]
    async fn test_filter_route_and_free_seats() {
        let fx = fixture();
        let a = seed(&fx.store, "Madrid", "Paris", future(1), 2).await;
        seed(&fx.store, "Madrid", "Paris", future(2), 0).await;
        seed(&fx.store, "Paris", "Madrid", future(1), 3).await;

        let criteria = FilterCriteria {
            from: Some("madrid".into()),
            to: Some("paris".into()),
            free_seats: Some(1),
            ..Default::default()
        };
        let found = fx.engine.filter(&criteria).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, a.id);
    }

    #[tokio::test]
    async fn test_filter_hides_past_trips_by_default() {
        let fx = fixture();
        let past = seed(&fx.store, "Madrid", "Paris", Utc::now() - Duration::days(1), 3).await;
        let upcoming = seed(&fx.store, "Madrid", "Paris", future(1), 3).await;

        let found = fx.engine.filter(&FilterCriteria::default()).await.unwrap();
        assert_eq!(found.iter().map(|t| t.id).collect::<Vec<_>>(), vec![upcoming.id]);

        let historical = FilterCriteria {
            departure_after: Some(Utc::now() - Duration::days(7)),
            ..Default::default()
        };
        let found = fx.engine.filter(&historical).await.unwrap();
        assert_eq!(found.iter().map(|t| t.id).collect::<Vec<_>>(), vec![past.id, upcoming.id]);

        let by_driver = fx.engine.find_by_driver(past.driver_id).await.unwrap();
        assert_eq!(by_driver, vec![past]);
    }

    #[tokio::test]
    async fn test_filter_by_driver_keeps_departure_bound() {
        let fx = fixture();
        let driver = Uuid::new_v4();
        let mut upcoming = seed(&fx.store, "Madrid", "Paris", future(1), 3).await;
        upcoming.driver_id = driver;
        fx.store.put(upcoming.clone()).await;
        let mut past = seed(&fx.store, "Madrid", "Paris", Utc::now() - Duration::days(1), 3).await;
        past.driver_id = driver;
        fx.store.put(past).await;
        seed(&fx.store, "Madrid", "Paris", future(2), 3).await;

        let criteria = FilterCriteria { driver_id: Some(driver), ..Default::default() };
        let found = fx.engine.filter(&criteria).await.unwrap();

        assert_eq!(found.iter().map(|t| t.id).collect::<Vec<_>>(), vec![upcoming.id]);
        assert_eq!(found[0].driver.id, driver);
    }

    #[tokio::test]
    async fn test_pages_are_disjoint_and_contiguous() {
        let fx = fixture();
        let departure = future(1);
        // Shared departure forces the id tie-breaker to decide the order.
        for _ in 0..3 {
            seed(&fx.store, "Madrid", "Paris", departure, 3).await;
        }
        seed(&fx.store, "Madrid", "Paris", future(2), 3).await;
        seed(&fx.store, "Madrid", "Paris", future(3), 3).await;

        let page = |n: i64| FilterCriteria { page: Some(n), page_size: Some(2), ..Default::default() };
        let first = fx.engine.filter(&page(1)).await.unwrap();
        let second = fx.engine.filter(&page(2)).await.unwrap();
        let everything = fx
            .engine
            .filter(&FilterCriteria { page_size: Some(100), ..Default::default() })
            .await
            .unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        let paged: Vec<_> = first.iter().chain(second.iter()).map(|t| t.id).collect();
        let expected: Vec<_> = everything.iter().take(4).map(|t| t.id).collect();
        assert_eq!(paged, expected);
    }

    #[tokio::test]
    async fn test_filter_sort_descending() {
        let fx = fixture();
        let soon = seed(&fx.store, "Madrid", "Paris", future(1), 3).await;
        let later = seed(&fx.store, "Madrid", "Paris", future(2), 3).await;

        let criteria = FilterCriteria {
            sort: Some(TripSort { key: SortKey::Departure, direction: SortDirection::Desc }),
            ..Default::default()
        };
        let found = fx.engine.filter(&criteria).await.unwrap();

        assert_eq!(found.iter().map(|t| t.id).collect::<Vec<_>>(), vec![later.id, soon.id]);
    }

    #[tokio::test]
    async fn test_filter_resolves_people() {
        let fx = fixture();
        let trip = seed(&fx.store, "Madrid", "Paris", future(1), 1).await;
        let driver = UserSummary::new(trip.driver_id, "driver").with_name("Dana", "Driver");
        fx.users.register(driver.clone()).await;
        let known_passenger = UserSummary::new(trip.passengers[0], "pax");
        fx.users.register(known_passenger.clone()).await;

        let found = fx.engine.filter(&FilterCriteria::default()).await.unwrap();

        assert_eq!(found[0].driver, driver);
        assert_eq!(found[0].passengers.len(), 2);
        assert_eq!(found[0].passengers[0], known_passenger);
        assert_eq!(found[0].passengers[1], UserSummary::unresolved(trip.passengers[1]));
    }

    #[tokio::test]
    async fn test_find_departing_after_is_sorted() {
        let fx = fixture();
        let late = seed(&fx.store, "Sofia", "Varna", future(5), 3).await;
        let early = seed(&fx.store, "Madrid", "Paris", future(1), 3).await;
        seed(&fx.store, "Madrid", "Paris", Utc::now() - Duration::days(1), 3).await;

        let found = fx.engine.find_departing_after(Utc::now()).await.unwrap();

        assert_eq!(found.iter().map(|t| t.id).collect::<Vec<_>>(), vec![early.id, late.id]);
        assert_eq!(fx.engine.all().await.unwrap().len(), 3);
    }
}
