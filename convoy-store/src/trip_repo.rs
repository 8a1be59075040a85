use async_trait::async_trait;
use chrono::{DateTime, Utc};
use convoy_core::{
    NewTrip, SortDirection, SortKey, StoreError, Trip, TripId, TripMutation, TripPredicate, TripSort,
    TripStore,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

const TRIP_COLUMNS: &str =
    "id, driver_id, origin, destination, departure, total_seats, free_seats, passengers, version, created_at";

/// Trips in PostgreSQL. Optimistic locking rides on the `version` column:
/// every write is `... WHERE id = $1 AND version = $2`.
pub struct PostgresTripStore {
    pool: PgPool,
}

impl PostgresTripStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn current_version(&self, id: TripId) -> Result<Option<i64>, StoreError> {
        let version: Option<i64> = sqlx::query_scalar("SELECT version FROM trips WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        Ok(version)
    }
}

#[derive(sqlx::FromRow)]
struct TripRow {
    id: Uuid,
    driver_id: Uuid,
    origin: String,
    destination: String,
    departure: DateTime<Utc>,
    total_seats: i32,
    free_seats: i32,
    passengers: Vec<Uuid>,
    version: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<TripRow> for Trip {
    type Error = StoreError;

    fn try_from(row: TripRow) -> Result<Self, Self::Error> {
        let corrupt = |field: &str| StoreError::Corrupt(format!("trip {} has negative {}", row.id, field));
        let total_seats = u32::try_from(row.total_seats).map_err(|_| corrupt("total_seats"))?;
        let free_seats = u32::try_from(row.free_seats).map_err(|_| corrupt("free_seats"))?;
        let version = stored_version(row.id, row.version)?;

        Ok(Trip {
            id: row.id,
            driver_id: row.driver_id,
            from: row.origin,
            to: row.destination,
            departure: row.departure,
            total_seats,
            free_seats,
            passengers: row.passengers,
            version,
            created_at: row.created_at,
        })
    }
}

fn to_db_int(value: u32, field: &str) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{} out of range: {}", field, value)))
}

fn to_db_version(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Corrupt(format!("version out of range: {}", value)))
}

fn stored_version(id: TripId, version: i64) -> Result<u64, StoreError> {
    u64::try_from(version).map_err(|_| StoreError::Corrupt(format!("trip {} has negative version", id)))
}

fn sort_clause(sort: TripSort) -> &'static str {
    match (sort.key, sort.direction) {
        (SortKey::Departure, SortDirection::Asc) => " ORDER BY departure ASC, id ASC",
        (SortKey::Departure, SortDirection::Desc) => " ORDER BY departure DESC, id ASC",
        (SortKey::FreeSeats, SortDirection::Asc) => " ORDER BY free_seats ASC, id ASC",
        (SortKey::FreeSeats, SortDirection::Desc) => " ORDER BY free_seats DESC, id ASC",
        (SortKey::CreatedAt, SortDirection::Asc) => " ORDER BY created_at ASC, id ASC",
        (SortKey::CreatedAt, SortDirection::Desc) => " ORDER BY created_at DESC, id ASC",
    }
}

fn push_predicate(builder: &mut QueryBuilder<'_, Postgres>, predicate: &TripPredicate) {
    builder.push(" WHERE TRUE");
    if let Some(from) = &predicate.from {
        builder.push(" AND origin = ").push_bind(from.clone());
    }
    if let Some(to) = &predicate.to {
        builder.push(" AND destination = ").push_bind(to.clone());
    }
    if let Some(min_free) = predicate.min_free_seats {
        builder.push(" AND free_seats >= ").push_bind(i64::from(min_free));
    }
    if let Some(driver_id) = predicate.driver_id {
        builder.push(" AND driver_id = ").push_bind(driver_id);
    }
    if let Some(after) = predicate.departure_after {
        builder.push(" AND departure >= ").push_bind(after);
    }
}

#[async_trait]
impl TripStore for PostgresTripStore {
    async fn get_by_id(&self, id: TripId) -> Result<Trip, StoreError> {
        let row: Option<TripRow> = sqlx::query_as(&format!("SELECT {} FROM trips WHERE id = $1", TRIP_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        row.ok_or(StoreError::NotFound(id))?.try_into()
    }

    async fn insert(&self, new_trip: NewTrip) -> Result<Trip, StoreError> {
        let trip = Trip::from_new(Uuid::new_v4(), new_trip, Utc::now());
        let total_seats = to_db_int(trip.total_seats, "total_seats")?;

        sqlx::query(
            r#"
            INSERT INTO trips (id, driver_id, origin, destination, departure, total_seats, free_seats, passengers, version, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6, $7, 0, $8)
            "#,
        )
        .bind(trip.id)
        .bind(trip.driver_id)
        .bind(&trip.from)
        .bind(&trip.to)
        .bind(trip.departure)
        .bind(total_seats)
        .bind(&trip.passengers)
        .bind(trip.created_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(trip)
    }

    async fn update_if_version_matches(
        &self,
        id: TripId,
        expected_version: u64,
        mutate: TripMutation<'_>,
    ) -> Result<Trip, StoreError> {
        let current = self.get_by_id(id).await?;
        if current.version != expected_version {
            return Err(StoreError::VersionConflict {
                id,
                expected: expected_version,
                actual: current.version,
            });
        }

        let mut updated = current.mutated(mutate);
        if !updated.is_seat_count_consistent() {
            return Err(StoreError::Corrupt(format!(
                "update would break seat count on trip {}",
                id
            )));
        }

        let result = sqlx::query(
            r#"
            UPDATE trips
            SET origin = $3, destination = $4, departure = $5, free_seats = $6, passengers = $7,
                version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(id)
        .bind(to_db_version(expected_version)?)
        .bind(&updated.from)
        .bind(&updated.to)
        .bind(updated.departure)
        .bind(to_db_int(updated.free_seats, "free_seats")?)
        .bind(&updated.passengers)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        if result.rows_affected() == 0 {
            // Someone committed between our read and our write, or the row is gone.
            return match self.current_version(id).await? {
                None => Err(StoreError::NotFound(id)),
                Some(actual) => {
                    debug!(trip_id = %id, expected_version, actual, "conditional write lost the race");
                    Err(StoreError::VersionConflict {
                        id,
                        expected: expected_version,
                        actual: stored_version(id, actual)?,
                    })
                }
            };
        }

        updated.version = expected_version + 1;
        Ok(updated)
    }

    async fn search(
        &self,
        predicate: &TripPredicate,
        sort: TripSort,
        skip: usize,
        limit: Option<usize>,
    ) -> Result<Vec<Trip>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM trips", TRIP_COLUMNS));
        push_predicate(&mut builder, predicate);
        builder.push(sort_clause(sort));
        if let Some(limit) = limit {
            builder.push(" LIMIT ").push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        builder.push(" OFFSET ").push_bind(i64::try_from(skip).unwrap_or(i64::MAX));

        let rows: Vec<TripRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        rows.into_iter().map(Trip::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_clause_always_breaks_ties_by_id() {
        for key in [SortKey::Departure, SortKey::FreeSeats, SortKey::CreatedAt] {
            for direction in [SortDirection::Asc, SortDirection::Desc] {
                assert!(sort_clause(TripSort { key, direction }).ends_with(", id ASC"));
            }
        }
    }

    #[test]
    fn test_predicate_sql_is_conjunctive() {
        let predicate = TripPredicate {
            from: Some("Madrid".into()),
            to: Some("Paris".into()),
            min_free_seats: Some(1),
            driver_id: Some(Uuid::new_v4()),
            departure_after: Some(Utc::now()),
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT id FROM trips");
        push_predicate(&mut builder, &predicate);

        assert_eq!(
            builder.sql(),
            "SELECT id FROM trips WHERE TRUE AND origin = $1 AND destination = $2 AND free_seats >= $3 AND driver_id = $4 AND departure >= $5"
        );
    }

    #[test]
    fn test_negative_version_is_corrupt() {
        let id = Uuid::new_v4();
        assert_eq!(stored_version(id, 4).unwrap(), 4);
        assert!(matches!(stored_version(id, -1), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_negative_row_is_corrupt() {
        let row = TripRow {
            id: Uuid::new_v4(),
            driver_id: Uuid::new_v4(),
            origin: "Madrid".into(),
            destination: "Paris".into(),
            departure: Utc::now(),
            total_seats: 3,
            free_seats: -1,
            passengers: vec![],
            version: 0,
            created_at: Utc::now(),
        };
        assert!(matches!(Trip::try_from(row), Err(StoreError::Corrupt(_))));
    }
}
