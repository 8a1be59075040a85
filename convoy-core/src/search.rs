use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::trip::{normalize_place, Trip, UserId};

/// A passenger-facing search request. Absent fields do not filter.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    pub from: Option<String>,
    pub to: Option<String>,
    /// Minimum number of free seats a trip must still have.
    pub free_seats: Option<u32>,
    pub driver_id: Option<UserId>,
    /// Lower bound on departure. Defaults to "now", which hides past trips.
    pub departure_after: Option<DateTime<Utc>>,
    /// 1-based. Signed so that `page=-1` reaches the paging policy instead of
    /// failing to parse.
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub sort: Option<TripSort>,
}

/// Conjunctive storage-level predicate. Engines either evaluate
/// [`TripPredicate::matches`] directly or translate the fields to their query language.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripPredicate {
    pub from: Option<String>,
    pub to: Option<String>,
    pub min_free_seats: Option<u32>,
    pub driver_id: Option<UserId>,
    /// Inclusive.
    pub departure_after: Option<DateTime<Utc>>,
}

impl TripPredicate {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn matches(&self, trip: &Trip) -> bool {
        self.from.as_ref().map_or(true, |from| trip.from == *from)
            && self.to.as_ref().map_or(true, |to| trip.to == *to)
            && self.min_free_seats.map_or(true, |min| trip.free_seats >= min)
            && self.driver_id.map_or(true, |driver| trip.driver_id == driver)
            && self.departure_after.map_or(true, |after| trip.departure >= after)
    }

    /// Build the storage predicate for a search, canonicalizing route names and
    /// defaulting the departure bound to `now`.
    pub fn from_criteria(criteria: &FilterCriteria, now: DateTime<Utc>) -> Self {
        Self {
            from: criteria.from.as_deref().map(normalize_place).filter(|s| !s.is_empty()),
            to: criteria.to.as_deref().map(normalize_place).filter(|s| !s.is_empty()),
            min_free_seats: criteria.free_seats.filter(|seats| *seats > 0),
            driver_id: criteria.driver_id,
            departure_after: Some(criteria.departure_after.unwrap_or(now)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    Departure,
    FreeSeats,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Result ordering. Ties are always broken by trip id ascending so that
/// paging over a fixed data set is stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TripSort {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl TripSort {
    pub fn by_departure() -> Self {
        Self::default()
    }

    pub fn compare(&self, a: &Trip, b: &Trip) -> Ordering {
        let primary = match self.key {
            SortKey::Departure => a.departure.cmp(&b.departure),
            SortKey::FreeSeats => a.free_seats.cmp(&b.free_seats),
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        };
        let primary = match self.direction {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown sort key: {0}")]
pub struct UnknownSortKey(String);

impl FromStr for TripSort {
    type Err = UnknownSortKey;

    /// `"departure"`, `"-departure"`, `"freeSeats"`, `"-createdAt"`, ...
    /// A leading `-` sorts descending.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (direction, name) = match trimmed.strip_prefix('-') {
            Some(rest) => (SortDirection::Desc, rest),
            None => (SortDirection::Asc, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let key = match name {
            "departure" => SortKey::Departure,
            "freeSeats" | "free_seats" => SortKey::FreeSeats,
            "createdAt" | "created_at" => SortKey::CreatedAt,
            _ => return Err(UnknownSortKey(s.to_string())),
        };
        Ok(Self { key, direction })
    }
}

impl<'de> Deserialize<'de> for TripSort {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trip::NewTrip;
    use chrono::Duration;
    use uuid::Uuid;

    fn trip(from: &str, to: &str, days: i64, free_seats: u32) -> Trip {
        let new_trip = NewTrip {
            driver_id: Uuid::new_v4(),
            from: from.to_string(),
            to: to.to_string(),
            departure: Utc::now() + Duration::days(days),
            total_seats: 4,
        };
        let mut trip = Trip::from_new(Uuid::new_v4(), new_trip, Utc::now());
        trip.free_seats = free_seats;
        trip
    }

    #[test]
    fn test_sort_parsing() {
        assert_eq!("departure".parse::<TripSort>().unwrap(), TripSort::by_departure());
        let desc: TripSort = "-freeSeats".parse().unwrap();
        assert_eq!(desc.key, SortKey::FreeSeats);
        assert_eq!(desc.direction, SortDirection::Desc);
        assert!("price".parse::<TripSort>().is_err());
    }

    #[test]
    fn test_predicate_from_criteria_normalizes_and_defaults() {
        let now = Utc::now();
        let criteria = FilterCriteria {
            from: Some("madrid".into()),
            to: Some("PARIS".into()),
            free_seats: Some(1),
            ..Default::default()
        };

        let predicate = TripPredicate::from_criteria(&criteria, now);

        assert_eq!(predicate.from.as_deref(), Some("Madrid"));
        assert_eq!(predicate.to.as_deref(), Some("Paris"));
        assert_eq!(predicate.min_free_seats, Some(1));
        assert_eq!(predicate.departure_after, Some(now));
    }

    #[test]
    fn test_predicate_is_conjunctive() {
        let predicate = TripPredicate {
            from: Some("Madrid".into()),
            to: Some("Paris".into()),
            min_free_seats: Some(1),
            ..Default::default()
        };

        assert!(predicate.matches(&trip("Madrid", "Paris", 1, 2)));
        assert!(!predicate.matches(&trip("Madrid", "Paris", 2, 0)));
        assert!(!predicate.matches(&trip("Paris", "Madrid", 1, 3)));
        assert!(TripPredicate::any().matches(&trip("Paris", "Madrid", -3, 0)));
    }

    #[test]
    fn test_compare_breaks_ties_by_id() {
        let a = trip("Madrid", "Paris", 1, 2);
        let mut b = a.clone();
        b.id = Uuid::new_v4();

        let sort = TripSort::by_departure();
        assert_eq!(sort.compare(&a, &b), a.id.cmp(&b.id));

        let desc = TripSort { key: SortKey::Departure, direction: SortDirection::Desc };
        let later = trip("Madrid", "Paris", 5, 2);
        assert_eq!(desc.compare(&later, &a), Ordering::Less);
    }
}
