use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::directory::UserSummary;

pub type TripId = Uuid;
pub type UserId = Uuid;

/// A driver-published journey with a fixed number of seats.
///
/// `passengers.len() + free_seats == total_seats` holds for every stored trip;
/// only [`Trip::admit`] moves seats from free to taken.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: TripId,
    pub driver_id: UserId,
    pub from: String,
    pub to: String,
    pub departure: DateTime<Utc>,
    pub total_seats: u32,
    pub free_seats: u32,
    pub passengers: Vec<UserId>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl Trip {
    /// Materialize a freshly inserted trip. Stores call this after assigning the id.
    pub fn from_new(id: TripId, new_trip: NewTrip, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            driver_id: new_trip.driver_id,
            from: new_trip.from,
            to: new_trip.to,
            departure: new_trip.departure,
            total_seats: new_trip.total_seats,
            free_seats: new_trip.total_seats,
            passengers: Vec::new(),
            version: 0,
            created_at,
        }
    }

    pub fn has_passenger(&self, passenger_id: &UserId) -> bool {
        self.passengers.contains(passenger_id)
    }

    pub fn has_free_seat(&self) -> bool {
        self.free_seats > 0
    }

    pub fn is_seat_count_consistent(&self) -> bool {
        self.free_seats <= self.total_seats
            && self.passengers.len() as u64 + u64::from(self.free_seats) == u64::from(self.total_seats)
    }

    /// Take one seat for `passenger_id`. Callers check capacity and duplicates
    /// first; this is the mutation handed to the conditional write.
    pub fn admit(&mut self, passenger_id: UserId) {
        debug_assert!(self.has_free_seat() && !self.has_passenger(&passenger_id));
        self.passengers.push(passenger_id);
        self.free_seats -= 1;
    }

    /// Run `mutate` on a copy and keep only what a write may change: route,
    /// departure, free seats and passengers. Id, driver, capacity, version and
    /// creation time always come from `self`.
    pub fn mutated(&self, mutate: &dyn Fn(&mut Trip)) -> Trip {
        let mut draft = self.clone();
        mutate(&mut draft);
        Trip {
            from: draft.from,
            to: draft.to,
            departure: draft.departure,
            free_seats: draft.free_seats,
            passengers: draft.passengers,
            ..self.clone()
        }
    }

    pub fn apply_patch(&mut self, patch: &TripPatch) {
        if let Some(from) = &patch.from {
            self.from = from.clone();
        }
        if let Some(to) = &patch.to {
            self.to = to.clone();
        }
        if let Some(departure) = patch.departure {
            self.departure = departure;
        }
    }
}

/// Route endpoints as given by the driver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Route {
    pub from: String,
    pub to: String,
}

impl Route {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self { from: from.into(), to: to.into() }
    }

    pub fn normalized(&self) -> Self {
        Self {
            from: normalize_place(&self.from),
            to: normalize_place(&self.to),
        }
    }
}

/// Insert payload. Route endpoints are expected in canonical form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewTrip {
    pub driver_id: UserId,
    pub from: String,
    pub to: String,
    pub departure: DateTime<Utc>,
    pub total_seats: u32,
}

/// The only fields a trip edit may touch. Seat counts and the passenger list
/// are managed by admissions alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TripPatch {
    pub from: Option<String>,
    pub to: Option<String>,
    pub departure: Option<DateTime<Utc>>,
}

impl TripPatch {
    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none() && self.departure.is_none()
    }

    /// Canonicalize the route endpoints carried by the patch.
    pub fn normalized(&self) -> Self {
        Self {
            from: self.from.as_deref().map(normalize_place),
            to: self.to.as_deref().map(normalize_place),
            departure: self.departure,
        }
    }
}

/// A trip with its driver and passengers resolved for display.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TripView {
    pub id: TripId,
    pub driver: UserSummary,
    pub from: String,
    pub to: String,
    pub departure: DateTime<Utc>,
    pub total_seats: u32,
    pub free_seats: u32,
    pub passengers: Vec<UserSummary>,
    pub version: u64,
}

/// Canonical title form of a place name: trimmed, single-spaced, each word
/// (and each hyphenated part) capitalized. `"new  york"` -> `"New York"`.
pub fn normalize_place(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            word.split('-')
                .map(capitalize)
                .collect::<Vec<_>>()
                .join("-")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
