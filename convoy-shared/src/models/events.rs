use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Emitted after a trip write commits. Consumers get the committed version so
/// they can discard stale notifications.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripEvent {
    TripCreated {
        trip_id: Uuid,
        driver_id: Uuid,
        total_seats: u32,
        departure: DateTime<Utc>,
        timestamp: i64,
    },
    PassengerJoined {
        trip_id: Uuid,
        passenger_id: Uuid,
        free_seats: u32,
        version: u64,
        timestamp: i64,
    },
    TripUpdated {
        trip_id: Uuid,
        version: u64,
        timestamp: i64,
    },
}

impl TripEvent {
    pub fn trip_id(&self) -> Uuid {
        match self {
            TripEvent::TripCreated { trip_id, .. }
            | TripEvent::PassengerJoined { trip_id, .. }
            | TripEvent::TripUpdated { trip_id, .. } => *trip_id,
        }
    }

    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            TripEvent::TripCreated { .. } => "trip_created",
            TripEvent::PassengerJoined { .. } => "passenger_joined",
            TripEvent::TripUpdated { .. } => "trip_updated",
        }
    }
}
