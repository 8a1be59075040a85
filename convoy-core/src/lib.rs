pub mod trip;
pub mod search;
pub mod repository;
pub mod directory;

pub use trip::{normalize_place, NewTrip, Route, Trip, TripId, TripPatch, TripView, UserId};
pub use search::{FilterCriteria, SortDirection, SortKey, TripPredicate, TripSort};
pub use repository::{StoreError, TripMutation, TripStore};
pub use directory::{UserDirectory, UserSummary};

/// Every failure a trip operation can surface to its caller.
#[derive(Debug, thiserror::Error)]
pub enum TripError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Trip not found: {0}")]
    NotFound(TripId),

    #[error("Trip {trip_id} has no free seats")]
    CapacityExceeded { trip_id: TripId },

    #[error("Passenger {passenger_id} already joined trip {trip_id}")]
    DuplicatePassenger { trip_id: TripId, passenger_id: UserId },

    #[error("Trip {trip_id} kept changing underneath us, gave up after {attempts} attempts")]
    ConcurrentModification { trip_id: TripId, attempts: u32 },

    #[error("Storage failure: {0}")]
    Storage(#[source] StoreError),
}

impl TripError {
    /// Only lost optimistic-lock races are worth retrying as a whole request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TripError::ConcurrentModification { .. })
    }

    /// Stable machine-readable code for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            TripError::Validation(_) => "VALIDATION",
            TripError::NotFound(_) => "NOT_FOUND",
            TripError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            TripError::DuplicatePassenger { .. } => "DUPLICATE_PASSENGER",
            TripError::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
            TripError::Storage(_) => "STORAGE",
        }
    }
}

impl From<StoreError> for TripError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => TripError::NotFound(id),
            other => TripError::Storage(other),
        }
    }
}

pub type TripResult<T> = Result<T, TripError>;
