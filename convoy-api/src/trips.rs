use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, patch, post},
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, Utc};
use convoy_core::{FilterCriteria, Route, Trip, TripId, TripPatch, TripView, UserId};
use convoy_shared::TripEvent;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

use crate::error::AppError;
use crate::middleware::{auth_middleware, Claims};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTripRequest {
    pub from: String,
    pub to: String,
    pub departure: DateTime<Utc>,
    pub total_seats: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    pub after: Option<DateTime<Utc>>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/v1/trips", get(search_trips))
        .route("/v1/trips/upcoming", get(upcoming_trips))
        .route("/v1/trips/{id}", get(get_trip))
        .route("/v1/trips/{id}/stream", get(trip_stream))
        .route("/v1/drivers/{id}/trips", get(driver_trips));

    let authenticated = Router::new()
        .route("/v1/trips", post(create_trip))
        .route("/v1/trips/{id}", patch(edit_trip))
        .route("/v1/trips/{id}/passengers", post(join_trip))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    public.merge(authenticated)
}

async fn create_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<CreateTripRequest>, AppError>,
) -> Result<(StatusCode, Json<Trip>), AppError> {
    let route = Route::new(req.from, req.to);
    let trip = state
        .trips
        .create(claims.sub, &route, req.total_seats, req.departure)
        .await?;

    state.metrics.record_trip_created();
    state.publish(TripEvent::TripCreated {
        trip_id: trip.id,
        driver_id: trip.driver_id,
        total_seats: trip.total_seats,
        departure: trip.departure,
        timestamp: Utc::now().timestamp(),
    });

    Ok((StatusCode::CREATED, Json(trip)))
}

async fn search_trips(
    State(state): State<AppState>,
    WithRejection(Query(criteria), _): WithRejection<Query<FilterCriteria>, AppError>,
) -> Result<Json<Vec<TripView>>, AppError> {
    Ok(Json(state.trips.search(&criteria).await?))
}

async fn upcoming_trips(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<UpcomingQuery>, AppError>,
) -> Result<Json<Vec<Trip>>, AppError> {
    Ok(Json(state.trips.upcoming(query.after).await?))
}

async fn get_trip(State(state): State<AppState>, Path(id): Path<TripId>) -> Result<Json<TripView>, AppError> {
    Ok(Json(state.trips.get(id).await?))
}

async fn driver_trips(
    State(state): State<AppState>,
    Path(driver_id): Path<UserId>,
) -> Result<Json<Vec<Trip>>, AppError> {
    Ok(Json(state.trips.driver_trips(driver_id).await?))
}

async fn join_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<TripId>,
) -> Result<Json<Trip>, AppError> {
    let result = state.trips.join(id, claims.sub).await;
    state.metrics.record_admission(&result);
    let trip = result?;

    state.publish(TripEvent::PassengerJoined {
        trip_id: trip.id,
        passenger_id: claims.sub,
        free_seats: trip.free_seats,
        version: trip.version,
        timestamp: Utc::now().timestamp(),
    });

    Ok(Json(trip))
}

/// Only the trip's driver may edit it.
async fn edit_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<TripId>,
    WithRejection(Json(patch), _): WithRejection<Json<TripPatch>, AppError>,
) -> Result<Json<Trip>, AppError> {
    let current = state.trips.trip(id).await?;
    if current.driver_id != claims.sub {
        return Err(AppError::Forbidden("Only the driver can edit this trip".to_string()));
    }

    let result = state.trips.edit(id, &patch).await;
    state.metrics.record_edit(&result);
    let trip = result?;

    state.publish(TripEvent::TripUpdated {
        trip_id: trip.id,
        version: trip.version,
        timestamp: Utc::now().timestamp(),
    });

    Ok(Json(trip))
}

/// Server-sent events for one trip: creations, admissions, edits.
async fn trip_stream(
    State(state): State<AppState>,
    Path(id): Path<TripId>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    // 404 for trips that do not exist rather than an empty stream forever.
    state.trips.trip(id).await?;

    let rx = state.events.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if event.trip_id() == id => Some(Event::default().event(event.name()).json_data(&event)),
            Ok(_) => None,
            Err(lagged) => {
                debug!(trip_id = %id, error = %lagged, "Stream subscriber lagged");
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
