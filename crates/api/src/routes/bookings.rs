//! Booking lifecycle endpoints.
//!
//! Bookings are addressed by reference. A booking owned by another user is
//! reported as not found.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use booking::{BookingConfirmation, CreateBookingRequest};
use common::UserId;
use domain::Booking;

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::ApiError;

/// `POST /bookings`
pub async fn create(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BookingConfirmation>), ApiError> {
    let Json(req) = payload?;
    let confirmation = state.orchestrator.create_booking(user_id, req).await?;
    Ok((StatusCode::CREATED, Json(confirmation)))
}

/// `GET /bookings`: the caller's bookings, oldest first.
pub async fn list(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let bookings = state.orchestrator.bookings_for_user(user_id).await?;
    Ok(Json(bookings))
}

/// `GET /bookings/{reference}`
pub async fn get(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(reference): Path<String>,
) -> Result<Json<Booking>, ApiError> {
    let booking = owned(&state, user_id, &reference).await?;
    Ok(Json(booking))
}

/// `POST /bookings/{reference}/cancel`
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(reference): Path<String>,
) -> Result<Json<Booking>, ApiError> {
    owned(&state, user_id, &reference).await?;
    let booking = state.orchestrator.cancel_booking(&reference).await?;
    Ok(Json(booking))
}

/// `POST /bookings/{reference}/refund`
pub async fn refund(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(reference): Path<String>,
) -> Result<Json<Booking>, ApiError> {
    owned(&state, user_id, &reference).await?;
    let booking = state.orchestrator.refund_booking(&reference).await?;
    Ok(Json(booking))
}

/// `POST /bookings/{reference}/complete`
pub async fn complete(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(reference): Path<String>,
) -> Result<Json<Booking>, ApiError> {
    owned(&state, user_id, &reference).await?;
    let booking = state.orchestrator.complete_stay(&reference).await?;
    Ok(Json(booking))
}

async fn owned(state: &AppState, user_id: UserId, reference: &str) -> Result<Booking, ApiError> {
    let booking = state.orchestrator.get_booking(reference).await?;
    if booking.user_id() != user_id {
        return Err(ApiError::NotFound(format!("Booking not found: {reference}")));
    }
    Ok(booking)
}
