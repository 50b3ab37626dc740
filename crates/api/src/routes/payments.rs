//! Payment endpoints: open a gateway order, then capture it once the payer
//! has approved.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use booking::PaymentOrder;
use common::{BookingId, UserId};
use domain::Booking;
use serde::Deserialize;

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub booking_id: BookingId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    pub booking_id: BookingId,
    pub external_order_id: String,
}

/// `POST /payments/orders`
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PaymentOrder>), ApiError> {
    let Json(req) = payload?;
    ensure_owner(&state, user_id, req.booking_id).await?;
    let order = state
        .orchestrator
        .create_payment_order(req.booking_id)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// `POST /payments/capture`
pub async fn capture(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    payload: Result<Json<CaptureRequest>, JsonRejection>,
) -> Result<Json<Booking>, ApiError> {
    let Json(req) = payload?;
    if req.external_order_id.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "externalOrderId must not be empty".to_string(),
        ));
    }
    ensure_owner(&state, user_id, req.booking_id).await?;
    let booking = state
        .orchestrator
        .capture_payment(req.booking_id, req.external_order_id.trim())
        .await?;
    Ok(Json(booking))
}

async fn ensure_owner(state: &AppState, user_id: UserId, id: BookingId) -> Result<(), ApiError> {
    let booking = state.orchestrator.get_booking_by_id(id).await?;
    if booking.user_id() != user_id {
        return Err(ApiError::NotFound(format!("Booking not found: {id}")));
    }
    Ok(())
}
