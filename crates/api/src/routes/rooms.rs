//! Room inventory endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use domain::{Money, NewRoom, Room, RoomType};
use serde::Deserialize;

use super::parse_id;
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub room_number: String,
    pub room_type: RoomType,
    pub price_per_night_cents: i64,
    pub capacity: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListRoomsQuery {
    #[serde(default)]
    pub available: bool,
}

/// `POST /rooms`
pub async fn create(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<CreateRoomRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Room>), ApiError> {
    let Json(req) = payload?;
    let room = state
        .orchestrator
        .add_room(NewRoom {
            room_number: req.room_number,
            room_type: req.room_type,
            price_per_night: Money::from_cents(req.price_per_night_cents),
            capacity: req.capacity,
        })
        .await?;

    tracing::info!(room_id = %room.id(), added_by = %user, "room added");
    Ok((StatusCode::CREATED, Json(room)))
}

/// `GET /rooms?available=true`
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListRoomsQuery>,
) -> Result<Json<Vec<Room>>, ApiError> {
    let rooms = state.orchestrator.list_rooms(query.available).await?;
    Ok(Json(rooms))
}

/// `GET /rooms/{id}`
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Room>, ApiError> {
    let room = state.orchestrator.get_room(parse_id(&id, "room")?).await?;
    Ok(Json(room))
}
