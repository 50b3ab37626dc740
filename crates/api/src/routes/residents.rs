//! Resident profile endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{NewResident, Resident};
use serde::Deserialize;

use super::parse_id;
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct RegisterResidentRequest {
    pub name: String,
    pub email: String,
}

/// `POST /residents`: registers the caller's resident profile.
pub async fn register(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    payload: Result<Json<RegisterResidentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Resident>), ApiError> {
    let Json(req) = payload?;
    let resident = state
        .orchestrator
        .register_resident(NewResident {
            user_id,
            name: req.name,
            email: req.email,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(resident)))
}

/// `GET /residents/{id}`: only the owning user can read a profile.
pub async fn get(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Resident>, ApiError> {
    let resident = state
        .orchestrator
        .get_resident(parse_id(&id, "resident")?)
        .await?;
    if resident.user_id() != user_id {
        return Err(ApiError::NotFound(format!("Resident not found: {id}")));
    }
    Ok(Json(resident))
}
