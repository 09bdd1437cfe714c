use super::AppState;
use crate::error::Result;
use crate::repositories::locations::{LocationCreate, TemperatureLocation};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;

/// GET /api/v1/locations
pub async fn get_all(State(state): State<AppState>) -> Result<Json<Vec<TemperatureLocation>>> {
    Ok(Json(state.locations.get_all().await?))
}

/// POST /api/v1/locations
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<LocationCreate>,
) -> Result<(StatusCode, Json<TemperatureLocation>)> {
    let location = state.locations.create(&body).await?;
    Ok((StatusCode::CREATED, Json(location)))
}

#[derive(Debug, Deserialize)]
pub struct LocationRename {
    pub name: String,
}

/// PUT /api/v1/locations/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<LocationRename>,
) -> Result<Json<TemperatureLocation>> {
    let location = state.locations.rename(id, &body.name).await?;
    state.readings.invalidate_current().await;
    Ok(Json(location))
}

/// DELETE /api/v1/locations/{id}
pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    state.locations.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
