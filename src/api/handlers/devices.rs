use super::AppState;
use crate::error::Result;
use crate::repositories::devices::{DeviceCreate, DeviceUpdate, TemperatureDevice};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

/// GET /api/v1/devices
pub async fn get_all(State(state): State<AppState>) -> Result<Json<Vec<TemperatureDevice>>> {
    Ok(Json(state.devices.get_all().await?))
}

/// GET /api/v1/devices/{id}
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TemperatureDevice>> {
    Ok(Json(state.devices.get_by_id(id).await?))
}

/// POST /api/v1/devices
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<DeviceCreate>,
) -> Result<(StatusCode, Json<TemperatureDevice>)> {
    let device = state.devices.create(&body).await?;
    state.readings.invalidate_current().await;
    Ok((StatusCode::CREATED, Json(device)))
}

/// PUT /api/v1/devices/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<DeviceUpdate>,
) -> Result<Json<TemperatureDevice>> {
    let device = state.devices.update(id, &body).await?;
    // Retiring or moving a device changes what "current readings" means.
    state.readings.invalidate_current().await;
    state.hub.notify_current_readings_changed();
    Ok(Json(device))
}

/// DELETE /api/v1/devices/{id}
pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    state.devices.delete(id).await?;
    state.readings.invalidate_current().await;
    state.hub.notify_current_readings_changed();
    Ok(StatusCode::NO_CONTENT)
}
