use super::AppState;
use crate::error::Result;
use crate::repositories::leak::{WaterLeakCreate, WaterLeakDevice, WaterLeakUpdate};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

/// GET /api/v1/water-leaks
pub async fn get_all(State(state): State<AppState>) -> Result<Json<Vec<WaterLeakDevice>>> {
    Ok(Json(state.leaks.get_all().await?))
}

/// POST /api/v1/water-leaks
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<WaterLeakCreate>,
) -> Result<(StatusCode, Json<WaterLeakDevice>)> {
    let device = state.leaks.create(&body).await?;
    Ok((StatusCode::CREATED, Json(device)))
}

/// PUT /api/v1/water-leaks/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<WaterLeakUpdate>,
) -> Result<Json<WaterLeakDevice>> {
    Ok(Json(state.leaks.update(id, &body).await?))
}

/// DELETE /api/v1/water-leaks/{id}
pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    state.leaks.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
