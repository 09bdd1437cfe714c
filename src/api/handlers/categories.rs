use super::AppState;
use crate::error::Result;
use crate::repositories::categories::{
    Category, CategoryCreate, CategoryUpdate, CategoryWithLocations,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;

/// GET /api/v1/categories
pub async fn get_all(State(state): State<AppState>) -> Result<Json<Vec<CategoryWithLocations>>> {
    Ok(Json(state.categories.get_all().await?))
}

/// POST /api/v1/categories
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CategoryCreate>,
) -> Result<(StatusCode, Json<Category>)> {
    let category = state.categories.create(&body).await?;
    state.hub.notify_categories_changed();
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/v1/categories/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<CategoryUpdate>,
) -> Result<Json<Category>> {
    let category = state.categories.update(id, &body).await?;
    state.hub.notify_categories_changed();
    Ok(Json(category))
}

#[derive(Debug, Deserialize)]
pub struct CategoryLocations {
    pub location_ids: Vec<i64>,
}

/// PUT /api/v1/categories/{id}/locations
pub async fn set_locations(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<CategoryLocations>,
) -> Result<StatusCode> {
    state.categories.set_locations(id, &body.location_ids).await?;
    state.hub.notify_categories_changed();
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/categories/{id}
pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    state.categories.delete(id).await?;
    state.hub.notify_categories_changed();
    Ok(StatusCode::NO_CONTENT)
}
