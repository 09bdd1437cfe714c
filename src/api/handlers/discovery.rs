use super::AppState;
use crate::discovery::{DiscoveryRequest, DiscoveryStatus};
use crate::error::Result;
use axum::{extract::State, response::Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: DiscoveryStatus,
}

/// GET /api/v1/discovery/status
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: state.discovery.status(),
    })
}

/// POST /api/v1/discovery/setup
pub async fn setup(
    State(state): State<AppState>,
    Json(request): Json<DiscoveryRequest>,
) -> Result<Json<StatusResponse>> {
    state.discovery.setup(&request).await?;
    Ok(Json(StatusResponse {
        status: state.discovery.status(),
    }))
}

/// POST /api/v1/discovery/teardown
pub async fn teardown(State(state): State<AppState>) -> Result<Json<StatusResponse>> {
    state.discovery.teardown().await?;
    Ok(Json(StatusResponse {
        status: state.discovery.status(),
    }))
}
