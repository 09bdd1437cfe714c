use super::AppState;
use crate::error::{AppError, Result};
use crate::repositories::readings::{CurrentReading, Reading};
use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// GET /api/v1/readings/current
pub async fn get_current(State(state): State<AppState>) -> Result<Json<Vec<CurrentReading>>> {
    let readings = state.readings.current().await?;
    Ok(Json(readings))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub device_id: i64,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// GET /api/v1/readings/history?device_id=&start=&end=
/// Defaults to the last 24 hours.
pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Reading>>> {
    let end = query.end.unwrap_or_else(Utc::now);
    let start = query.start.unwrap_or(end - Duration::hours(24));
    if start > end {
        return Err(AppError::Validation("start must not be after end".into()));
    }

    let readings = state.readings.history(query.device_id, start, end).await?;
    Ok(Json(readings))
}
