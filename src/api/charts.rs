use crate::error::{AppError, Result};
use crate::services::ManagerStats;
use crate::types::{DataPoint, Side, TimeRange};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

#[derive(Serialize)]
struct ChartResponse {
    market_id: String,
    side: Side,
    range: TimeRange,
    data: Vec<DataPoint>,
}

async fn chart(
    State(state): State<AppState>,
    Path((market_id, side, range)): Path<(String, String, String)>,
) -> Result<Json<ChartResponse>> {
    let side = Side::from_str(&side)
        .ok_or_else(|| AppError::BadRequest(format!("unknown side: {}", side)))?;
    let range = TimeRange::from_str(&range)
        .ok_or_else(|| AppError::BadRequest(format!("unknown range: {}", range)))?;

    let data = state.manager.channel_cache(&market_id, side, range);

    Ok(Json(ChartResponse {
        market_id,
        side,
        range,
        data,
    }))
}

async fn stats(State(state): State<AppState>) -> Json<ManagerStats> {
    Json(state.manager.stats())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats))
        .route("/:market_id/:side/:range", get(chart))
}
