use crate::error::{AppError, Result};
use crate::types::Platform;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
struct SubscribeParams {
    platform: Option<String>,
}

/// Market-subscription hook: eagerly creates every (side x range) channel
/// for the market so the first live tick has somewhere to land.
async fn subscribe_market(
    State(state): State<AppState>,
    Path(market_id): Path<String>,
    Query(params): Query<SubscribeParams>,
) -> Result<Json<Value>> {
    let platform = match params.platform {
        Some(name) => {
            Platform::from_str(&name).ok_or(AppError::UnsupportedPlatform(name))?
        }
        None => state.config.default_platform,
    };

    state.manager.on_market_subscribed(&market_id, platform);

    Ok(Json(json!({
        "market_id": market_id,
        "platform": platform,
        "status": "subscribed",
    })))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/:market_id/subscribe", post(subscribe_market))
}
