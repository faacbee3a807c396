pub mod charts;
pub mod health;
pub mod markets;

use crate::AppState;
use axum::Router;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/charts", charts::router())
        .nest("/api/markets", markets::router())
}
