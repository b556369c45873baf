use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::calls;
use crate::state::AppState;
use std::sync::Arc;

/// Create the control surface router
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(calls::health_check))
        .route("/calls", get(calls::list_calls))
        .route("/call/{call_id}", get(calls::get_call))
        .layer(TraceLayer::new_for_http())
}
