pub mod config;
pub mod core;
pub mod errors;
pub mod handlers;
pub mod routes;
pub mod state;

// Re-export commonly used items for convenience
pub use config::ServerConfig;
pub use core::*;
pub use errors::app_error::{AppError, AppResult};
pub use state::AppState;

use axum::Router;
use std::sync::Arc;

/// Every route the bridge serves, bound to `state`.
pub fn app(state: Arc<AppState>) -> Router {
    routes::api::create_api_router()
        .merge(routes::media_stream::create_media_stream_router())
        .with_state(state)
}
