//! Media-stream WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::media_stream_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the media-stream WebSocket router
///
/// # Endpoints
///
/// - `GET /media-stream/{call_id}` - WebSocket upgrade for one call
/// - `GET /media-stream` and `GET /media-stream/` - upgraded, then closed
///   with 1008 because no call id is present
///
/// Optional query parameters: `contactName`, `purpose`, `ownerName`,
/// `ownerCompany`.
pub fn create_media_stream_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/media-stream", get(media_stream_handler))
        .route("/media-stream/", get(media_stream_handler))
        .route("/media-stream/{call_id}", get(media_stream_handler))
        .layer(TraceLayer::new_for_http())
}
