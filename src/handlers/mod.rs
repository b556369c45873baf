//! HTTP and WebSocket request handlers
//!
//! - `calls` - Health check and call status endpoints
//! - `media_stream` - Telephony media-stream WebSocket

pub mod calls;
pub mod media_stream;

pub use media_stream::media_stream_handler;
