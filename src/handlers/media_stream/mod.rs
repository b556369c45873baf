//! Telephony media-stream WebSocket
//!
//! One connection per phone call. The final path segment of
//! `/media-stream/{callId}` names the call; optional query parameters
//! (`contactName`, `purpose`, `ownerName`, `ownerCompany`) personalise the
//! assistant.
//!
//! # Protocol
//!
//! ## Telephony → Bridge
//!
//! - **connected**: informational
//! - **start**: carries `start.streamSid`; audio starts flowing
//! - **media**: base64 µ-law chunk in `media.payload`
//! - **mark**: playback checkpoint acknowledgement
//! - **stop**: the call is over
//!
//! ## Bridge → Telephony
//!
//! - **media**: assistant audio
//! - **mark**: sent after each audio chunk
//! - **clear**: drop buffered playback when the caller interrupts
//!
//! Connections without a call id, or for an id that is still tracked, are
//! closed with 1008. If the realtime endpoint cannot be configured the
//! connection is closed with 1011.

mod handler;
pub mod messages;
mod relay;

pub use handler::media_stream_handler;
pub use relay::MediaRelay;
