//! Realtime conversational AI endpoint.
//!
//! # Architecture
//!
//! - [`UpstreamConnector`] opens one connection per call and returns an
//!   [`UpstreamLink`]
//! - The link is a pair of bounded channels; a pump task owns the socket
//! - [`openai`] implements the connector for the OpenAI Realtime API
//!
//! # Audio Format
//!
//! The endpoint is configured for either G.711 µ-law at 8kHz (matching the
//! telephony side) or PCM 16-bit little-endian at 24kHz.

mod base;
pub mod openai;

pub use base::{
    LINK_CHANNEL_CAPACITY, RealtimeError, RealtimeResult, UpstreamConnector, UpstreamEndpoint,
    UpstreamLink, UpstreamSignal,
};
pub use openai::{
    ClientEvent, OPENAI_REALTIME_URL, OpenAIRealtimeConnector, OpenAIRealtimeVoice,
    RealtimeSettings, ServerEvent, SessionConfig, VadSettings,
};
