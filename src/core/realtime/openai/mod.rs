//! OpenAI Realtime API module.
//!
//! # Supported Voices
//!
//! alloy, ash, ballad, coral, echo, sage, shimmer, verse
//!
//! # Example
//!
//! ```rust,ignore
//! use call_bridge::core::realtime::{OpenAIRealtimeConnector, RealtimeSettings, UpstreamConnector};
//!
//! let settings = RealtimeSettings::default();
//! let connector = OpenAIRealtimeConnector::new("sk-...", settings.clone())?;
//! let mut link = connector.connect(settings.session_config(instructions)).await?;
//!
//! while let Some(signal) = link.recv().await {
//!     // react to UpstreamSignal::Event(..)
//! }
//! ```

mod client;
mod config;
mod messages;

pub use client::OpenAIRealtimeConnector;
pub use config::{
    DEFAULT_REALTIME_MODEL, DEFAULT_TRANSCRIPTION_MODEL, OPENAI_REALTIME_URL, OpenAIRealtimeVoice,
    RealtimeSettings, VadSettings,
};
pub use messages::{
    ApiError, ClientEvent, InputAudioTranscription, RateLimit, ResponseConfig, ResponseInfo,
    ServerEvent, SessionConfig, SessionInfo, TurnDetection,
};
