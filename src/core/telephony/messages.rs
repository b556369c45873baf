//! Telephony media-stream frame types.
//!
//! Frames are JSON text messages discriminated by the `event` field.
//!
//! Inbound (telephony edge → bridge):
//! - connected - Socket established
//! - start - Stream metadata, carries the stream token (`streamSid`)
//! - media - One base64 µ-law audio chunk
//! - mark - A previously sent mark finished playing
//! - stop - The call ended
//!
//! Outbound (bridge → telephony edge):
//! - media - Audio to play to the caller
//! - mark - Playback checkpoint, echoed back once played
//! - clear - Flush audio still queued for playback

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// A text frame that could not be understood.
#[derive(Debug, Error)]
pub enum TelephonyFrameError {
    #[error("Malformed telephony frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

// =============================================================================
// Inbound Events
// =============================================================================

/// Events received from the telephony edge.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyEvent {
    /// Socket connected; informational only
    Connected {
        #[serde(default)]
        protocol: Option<String>,
    },

    /// Stream started
    Start {
        /// Stream metadata
        start: StreamStart,
    },

    /// Inbound audio chunk
    Media {
        /// Audio payload
        media: MediaPayload,
    },

    /// Mark acknowledgement
    Mark {
        #[serde(default)]
        mark: Option<MarkPayload>,
    },

    /// Stream stopped
    Stop,

    /// Any event type this bridge does not act on
    #[serde(other)]
    Unknown,
}

impl TelephonyEvent {
    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, TelephonyFrameError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Payload of a `start` event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStart {
    /// Stream token assigned by the telephony edge
    pub stream_sid: String,
    /// Telephony call identifier
    #[serde(default)]
    pub call_sid: Option<String>,
}

/// Payload of a `media` event.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaPayload {
    /// Base64-encoded µ-law audio
    pub payload: String,
    /// Milliseconds since stream start; sent as a string by some edges
    #[serde(default, deserialize_with = "deserialize_millis")]
    pub timestamp: Option<u64>,
}

/// Mark name, shared by inbound and outbound `mark` frames.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MarkPayload {
    pub name: String,
}

fn deserialize_millis<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

// =============================================================================
// Outbound Frames
// =============================================================================

/// Frames sent to the telephony edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OutgoingFrame {
    /// Audio for the caller
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutgoingMedia,
    },

    /// Playback checkpoint
    Mark {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        mark: MarkPayload,
    },

    /// Drop any buffered playback
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

/// Audio body of an outbound `media` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMedia {
    pub payload: String,
}

impl OutgoingFrame {
    pub fn media(stream_sid: &str, payload: String) -> Self {
        Self::Media {
            stream_sid: stream_sid.to_string(),
            media: OutgoingMedia { payload },
        }
    }

    pub fn mark(stream_sid: &str, name: &str) -> Self {
        Self::Mark {
            stream_sid: stream_sid.to_string(),
            mark: MarkPayload {
                name: name.to_string(),
            },
        }
    }

    pub fn clear(stream_sid: &str) -> Self {
        Self::Clear {
            stream_sid: stream_sid.to_string(),
        }
    }
}
