//! OpenAI Realtime session settings.
//!
//! Covers voice selection, turn detection, transcription and the audio
//! format negotiated with the endpoint. [`RealtimeSettings`] turns these into
//! the `session.update` payload sent when a call connects.

use serde::{Deserialize, Serialize};

use super::messages::{InputAudioTranscription, SessionConfig, TurnDetection};
use crate::core::codec::AudioFormat;

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Model requested when none is configured.
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview-2024-12-17";

/// Transcription model used for caller speech.
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

// =============================================================================
// Voices
// =============================================================================

/// Available voices for the realtime endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAIRealtimeVoice {
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Sage,
    /// Bridge default
    #[default]
    Shimmer,
    Verse,
}

impl OpenAIRealtimeVoice {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Ballad => "ballad",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }

    /// Parse from string, returning `None` for unknown voices.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "alloy" => Some(Self::Alloy),
            "ash" => Some(Self::Ash),
            "ballad" => Some(Self::Ballad),
            "coral" => Some(Self::Coral),
            "echo" => Some(Self::Echo),
            "sage" => Some(Self::Sage),
            "shimmer" => Some(Self::Shimmer),
            "verse" => Some(Self::Verse),
            _ => None,
        }
    }
}

impl std::fmt::Display for OpenAIRealtimeVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Turn Detection
// =============================================================================

/// Server-side VAD tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VadSettings {
    /// Activation threshold (0.0 to 1.0)
    pub threshold: f32,
    /// Audio kept before detected speech (ms)
    pub prefix_padding_ms: u32,
    /// Silence that ends a turn (ms)
    pub silence_duration_ms: u32,
}

impl Default for VadSettings {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
        }
    }
}

// =============================================================================
// Session Settings
// =============================================================================

/// Everything needed to open and configure one realtime session.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeSettings {
    /// Base WebSocket URL, without the model query parameter
    pub url: String,
    pub model: String,
    pub voice: OpenAIRealtimeVoice,
    /// Format of audio in both directions
    pub audio_format: AudioFormat,
    pub transcription_model: String,
    pub vad: VadSettings,
    pub temperature: Option<f32>,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            url: OPENAI_REALTIME_URL.to_string(),
            model: DEFAULT_REALTIME_MODEL.to_string(),
            voice: OpenAIRealtimeVoice::default(),
            audio_format: AudioFormat::default(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            vad: VadSettings::default(),
            temperature: None,
        }
    }
}

impl RealtimeSettings {
    /// WebSocket URL including the model parameter.
    pub fn ws_url(&self) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}model={}", self.url, separator, self.model)
    }

    /// Build the `session.update` payload for a call.
    pub fn session_config(&self, instructions: String) -> SessionConfig {
        let format = self.audio_format.as_str().to_string();
        SessionConfig {
            modalities: Some(vec!["text".to_string(), "audio".to_string()]),
            instructions: Some(instructions),
            voice: Some(self.voice.as_str().to_string()),
            input_audio_format: Some(format.clone()),
            output_audio_format: Some(format),
            input_audio_transcription: Some(InputAudioTranscription {
                model: self.transcription_model.clone(),
            }),
            turn_detection: Some(TurnDetection::ServerVad {
                threshold: Some(self.vad.threshold),
                prefix_padding_ms: Some(self.vad.prefix_padding_ms),
                silence_duration_ms: Some(self.vad.silence_duration_ms),
            }),
            temperature: self.temperature,
        }
    }
}
