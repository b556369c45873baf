use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::{ConfigError, ServerConfig, TlsConfig};
use crate::core::codec::AudioFormat;
use crate::core::realtime::OpenAIRealtimeVoice;

/// Non-empty value of an environment variable.
fn var(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parsed<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match var(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { name, value }),
        None => Ok(None),
    }
}

/// Build a configuration from defaults overlaid with environment variables.
pub(super) fn load() -> Result<ServerConfig, ConfigError> {
    let mut config = ServerConfig::default();

    if let Some(host) = var("HOST") {
        config.host = host;
    }
    if let Some(port) = parsed("PORT")? {
        config.port = port;
    }

    config.tls = match (var("TLS_CERT_PATH"), var("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        }),
        (None, None) => None,
        _ => {
            return Err(ConfigError::Invalid(
                "TLS_CERT_PATH and TLS_KEY_PATH must be set together".to_string(),
            ));
        }
    };

    config.openai_api_key = var("OPENAI_API_KEY");

    let realtime = &mut config.realtime;
    if let Some(url) = var("OPENAI_REALTIME_URL") {
        realtime.url = url;
    }
    if let Some(model) = var("OPENAI_REALTIME_MODEL") {
        realtime.model = model;
    }
    if let Some(value) = var("BRIDGE_VOICE") {
        realtime.voice = OpenAIRealtimeVoice::parse(&value).ok_or(ConfigError::Env {
            name: "BRIDGE_VOICE",
            value,
        })?;
    }
    if let Some(value) = var("BRIDGE_AUDIO_FORMAT") {
        realtime.audio_format = AudioFormat::parse(&value).ok_or(ConfigError::Env {
            name: "BRIDGE_AUDIO_FORMAT",
            value,
        })?;
    }
    realtime.temperature = parsed("BRIDGE_TEMPERATURE")?;
    if let Some(model) = var("BRIDGE_TRANSCRIPTION_MODEL") {
        realtime.transcription_model = model;
    }
    if let Some(threshold) = parsed("VAD_THRESHOLD")? {
        realtime.vad.threshold = threshold;
    }
    if let Some(ms) = parsed("VAD_PREFIX_PADDING_MS")? {
        realtime.vad.prefix_padding_ms = ms;
    }
    if let Some(ms) = parsed("VAD_SILENCE_DURATION_MS")? {
        realtime.vad.silence_duration_ms = ms;
    }

    if let Some(secs) = parsed("SESSION_RETENTION_SECS")? {
        config.retention_secs = secs;
    }
    if let Some(name) = var("AGENT_NAME") {
        config.agent_name = name;
    }
    config.transcript_webhook_url = var("TRANSCRIPT_WEBHOOK_URL");
    config.cors_allowed_origins = var("CORS_ALLOWED_ORIGINS");

    Ok(config)
}
