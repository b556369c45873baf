use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::{ConfigError, ServerConfig, TlsConfig};
use crate::core::codec::AudioFormat;
use crate::core::realtime::OpenAIRealtimeVoice;

/// Complete YAML configuration structure
///
/// All fields are optional so a file can override just the values it names.
/// Anything left out keeps the value derived from the environment.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3000
///   tls:
///     cert_path: "/etc/bridge/cert.pem"
///     key_path: "/etc/bridge/key.pem"
///
/// openai:
///   api_key: "sk-..."
///   realtime_url: "wss://api.openai.com/v1/realtime"
///   model: "gpt-4o-realtime-preview-2024-12-17"
///
/// bridge:
///   voice: "shimmer"
///   audio_format: "g711_ulaw"
///   temperature: 0.8
///   transcription_model: "whisper-1"
///   agent_name: "ARIA"
///   retention_secs: 60
///   transcript_webhook_url: "https://hooks.example.com/calls"
///
/// vad:
///   threshold: 0.5
///   prefix_padding_ms: 300
///   silence_duration_ms: 500
///
/// security:
///   cors_allowed_origins: "https://dashboard.example.com"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub openai: Option<OpenAIYaml>,
    pub bridge: Option<BridgeYaml>,
    pub vad: Option<VadYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Realtime endpoint settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OpenAIYaml {
    pub api_key: Option<String>,
    pub realtime_url: Option<String>,
    pub model: Option<String>,
}

/// Per-call behaviour of the bridge
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BridgeYaml {
    pub voice: Option<String>,
    pub audio_format: Option<String>,
    pub temperature: Option<f32>,
    pub transcription_model: Option<String>,
    pub agent_name: Option<String>,
    pub retention_secs: Option<u64>,
    pub transcript_webhook_url: Option<String>,
}

/// Server-side voice activity detection from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct VadYaml {
    pub threshold: Option<f32>,
    pub prefix_padding_ms: Option<u32>,
    pub silence_duration_ms: Option<u32>,
}

/// Security settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// Comma-separated origins, or "*"
    pub cors_allowed_origins: Option<String>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;

        let config: YamlConfig = serde_yaml::from_str(&contents)?;

        Ok(config)
    }

    /// Override `config` with every value this file sets.
    pub fn apply(self, config: &mut ServerConfig) -> Result<(), ConfigError> {
        if let Some(server) = self.server {
            if let Some(host) = server.host {
                config.host = host;
            }
            if let Some(port) = server.port {
                config.port = port;
            }
            if let Some(tls) = server.tls {
                if tls.enabled == Some(false) {
                    config.tls = None;
                } else if let (Some(cert), Some(key)) = (tls.cert_path, tls.key_path) {
                    config.tls = Some(TlsConfig {
                        cert_path: PathBuf::from(cert),
                        key_path: PathBuf::from(key),
                    });
                } else if tls.enabled == Some(true) {
                    return Err(ConfigError::Invalid(
                        "server.tls requires both cert_path and key_path".to_string(),
                    ));
                }
            }
        }

        if let Some(openai) = self.openai {
            if let Some(key) = openai.api_key {
                config.openai_api_key = Some(key);
            }
            if let Some(url) = openai.realtime_url {
                config.realtime.url = url;
            }
            if let Some(model) = openai.model {
                config.realtime.model = model;
            }
        }

        if let Some(bridge) = self.bridge {
            if let Some(voice) = bridge.voice {
                config.realtime.voice = OpenAIRealtimeVoice::parse(&voice)
                    .ok_or_else(|| ConfigError::Invalid(format!("Unknown voice: {voice}")))?;
            }
            if let Some(format) = bridge.audio_format {
                config.realtime.audio_format = AudioFormat::parse(&format).ok_or_else(|| {
                    ConfigError::Invalid(format!("Unknown audio format: {format}"))
                })?;
            }
            if let Some(temperature) = bridge.temperature {
                config.realtime.temperature = Some(temperature);
            }
            if let Some(model) = bridge.transcription_model {
                config.realtime.transcription_model = model;
            }
            if let Some(name) = bridge.agent_name {
                config.agent_name = name;
            }
            if let Some(secs) = bridge.retention_secs {
                config.retention_secs = secs;
            }
            if let Some(url) = bridge.transcript_webhook_url {
                config.transcript_webhook_url = Some(url);
            }
        }

        if let Some(vad) = self.vad {
            if let Some(threshold) = vad.threshold {
                config.realtime.vad.threshold = threshold;
            }
            if let Some(ms) = vad.prefix_padding_ms {
                config.realtime.vad.prefix_padding_ms = ms;
            }
            if let Some(ms) = vad.silence_duration_ms {
                config.realtime.vad.silence_duration_ms = ms;
            }
        }

        if let Some(security) = self.security
            && let Some(origins) = security.cors_allowed_origins
        {
            config.cors_allowed_origins = Some(origins);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 8080
  tls:
    cert_path: "/tmp/cert.pem"
    key_path: "/tmp/key.pem"
openai:
  api_key: "sk-yaml"
  model: "gpt-4o-realtime-preview"
bridge:
  voice: "alloy"
  audio_format: "pcm16"
  temperature: 0.7
  agent_name: "Max"
  retention_secs: 30
  transcript_webhook_url: "https://hooks.example.com/calls"
vad:
  threshold: 0.6
  silence_duration_ms: 700
security:
  cors_allowed_origins: "*"
"#;
        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let server = config.server.as_ref().unwrap();
        assert_eq!(server.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(server.port, Some(8080));

        let bridge = config.bridge.as_ref().unwrap();
        assert_eq!(bridge.voice.as_deref(), Some("alloy"));
        assert_eq!(bridge.retention_secs, Some(30));

        let vad = config.vad.as_ref().unwrap();
        assert_eq!(vad.threshold, Some(0.6));
        assert!(vad.prefix_padding_ms.is_none());
    }

    #[test]
    fn test_apply_overrides_only_named_values() {
        let yaml = r#"
server:
  port: 9000
bridge:
  voice: "alloy"
  audio_format: "pcm16"
vad:
  prefix_padding_ms: 200
"#;
        let overrides: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        let mut config = ServerConfig::default();
        overrides.apply(&mut config).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.realtime.voice, OpenAIRealtimeVoice::Alloy);
        assert_eq!(config.realtime.audio_format, AudioFormat::Pcm16);
        assert_eq!(config.realtime.vad.prefix_padding_ms, 200);
        assert_eq!(config.realtime.vad.silence_duration_ms, 500);
    }

    #[test]
    fn test_apply_rejects_unknown_voice() {
        let overrides: YamlConfig = serde_yaml::from_str("bridge:\n  voice: \"robot\"\n").unwrap();
        let mut config = ServerConfig::default();
        let err = overrides.apply(&mut config).unwrap_err();
        assert!(err.to_string().contains("Unknown voice"));
    }

    #[test]
    fn test_apply_tls_requires_both_paths() {
        let yaml = "server:\n  tls:\n    enabled: true\n    cert_path: \"/tmp/cert.pem\"\n";
        let overrides: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        let mut config = ServerConfig::default();
        assert!(overrides.apply(&mut config).is_err());
    }

    #[test]
    fn test_yaml_config_empty() {
        let config: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.server.is_none());
        assert!(config.openai.is_none());
        assert!(config.bridge.is_none());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "server:\n  host: \"localhost\"\n  port: 3000\n").unwrap();

        let config = YamlConfig::from_file(&config_path).unwrap();
        assert_eq!(
            config.server.as_ref().unwrap().host,
            Some("localhost".to_string())
        );
        assert_eq!(config.server.as_ref().unwrap().port, Some(3000));
    }

    #[test]
    fn test_from_file_not_found() {
        let result = YamlConfig::from_file(Path::new("/nonexistent/config.yaml"));
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.yaml");
        fs::write(&config_path, "invalid: yaml: content:").unwrap();

        let result = YamlConfig::from_file(&config_path);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse YAML")
        );
    }
}
