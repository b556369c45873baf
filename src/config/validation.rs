use url::Url;

use super::{ConfigError, ServerConfig};

const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.6..=1.2;

/// Reject configurations the bridge cannot run with.
pub(super) fn validate(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.port == 0 {
        return Err(ConfigError::Invalid("port must be non-zero".to_string()));
    }

    if let Some(temperature) = config.realtime.temperature
        && !TEMPERATURE_RANGE.contains(&temperature)
    {
        return Err(ConfigError::Invalid(format!(
            "temperature {temperature} is outside 0.6..=1.2"
        )));
    }

    let threshold = config.realtime.vad.threshold;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(ConfigError::Invalid(format!(
            "VAD threshold {threshold} is outside 0.0..=1.0"
        )));
    }

    if let Some(url) = &config.transcript_webhook_url {
        validate_webhook_url(url)?;
    }

    Ok(())
}

fn validate_webhook_url(raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw).map_err(|e| {
        ConfigError::Invalid(format!("transcript webhook URL {raw:?} is invalid: {e}"))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid(format!(
            "transcript webhook URL must be http(s), got scheme {}",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::Invalid(format!(
            "transcript webhook URL {raw:?} has no host"
        )));
    }

    Ok(())
}
