//! Audio frame codec between the telephony edge and the realtime AI endpoint.
//!
//! The telephony side always carries base64-encoded G.711 µ-law at 8kHz.
//! The realtime side is configured for one of two formats:
//!
//! - `g711_ulaw`: same envelope as telephony, so frames pass through after
//!   the base64 payload has been validated.
//! - `pcm16`: PCM 16-bit signed little-endian at 24kHz. Inbound µ-law is
//!   decoded and upsampled 3x with linear interpolation; outbound PCM is
//!   averaged down 3:1 and µ-law encoded.
//!
//! Every function here is pure; the codec carries no per-call state.

use base64::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Telephony sample rate (G.711).
pub const TELEPHONY_SAMPLE_RATE: u32 = 8000;

/// PCM16 sample rate used by the realtime endpoint.
pub const PCM16_SAMPLE_RATE: u32 = 24000;

const RESAMPLE_FACTOR: usize = (PCM16_SAMPLE_RATE / TELEPHONY_SAMPLE_RATE) as usize;

const ULAW_BIAS: i32 = 0x84;
const ULAW_CLIP: i32 = 32635;

/// µ-law → linear lookup, built at compile time.
const ULAW_DECODE_TABLE: [i16; 256] = build_decode_table();

const fn build_decode_table() -> [i16; 256] {
    let mut table = [0i16; 256];
    let mut i = 0;
    while i < 256 {
        let mu = !(i as u8);
        let exponent = (mu >> 4) & 0x07;
        let mantissa = (mu & 0x0F) as i32;
        let magnitude = (((mantissa << 3) + ULAW_BIAS) << exponent) - ULAW_BIAS;
        table[i] = if mu & 0x80 != 0 {
            -magnitude as i16
        } else {
            magnitude as i16
        };
        i += 1;
    }
    table
}

/// Errors produced while translating an audio frame.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload was not valid base64
    #[error("Invalid base64 audio payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// PCM16 audio must contain whole samples
    #[error("PCM16 payload has odd byte length {0}")]
    OddPcmLength(usize),
}

/// Audio format spoken by the realtime endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AudioFormat {
    /// G.711 µ-law, 8kHz (telephony native)
    #[default]
    #[serde(rename = "g711_ulaw")]
    G711Ulaw,
    /// PCM 16-bit little-endian, 24kHz
    #[serde(rename = "pcm16")]
    Pcm16,
}

impl AudioFormat {
    /// Wire name used in the realtime session configuration.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::G711Ulaw => "g711_ulaw",
            Self::Pcm16 => "pcm16",
        }
    }

    /// Parse from string, returning `None` for unsupported formats.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "g711_ulaw" | "ulaw" | "mulaw" => Some(Self::G711Ulaw),
            "pcm16" | "pcm" => Some(Self::Pcm16),
            _ => None,
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stateless translator between the two audio envelopes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioCodec {
    upstream: AudioFormat,
}

impl AudioCodec {
    pub fn new(upstream: AudioFormat) -> Self {
        Self { upstream }
    }

    /// Translate a telephony `media.payload` into an `input_audio_buffer.append` payload.
    pub fn telephony_to_upstream(&self, payload: &str) -> Result<String, CodecError> {
        let ulaw = BASE64_STANDARD.decode(payload)?;
        match self.upstream {
            AudioFormat::G711Ulaw => Ok(payload.to_string()),
            AudioFormat::Pcm16 => {
                let pcm = upsample_8k_to_24k(&decode_ulaw(&ulaw));
                Ok(BASE64_STANDARD.encode(pcm_to_le_bytes(&pcm)))
            }
        }
    }

    /// Translate a `response.audio.delta` payload into a telephony `media.payload`.
    pub fn upstream_to_telephony(&self, delta: &str) -> Result<String, CodecError> {
        let bytes = BASE64_STANDARD.decode(delta)?;
        match self.upstream {
            AudioFormat::G711Ulaw => Ok(delta.to_string()),
            AudioFormat::Pcm16 => {
                if bytes.len() % 2 != 0 {
                    return Err(CodecError::OddPcmLength(bytes.len()));
                }
                let pcm = downsample_24k_to_8k(&le_bytes_to_pcm(&bytes));
                Ok(BASE64_STANDARD.encode(encode_ulaw(&pcm)))
            }
        }
    }
}

/// Decode one µ-law byte to a linear sample.
#[inline]
pub fn ulaw_to_linear(byte: u8) -> i16 {
    ULAW_DECODE_TABLE[byte as usize]
}

/// Encode one linear sample as µ-law.
pub fn linear_to_ulaw(sample: i16) -> u8 {
    let mut magnitude = sample as i32;
    let sign = if magnitude < 0 {
        magnitude = -magnitude;
        0x80
    } else {
        0x00
    };
    magnitude = magnitude.min(ULAW_CLIP) + ULAW_BIAS;

    let mut exponent = 7;
    for exp in 0..8 {
        if magnitude < (1 << (exp + 8)) {
            exponent = exp;
            break;
        }
    }
    let mantissa = (magnitude >> (exponent + 3)) & 0x0F;
    !(sign | (exponent << 4) | mantissa) as u8
}

pub fn decode_ulaw(ulaw: &[u8]) -> Vec<i16> {
    ulaw.iter().map(|&b| ulaw_to_linear(b)).collect()
}

pub fn encode_ulaw(pcm: &[i16]) -> Vec<u8> {
    pcm.iter().map(|&s| linear_to_ulaw(s)).collect()
}

/// 8kHz → 24kHz, inserting two linearly interpolated samples between neighbours.
/// The final input sample is repeated to fill its slot.
pub fn upsample_8k_to_24k(samples: &[i16]) -> Vec<i16> {
    let mut out = Vec::with_capacity(samples.len() * RESAMPLE_FACTOR);
    for pair in samples.windows(2) {
        let (a, b) = (pair[0] as f32, pair[1] as f32);
        out.push(pair[0]);
        out.push(((a * 2.0 + b) / 3.0).round() as i16);
        out.push(((a + b * 2.0) / 3.0).round() as i16);
    }
    if let Some(&last) = samples.last() {
        out.extend_from_slice(&[last; RESAMPLE_FACTOR]);
    }
    out
}

/// 24kHz → 8kHz by averaging each group of three samples. A trailing partial
/// group is discarded.
pub fn downsample_24k_to_8k(samples: &[i16]) -> Vec<i16> {
    samples
        .chunks_exact(RESAMPLE_FACTOR)
        .map(|group| {
            let sum: i32 = group.iter().map(|&s| s as i32).sum();
            (sum as f32 / RESAMPLE_FACTOR as f32).round() as i16
        })
        .collect()
}

fn pcm_to_le_bytes(pcm: &[i16]) -> Vec<u8> {
    pcm.iter().flat_map(|s| s.to_le_bytes()).collect()
}

fn le_bytes_to_pcm(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ulaw_silence_decodes_to_zero() {
        assert_eq!(ulaw_to_linear(0xFF), 0);
        assert_eq!(ulaw_to_linear(0x7F), 0);
        assert_eq!(linear_to_ulaw(0), 0xFF);
    }

    #[test]
    fn test_ulaw_extremes() {
        assert_eq!(ulaw_to_linear(0x00), -32124);
        assert_eq!(ulaw_to_linear(0x80), 32124);
        assert_eq!(linear_to_ulaw(i16::MAX), 0x80);
        assert_eq!(linear_to_ulaw(i16::MIN), 0x00);
    }

    #[test]
    fn test_ulaw_encode_is_stable_on_decoded_values() {
        for byte in 0..=255u8 {
            let linear = ulaw_to_linear(byte);
            assert_eq!(
                ulaw_to_linear(linear_to_ulaw(linear)),
                linear,
                "byte {byte:#04x} did not survive re-encoding"
            );
        }
    }

    #[test]
    fn test_upsample_interpolates() {
        let out = upsample_8k_to_24k(&[0, 300]);
        assert_eq!(out, vec![0, 100, 200, 300, 300, 300]);
    }

    #[test]
    fn test_upsample_empty() {
        assert!(upsample_8k_to_24k(&[]).is_empty());
    }

    #[test]
    fn test_downsample_averages_and_drops_partial_group() {
        let out = downsample_24k_to_8k(&[3, 6, 9, -3, -6, -9, 42]);
        assert_eq!(out, vec![6, -6]);
    }

    #[test]
    fn test_passthrough_keeps_payload() {
        let codec = AudioCodec::new(AudioFormat::G711Ulaw);
        assert_eq!(codec.telephony_to_upstream("QQ==").unwrap(), "QQ==");
        assert_eq!(codec.upstream_to_telephony("QQ==").unwrap(), "QQ==");
    }

    #[test]
    fn test_passthrough_rejects_invalid_base64() {
        let codec = AudioCodec::new(AudioFormat::G711Ulaw);
        assert!(matches!(
            codec.telephony_to_upstream("not base64!!"),
            Err(CodecError::InvalidBase64(_))
        ));
    }

    #[test]
    fn test_pcm16_inbound_triples_sample_count() {
        let codec = AudioCodec::new(AudioFormat::Pcm16);
        let ulaw = BASE64_STANDARD.encode([0xFFu8; 160]);
        let translated = codec.telephony_to_upstream(&ulaw).unwrap();
        let bytes = BASE64_STANDARD.decode(translated).unwrap();
        // 160 samples * 3 * 2 bytes
        assert_eq!(bytes.len(), 960);
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_pcm16_outbound_thirds_sample_count() {
        let codec = AudioCodec::new(AudioFormat::Pcm16);
        let pcm: Vec<u8> = [1000i16; 480].iter().flat_map(|s| s.to_le_bytes()).collect();
        let translated = codec
            .upstream_to_telephony(&BASE64_STANDARD.encode(pcm))
            .unwrap();
        let ulaw = BASE64_STANDARD.decode(translated).unwrap();
        assert_eq!(ulaw.len(), 160);
        assert!(ulaw.iter().all(|&b| b == linear_to_ulaw(1000)));
    }

    #[test]
    fn test_pcm16_outbound_rejects_partial_sample() {
        let codec = AudioCodec::new(AudioFormat::Pcm16);
        assert!(matches!(
            codec.upstream_to_telephony(&BASE64_STANDARD.encode([1u8, 2, 3])),
            Err(CodecError::OddPcmLength(3))
        ));
    }

    #[test]
    fn test_audio_format_parse() {
        assert_eq!(AudioFormat::parse("g711_ulaw"), Some(AudioFormat::G711Ulaw));
        assert_eq!(AudioFormat::parse("PCM16"), Some(AudioFormat::Pcm16));
        assert_eq!(AudioFormat::parse("g711_alaw"), None);
        assert_eq!(AudioFormat::Pcm16.to_string(), "pcm16");
    }
}
