//! Telephony media-stream protocol.

mod messages;

pub use messages::{
    MarkPayload, MediaPayload, OutgoingFrame, OutgoingMedia, StreamStart, TelephonyEvent,
    TelephonyFrameError,
};

/// Extract the call id from a media-stream request target.
///
/// The id is the final non-empty path segment, with any query string
/// stripped and percent-encoding removed. The bare `/media-stream` route
/// carries no id.
pub fn extract_call_id(target: &str) -> Option<String> {
    let path = target.split(['?', '#']).next().unwrap_or_default();
    let segment = path.rsplit('/').find(|s| !s.is_empty())?;
    if segment == "media-stream" {
        return None;
    }

    let decoded: String = url::form_urlencoded::parse(format!("id={segment}").as_bytes())
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default();
    let decoded = decoded.trim();
    if decoded.is_empty() {
        None
    } else {
        Some(decoded.to_string())
    }
}
