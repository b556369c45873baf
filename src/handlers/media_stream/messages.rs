//! Channel messages between the media-stream socket tasks and the relay.

use axum::extract::ws::{CloseFrame, Utf8Bytes, close_code};

use crate::core::telephony::{OutgoingFrame, TelephonyEvent};

/// Input from the telephony socket reader.
#[derive(Debug)]
pub enum TelephonyInput {
    /// A well-formed telephony event
    Event(TelephonyEvent),
    /// The socket closed or failed; carries the close reason if known
    Closed(Option<String>),
}

/// Work for the telephony socket writer.
#[derive(Debug)]
pub enum DownstreamRoute {
    /// JSON frame for the telephony edge
    Frame(OutgoingFrame),
    /// Close the connection and stop writing
    Close(CloseFrame),
}

/// 1000: the call ended normally.
pub fn normal_close() -> CloseFrame {
    CloseFrame {
        code: close_code::NORMAL,
        reason: Utf8Bytes::from_static("call ended"),
    }
}

/// 1008: the request could not be served.
pub fn policy_close(reason: &'static str) -> CloseFrame {
    CloseFrame {
        code: close_code::POLICY,
        reason: Utf8Bytes::from_static(reason),
    }
}

/// 1011: the upstream session could not be established.
pub fn server_error_close() -> CloseFrame {
    CloseFrame {
        code: close_code::ERROR,
        reason: Utf8Bytes::from_static("upstream unavailable"),
    }
}
