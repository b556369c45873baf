//! Per-call session state.
//!
//! A [`Session`] is owned by exactly one relay task. Every mutation publishes
//! a fresh [`CallSnapshot`] on a `watch` channel; the registry and the HTTP
//! control surface only ever see those snapshots.
//!
//! Status moves forward only:
//!
//! ```text
//! Connecting ──start──▶ Streaming ──▶ Ended
//!      └───────────────────────────────▲
//! ```

mod registry;

pub use registry::{RegistryError, SessionRegistry};

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::watch;
use uuid::Uuid;

use crate::core::transcript::CallSummary;

pub const DEFAULT_CONTACT_NAME: &str = "there";
pub const DEFAULT_PURPOSE: &str = "to connect";
pub const DEFAULT_OWNER_NAME: &str = "the team";
pub const DEFAULT_OWNER_COMPANY: &str = "";

/// Errors raised by invalid session mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: CallStatus, to: CallStatus },

    #[error("Stream token already set")]
    StreamTokenAlreadySet,
}

/// Lifecycle of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallStatus {
    #[serde(rename = "connecting")]
    Connecting,
    #[serde(rename = "streaming")]
    Streaming,
    #[serde(rename = "completed")]
    Ended,
}

impl CallStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Ended => "completed",
        }
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Caller context supplied on the media-stream URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallMetadata {
    pub contact_name: String,
    pub purpose: String,
    pub owner_name: String,
    pub owner_company: String,
}

impl Default for CallMetadata {
    fn default() -> Self {
        Self {
            contact_name: DEFAULT_CONTACT_NAME.to_string(),
            purpose: DEFAULT_PURPOSE.to_string(),
            owner_name: DEFAULT_OWNER_NAME.to_string(),
            owner_company: DEFAULT_OWNER_COMPANY.to_string(),
        }
    }
}

impl CallMetadata {
    /// Decode from a raw query string. Missing or blank values keep their
    /// defaults; unknown parameters are ignored.
    pub fn from_query(query: Option<&str>) -> Self {
        let mut metadata = Self::default();
        let Some(query) = query else {
            return metadata;
        };

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let slot = match &*key {
                "contactName" => &mut metadata.contact_name,
                "purpose" => &mut metadata.purpose,
                "ownerName" => &mut metadata.owner_name,
                "ownerCompany" => &mut metadata.owner_company,
                _ => continue,
            };
            *slot = value.to_string();
        }
        metadata
    }

    /// First word of the contact name, as used in a spoken greeting.
    pub fn first_name(&self) -> &str {
        self.contact_name
            .split_whitespace()
            .next()
            .unwrap_or(DEFAULT_CONTACT_NAME)
    }
}

/// Speaker of a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    Caller,
    Agent,
}

impl std::fmt::Display for TranscriptRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Caller => write!(f, "caller"),
            Self::Agent => write!(f, "agent"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    pub role: TranscriptRole,
    pub text: String,
    #[serde(serialize_with = "time::serde::rfc3339::serialize")]
    pub at: OffsetDateTime,
}

/// Read-only view of a session, as served by the control surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSnapshot {
    pub id: String,
    pub status: CallStatus,
    pub start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    pub contact_name: String,
    pub purpose: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_sid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_session_id: Option<String>,
    pub transcript_length: usize,
    pub provider_errors: u32,
}

impl CallSnapshot {
    pub fn is_active(&self) -> bool {
        self.status != CallStatus::Ended
    }
}

/// Format a timestamp as RFC 3339.
pub fn rfc3339(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_default()
}

/// State of one call, mutated only by its relay.
#[derive(Debug)]
pub struct Session {
    instance_id: Uuid,
    call_id: String,
    status: CallStatus,
    started_at: OffsetDateTime,
    ended_at: Option<OffsetDateTime>,
    metadata: CallMetadata,
    stream_sid: Option<String>,
    provider_session_id: Option<String>,
    transcript: Vec<TranscriptEntry>,
    provider_errors: u32,
    snapshot_tx: watch::Sender<CallSnapshot>,
}

impl Session {
    pub fn new(call_id: impl Into<String>, metadata: CallMetadata) -> Self {
        let call_id = call_id.into();
        let started_at = OffsetDateTime::now_utc();
        let initial = CallSnapshot {
            id: call_id.clone(),
            status: CallStatus::Connecting,
            start_time: rfc3339(started_at),
            end_time: None,
            duration_secs: None,
            contact_name: metadata.contact_name.clone(),
            purpose: metadata.purpose.clone(),
            stream_sid: None,
            provider_session_id: None,
            transcript_length: 0,
            provider_errors: 0,
        };
        let (snapshot_tx, _) = watch::channel(initial);

        Self {
            instance_id: Uuid::new_v4(),
            call_id,
            status: CallStatus::Connecting,
            started_at,
            ended_at: None,
            metadata,
            stream_sid: None,
            provider_session_id: None,
            transcript: Vec::new(),
            provider_errors: 0,
            snapshot_tx,
        }
    }

    /// Distinguishes two sessions that reused the same call id.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn status(&self) -> CallStatus {
        self.status
    }

    pub fn metadata(&self) -> &CallMetadata {
        &self.metadata
    }

    pub fn stream_sid(&self) -> Option<&str> {
        self.stream_sid.as_deref()
    }

    pub fn provider_session_id(&self) -> Option<&str> {
        self.provider_session_id.as_deref()
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn provider_errors(&self) -> u32 {
        self.provider_errors
    }

    pub fn is_streaming(&self) -> bool {
        self.status == CallStatus::Streaming
    }

    pub fn is_ended(&self) -> bool {
        self.status == CallStatus::Ended
    }

    /// Whole seconds between start and end; `None` until ended.
    pub fn duration_secs(&self) -> Option<u64> {
        self.ended_at
            .map(|end| (end - self.started_at).whole_seconds().max(0) as u64)
    }

    /// Receiver that always holds the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<CallSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Record the telephony stream token and begin streaming.
    pub fn start_streaming(&mut self, stream_sid: impl Into<String>) -> Result<(), SessionError> {
        if self.stream_sid.is_some() {
            return Err(SessionError::StreamTokenAlreadySet);
        }
        if self.status != CallStatus::Connecting {
            return Err(SessionError::InvalidTransition {
                from: self.status,
                to: CallStatus::Streaming,
            });
        }
        self.stream_sid = Some(stream_sid.into());
        self.status = CallStatus::Streaming;
        self.publish();
        Ok(())
    }

    /// Move to `Ended`. Returns `false` if the session had already ended.
    pub fn end(&mut self) -> bool {
        if self.is_ended() {
            return false;
        }
        self.status = CallStatus::Ended;
        self.ended_at = Some(OffsetDateTime::now_utc());
        self.publish();
        true
    }

    /// Append a transcript line. Ignored unless streaming or when empty.
    pub fn append_transcript(&mut self, role: TranscriptRole, text: &str) -> bool {
        if !self.is_streaming() || text.is_empty() {
            return false;
        }
        self.transcript.push(TranscriptEntry {
            role,
            text: text.to_string(),
            at: OffsetDateTime::now_utc(),
        });
        self.publish();
        true
    }

    /// Record the endpoint's own session id; only the first one is kept.
    pub fn set_provider_session_id(&mut self, id: &str) -> bool {
        if self.provider_session_id.is_some() || id.is_empty() {
            return false;
        }
        self.provider_session_id = Some(id.to_string());
        self.publish();
        true
    }

    pub fn record_provider_error(&mut self) {
        self.provider_errors = self.provider_errors.saturating_add(1);
        self.publish();
    }

    pub fn snapshot(&self) -> CallSnapshot {
        CallSnapshot {
            id: self.call_id.clone(),
            status: self.status,
            start_time: rfc3339(self.started_at),
            end_time: self.ended_at.map(rfc3339),
            duration_secs: self.duration_secs(),
            contact_name: self.metadata.contact_name.clone(),
            purpose: self.metadata.purpose.clone(),
            stream_sid: self.stream_sid.clone(),
            provider_session_id: self.provider_session_id.clone(),
            transcript_length: self.transcript.len(),
            provider_errors: self.provider_errors,
        }
    }

    /// End-of-call payload for transcript sinks.
    pub fn summary(&self) -> CallSummary {
        CallSummary {
            call_id: self.call_id.clone(),
            status: self.status,
            start_time: rfc3339(self.started_at),
            end_time: self.ended_at.map(rfc3339),
            duration_secs: self.duration_secs(),
            metadata: self.metadata.clone(),
            stream_sid: self.stream_sid.clone(),
            provider_session_id: self.provider_session_id.clone(),
            provider_errors: self.provider_errors,
            transcript: self.transcript.clone(),
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }
}
