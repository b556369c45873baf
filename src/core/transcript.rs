//! End-of-call transcript delivery.
//!
//! When a session ends its relay hands a [`CallSummary`] to the configured
//! [`TranscriptSink`]. Sinks never fail the call: delivery problems are
//! logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::session::{CallMetadata, CallStatus, TranscriptEntry};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Final state of a call, with its full transcript.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSummary {
    pub call_id: String,
    pub status: CallStatus,
    pub start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    pub metadata: CallMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_sid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_session_id: Option<String>,
    pub provider_errors: u32,
    pub transcript: Vec<TranscriptEntry>,
}

/// Receives the summary of every ended call.
#[async_trait]
pub trait TranscriptSink: Send + Sync {
    async fn deliver(&self, summary: &CallSummary);
}

/// Writes transcripts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTranscriptSink;

#[async_trait]
impl TranscriptSink for LogTranscriptSink {
    async fn deliver(&self, summary: &CallSummary) {
        info!(
            call_id = %summary.call_id,
            duration_secs = summary.duration_secs.unwrap_or_default(),
            entries = summary.transcript.len(),
            provider_errors = summary.provider_errors,
            "Call ended"
        );
        for entry in &summary.transcript {
            info!(call_id = %summary.call_id, role = %entry.role, "{}", entry.text);
        }
    }
}

/// POSTs the summary as JSON to a fixed URL.
#[derive(Debug, Clone)]
pub struct WebhookTranscriptSink {
    url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl WebhookTranscriptSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: WEBHOOK_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TranscriptSink for WebhookTranscriptSink {
    async fn deliver(&self, summary: &CallSummary) {
        debug!(call_id = %summary.call_id, url = %self.url, "Transcript webhook send");

        let result = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(summary)
            .send()
            .await;

        match result {
            Ok(response) if !response.status().is_success() => {
                warn!(
                    call_id = %summary.call_id,
                    url = %self.url,
                    status = %response.status(),
                    "Transcript webhook returned non-success status"
                );
            }
            Ok(_) => {}
            Err(e) => {
                warn!(
                    call_id = %summary.call_id,
                    url = %self.url,
                    error = %e,
                    "Transcript webhook request failed"
                );
            }
        }
    }
}

/// Delivers to several sinks in order.
#[derive(Clone, Default)]
pub struct FanoutTranscriptSink {
    sinks: Vec<Arc<dyn TranscriptSink>>,
}

impl FanoutTranscriptSink {
    pub fn new(sinks: Vec<Arc<dyn TranscriptSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl TranscriptSink for FanoutTranscriptSink {
    async fn deliver(&self, summary: &CallSummary) {
        for sink in &self.sinks {
            sink.deliver(summary).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::{Session, TranscriptRole};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink(AtomicUsize);

    #[async_trait]
    impl TranscriptSink for CountingSink {
        async fn deliver(&self, _summary: &CallSummary) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn ended_summary() -> CallSummary {
        let mut session = Session::new("abc", CallMetadata::default());
        session.start_streaming("S1").unwrap();
        session.append_transcript(TranscriptRole::Agent, "Hey there!");
        session.append_transcript(TranscriptRole::Caller, "Hi");
        session.end();
        session.summary()
    }

    #[test]
    fn test_summary_serialization() {
        let json = serde_json::to_value(ended_summary()).unwrap();
        assert_eq!(json["callId"], "abc");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["streamSid"], "S1");
        assert_eq!(json["metadata"]["contactName"], "there");
        assert_eq!(json["transcript"][0]["role"], "agent");
        assert_eq!(json["transcript"][1]["text"], "Hi");
        assert!(json["transcript"][0]["at"].is_string());
    }

    #[tokio::test]
    async fn test_fanout_delivers_to_every_sink() {
        let counter = Arc::new(CountingSink(AtomicUsize::new(0)));
        let fanout = FanoutTranscriptSink::new(vec![
            counter.clone() as Arc<dyn TranscriptSink>,
            Arc::new(LogTranscriptSink),
            counter.clone() as Arc<dyn TranscriptSink>,
        ]);

        fanout.deliver(&ended_summary()).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_webhook_failure_is_swallowed() {
        let sink = WebhookTranscriptSink::new("http://127.0.0.1:1/hook")
            .with_timeout(Duration::from_millis(200));
        sink.deliver(&ended_summary()).await;
        assert_eq!(sink.url(), "http://127.0.0.1:1/hook");
    }
}
