//! Per-call relay between the telephony stream and the realtime endpoint.
//!
//! A [`MediaRelay`] owns its [`Session`] exclusively. It connects upstream,
//! then selects over process shutdown, telephony input and upstream signals
//! until one of them ends the call, and finally tears the call down: link
//! closed, session ended, telephony socket closed, eviction scheduled and
//! transcript delivered.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::CloseFrame;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::core::realtime::{
    ClientEvent, RealtimeError, RealtimeResult, ServerEvent, UpstreamLink, UpstreamSignal,
};
use crate::core::session::{Session, TranscriptRole};
use crate::core::telephony::{MediaPayload, OutgoingFrame, TelephonyEvent};
use crate::state::AppState;

use super::messages::{DownstreamRoute, TelephonyInput, normal_close, server_error_close};

const CLOSE_SEND_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndReason {
    TelephonyStop,
    TelephonyClosed,
    UpstreamClosed,
    Shutdown,
}

enum Flow {
    Continue,
    End(EndReason),
}

enum Connect {
    Done(RealtimeResult<UpstreamLink>),
    HungUp(Option<String>),
    Shutdown,
}

/// Assistant playback the caller has not heard yet.
#[derive(Debug, Default)]
struct Playback {
    /// Latest telephony media timestamp (ms)
    latest_media_ts: u64,
    /// Media timestamp at which the current response started playing
    response_start_ts: Option<u64>,
    last_item_id: Option<String>,
    pending_marks: VecDeque<String>,
    marks_sent: u64,
}

impl Playback {
    fn next_mark(&mut self) -> String {
        self.marks_sent += 1;
        format!("response-{}", self.marks_sent)
    }

    fn reset_response(&mut self) {
        self.pending_marks.clear();
        self.response_start_ts = None;
        self.last_item_id = None;
    }
}

/// Bridges one call.
pub struct MediaRelay {
    session: Session,
    state: Arc<AppState>,
    downstream: mpsc::Sender<DownstreamRoute>,
    /// `session.updated` has been received
    configured: bool,
    greeted: bool,
    playback: Playback,
}

impl MediaRelay {
    pub fn new(
        session: Session,
        state: Arc<AppState>,
        downstream: mpsc::Sender<DownstreamRoute>,
    ) -> Self {
        Self {
            session,
            state,
            downstream,
            configured: false,
            greeted: false,
            playback: Playback::default(),
        }
    }

    /// Run the call to completion.
    pub async fn run(mut self, mut telephony: mpsc::Receiver<TelephonyInput>) {
        let shutdown = self.state.shutdown.clone();
        let instructions = self.state.prompts.instructions(self.session.metadata());
        let session_config = self.state.config.realtime.session_config(instructions);

        // Telephony events that arrive during the handshake. Media is dropped
        // since there is no open upstream to forward it to.
        let mut early = Vec::new();
        let connected = {
            let connect = self.state.connector.connect(session_config);
            tokio::pin!(connect);

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown.cancelled() => break Connect::Shutdown,

                    input = telephony.recv() => match input {
                        Some(TelephonyInput::Event(TelephonyEvent::Stop)) => {
                            break Connect::HungUp(Some("stop".to_string()));
                        }
                        Some(TelephonyInput::Event(TelephonyEvent::Media { media })) => {
                            if let Some(timestamp) = media.timestamp {
                                self.playback.latest_media_ts = timestamp;
                            }
                            debug!("Dropping media received before upstream connected");
                        }
                        Some(TelephonyInput::Event(event)) => early.push(event),
                        Some(TelephonyInput::Closed(reason)) => break Connect::HungUp(reason),
                        None => break Connect::HungUp(None),
                    },

                    result = &mut connect => break Connect::Done(result),
                }
            }
        };

        let mut link = match connected {
            Connect::Done(Ok(link)) => link,
            Connect::Done(Err(e)) => {
                error!(error = %e, "Failed to connect to realtime endpoint");
                self.finish(None, server_error_close()).await;
                return;
            }
            Connect::HungUp(reason) => {
                info!(reason = ?reason, "Caller hung up before upstream connected");
                self.finish(None, normal_close()).await;
                return;
            }
            Connect::Shutdown => {
                info!("Shutdown before upstream connected");
                self.finish(None, normal_close()).await;
                return;
            }
        };

        info!("Upstream realtime session opened");

        for event in early {
            self.on_telephony(event, &link).await;
        }

        let reason = loop {
            let flow = tokio::select! {
                biased;

                _ = shutdown.cancelled() => Flow::End(EndReason::Shutdown),

                input = telephony.recv() => match input {
                    Some(TelephonyInput::Event(event)) => self.on_telephony(event, &link).await,
                    Some(TelephonyInput::Closed(reason)) => {
                        info!(reason = ?reason, "Telephony connection closed");
                        Flow::End(EndReason::TelephonyClosed)
                    }
                    None => Flow::End(EndReason::TelephonyClosed),
                },

                signal = link.recv() => match signal {
                    Some(UpstreamSignal::Event(event)) => self.on_upstream(event, &link).await,
                    Some(UpstreamSignal::Malformed(raw)) => {
                        warn!(bytes = raw.len(), "Skipping malformed upstream event");
                        Flow::Continue
                    }
                    Some(UpstreamSignal::Closed(reason)) => {
                        info!(reason = ?reason, configured = self.configured, "Upstream connection closed");
                        Flow::End(EndReason::UpstreamClosed)
                    }
                    None => Flow::End(EndReason::UpstreamClosed),
                },
            };

            if let Flow::End(reason) = flow {
                break reason;
            }
        };

        debug!(reason = ?reason, "Relay loop finished");

        let close = if reason == EndReason::UpstreamClosed && !self.configured {
            server_error_close()
        } else {
            normal_close()
        };
        self.finish(Some(link), close).await;
    }

    async fn on_telephony(&mut self, event: TelephonyEvent, link: &UpstreamLink) -> Flow {
        match event {
            TelephonyEvent::Connected { protocol } => {
                debug!(protocol = ?protocol, "Telephony stream connected");
            }
            TelephonyEvent::Start { start } => {
                match self.session.start_streaming(start.stream_sid.clone()) {
                    Ok(()) => {
                        info!(
                            stream_sid = %start.stream_sid,
                            call_sid = ?start.call_sid,
                            "Media stream started"
                        );
                        self.playback = Playback::default();
                        self.send_greeting_if_ready(link).await;
                    }
                    Err(e) => warn!(error = %e, "Ignoring start event"),
                }
            }
            TelephonyEvent::Media { media } => self.forward_caller_audio(media, link).await,
            TelephonyEvent::Mark { mark } => {
                self.playback.pending_marks.pop_front();
                debug!(mark = ?mark.map(|m| m.name), "Playback mark acknowledged");
            }
            TelephonyEvent::Stop => {
                info!("Telephony stream stopped");
                return Flow::End(EndReason::TelephonyStop);
            }
            TelephonyEvent::Unknown => debug!("Skipping unknown telephony event"),
        }
        Flow::Continue
    }

    async fn forward_caller_audio(&mut self, media: MediaPayload, link: &UpstreamLink) {
        if let Some(timestamp) = media.timestamp {
            self.playback.latest_media_ts = timestamp;
        }

        if !self.session.is_streaming() {
            debug!("Dropping media received before stream start");
            return;
        }
        if !link.is_open() {
            debug!("Dropping media, upstream link closed");
            return;
        }

        let audio = match self.state.codec.telephony_to_upstream(&media.payload) {
            Ok(audio) => audio,
            Err(e) => {
                warn!(error = %e, "Skipping undecodable media payload");
                return;
            }
        };

        match link.try_send(ClientEvent::InputAudioBufferAppend { audio }) {
            Ok(()) => {}
            Err(RealtimeError::QueueFull) => {
                debug!("Dropping caller audio, upstream queue full");
            }
            Err(e) => warn!(error = %e, "Failed to forward caller audio"),
        }
    }

    async fn on_upstream(&mut self, event: ServerEvent, link: &UpstreamLink) -> Flow {
        match event {
            ServerEvent::Error { error } => {
                self.session.record_provider_error();
                error!(
                    error_type = %error.error_type,
                    code = ?error.code,
                    param = ?error.param,
                    event_id = ?error.event_id,
                    "Realtime API error: {}",
                    error.message
                );
            }
            ServerEvent::SessionCreated { session } => {
                info!(provider_session_id = %session.id, model = ?session.model, "Realtime session created");
                self.session.set_provider_session_id(&session.id);
            }
            ServerEvent::SessionUpdated { session } => {
                debug!(voice = ?session.voice, "Realtime session configured");
                self.configured = true;
                self.send_greeting_if_ready(link).await;
            }
            ServerEvent::SpeechStarted { audio_start_ms, .. } => {
                debug!(audio_start_ms, "Caller started speaking");
                self.interrupt_playback(link).await;
            }
            ServerEvent::SpeechStopped { audio_end_ms, .. } => {
                debug!(audio_end_ms, "Caller stopped speaking");
            }
            ServerEvent::TranscriptionCompleted { transcript, .. } => {
                debug!("Caller: {}", transcript);
                self.session
                    .append_transcript(TranscriptRole::Caller, &transcript);
            }
            ServerEvent::TranscriptionFailed { error, .. } => {
                debug!(message = %error.message, "Caller transcription failed");
            }
            ServerEvent::ResponseCreated { response } => {
                debug!(response_id = %response.id, "Response started");
            }
            ServerEvent::ResponseDone { response } => {
                info!(response_id = %response.id, status = ?response.status, "Response done");
            }
            ServerEvent::AudioDelta { item_id, delta, .. } => {
                self.forward_agent_audio(item_id, delta).await;
            }
            ServerEvent::AudioDone { item_id } => {
                debug!(item_id = ?item_id, "Response audio done");
            }
            ServerEvent::AudioTranscriptDelta { delta, .. } => {
                self.session.append_transcript(TranscriptRole::Agent, &delta);
            }
            ServerEvent::AudioTranscriptDone { transcript, .. } => {
                debug!("Agent: {}", transcript);
            }
            ServerEvent::RateLimitsUpdated { rate_limits } => {
                for limit in rate_limits {
                    debug!(name = %limit.name, remaining = limit.remaining, limit = limit.limit, "Rate limit");
                }
            }
            ServerEvent::Other => {}
        }
        Flow::Continue
    }

    async fn forward_agent_audio(&mut self, item_id: Option<String>, delta: String) {
        let Some(stream_sid) = self.session.stream_sid().map(str::to_owned) else {
            debug!("Dropping agent audio received before stream start");
            return;
        };
        if !self.session.is_streaming() {
            return;
        }

        let payload = match self.state.codec.upstream_to_telephony(&delta) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Skipping undecodable agent audio");
                return;
            }
        };

        if !self
            .send_downstream(OutgoingFrame::media(&stream_sid, payload))
            .await
        {
            return;
        }

        if self.playback.response_start_ts.is_none() {
            self.playback.response_start_ts = Some(self.playback.latest_media_ts);
        }
        if item_id.is_some() {
            self.playback.last_item_id = item_id;
        }

        let mark = self.playback.next_mark();
        if self
            .send_downstream(OutgoingFrame::mark(&stream_sid, &mark))
            .await
        {
            self.playback.pending_marks.push_back(mark);
        }
    }

    /// Stop assistant playback the caller is talking over.
    async fn interrupt_playback(&mut self, link: &UpstreamLink) {
        if self.playback.pending_marks.is_empty() {
            return;
        }
        let Some(response_start) = self.playback.response_start_ts else {
            return;
        };
        let audio_end_ms = self
            .playback
            .latest_media_ts
            .saturating_sub(response_start);

        if let Some(item_id) = self.playback.last_item_id.take() {
            info!(item_id = %item_id, audio_end_ms, "Caller interrupted, truncating response");
            let truncate = ClientEvent::ConversationItemTruncate {
                item_id,
                content_index: 0,
                audio_end_ms,
            };
            if let Err(e) = self.send_upstream(link, truncate).await {
                warn!(error = %e, "Failed to truncate response");
            }
        }

        if let Some(stream_sid) = self.session.stream_sid().map(str::to_owned) {
            self.send_downstream(OutgoingFrame::clear(&stream_sid)).await;
        }

        self.playback.reset_response();
    }

    /// Ask the assistant to speak first. Sent once, when both `session.updated`
    /// and the telephony `start` have been seen; a call that stops before
    /// `start` is never greeted since its audio could not be played.
    async fn send_greeting_if_ready(&mut self, link: &UpstreamLink) {
        if self.greeted || !self.configured || !self.session.is_streaming() {
            return;
        }
        self.greeted = true;

        let instructions = self
            .state
            .prompts
            .greeting_instructions(self.session.metadata());
        match self
            .send_upstream(link, ClientEvent::spoken_response(instructions))
            .await
        {
            Ok(()) => info!("Greeting requested"),
            Err(e) => warn!(error = %e, "Failed to request greeting"),
        }
    }

    /// Queue a control event upstream, giving up on process shutdown.
    async fn send_upstream(&self, link: &UpstreamLink, event: ClientEvent) -> RealtimeResult<()> {
        tokio::select! {
            biased;
            _ = self.state.shutdown.cancelled() => Err(RealtimeError::NotConnected),
            result = link.send(event) => result,
        }
    }

    async fn send_downstream(&self, frame: OutgoingFrame) -> bool {
        if self.session.is_ended() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.state.shutdown.cancelled() => false,
            result = self.downstream.send(DownstreamRoute::Frame(frame)) => result.is_ok(),
        }
    }

    async fn finish(mut self, link: Option<UpstreamLink>, close: CloseFrame) {
        if let Some(link) = &link {
            link.close();
        }
        self.session.end();

        info!(
            duration_secs = self.session.duration_secs().unwrap_or_default(),
            transcript_entries = self.session.transcript().len(),
            provider_errors = self.session.provider_errors(),
            "Call ended"
        );

        let close = self.downstream.send(DownstreamRoute::Close(close));
        if tokio::time::timeout(CLOSE_SEND_TIMEOUT, close).await.is_err() {
            warn!("Telephony writer stalled, close frame not queued");
        }

        self.state.registry.schedule_eviction(
            self.session.call_id().to_string(),
            self.session.instance_id(),
            self.state.retention(),
        );

        let summary = self.session.summary();
        self.state.transcripts.deliver(&summary).await;
    }
}
