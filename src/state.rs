use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::config::ServerConfig;
use crate::core::codec::AudioCodec;
use crate::core::prompt::{PersonaPromptBuilder, PromptBuilder};
use crate::core::realtime::{
    OpenAIRealtimeConnector, RealtimeError, RealtimeResult, UpstreamConnector,
};
use crate::core::session::SessionRegistry;
use crate::core::transcript::{
    FanoutTranscriptSink, LogTranscriptSink, TranscriptSink, WebhookTranscriptSink,
};

/// Application state shared by every handler.
pub struct AppState {
    pub config: ServerConfig,
    /// Calls that are live or still inside their retention window
    pub registry: SessionRegistry,
    /// Opens one upstream realtime session per call
    pub connector: Arc<dyn UpstreamConnector>,
    pub prompts: Arc<dyn PromptBuilder>,
    pub transcripts: Arc<dyn TranscriptSink>,
    pub codec: AudioCodec,
    /// Root token; cancelling it ends every relay and pending eviction
    pub shutdown: CancellationToken,
    /// Tracks relay and eviction tasks so shutdown can wait for them
    pub tasks: TaskTracker,
}

impl AppState {
    /// Build the production state: OpenAI connector, persona prompts, and
    /// transcripts to the log plus the webhook when one is configured.
    pub fn new(config: ServerConfig) -> RealtimeResult<Arc<Self>> {
        let api_key = config.api_key().ok_or_else(|| {
            RealtimeError::AuthenticationFailed("OPENAI_API_KEY is not configured".to_string())
        })?;
        let connector = OpenAIRealtimeConnector::new(api_key, config.realtime.clone())?;

        let prompts = PersonaPromptBuilder::new(config.agent_name.clone());

        let mut sinks: Vec<Arc<dyn TranscriptSink>> = vec![Arc::new(LogTranscriptSink)];
        if let Some(url) = &config.transcript_webhook_url {
            info!(url = %url, "Transcript webhook enabled");
            sinks.push(Arc::new(WebhookTranscriptSink::new(url.clone())));
        }

        Ok(Self::with_components(
            config,
            Arc::new(connector),
            Arc::new(prompts),
            Arc::new(FanoutTranscriptSink::new(sinks)),
        ))
    }

    /// Build state around caller-supplied collaborators.
    pub fn with_components(
        config: ServerConfig,
        connector: Arc<dyn UpstreamConnector>,
        prompts: Arc<dyn PromptBuilder>,
        transcripts: Arc<dyn TranscriptSink>,
    ) -> Arc<Self> {
        let shutdown = CancellationToken::new();
        let tasks = TaskTracker::new();
        let registry = SessionRegistry::new(shutdown.clone(), tasks.clone());
        let codec = AudioCodec::new(config.realtime.audio_format);

        Arc::new(Self {
            config,
            registry,
            connector,
            prompts,
            transcripts,
            codec,
            shutdown,
            tasks,
        })
    }

    pub fn retention(&self) -> Duration {
        self.config.retention()
    }

    /// Cancel all work and wait up to `grace` for tracked tasks to finish.
    /// Returns false if the wait timed out.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.shutdown.cancel();
        self.tasks.close();
        tokio::time::timeout(grace, self.tasks.wait()).await.is_ok()
    }
}
