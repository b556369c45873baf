//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use call_bridge::{
    AppState, PersonaPromptBuilder, RealtimeError, RealtimeResult, ServerConfig, UpstreamConnector,
    UpstreamLink,
    core::realtime::{SessionConfig, UpstreamEndpoint},
    core::transcript::{CallSummary, TranscriptSink},
};

/// Connector that hands each upstream endpoint to the test instead of
/// opening a socket.
pub struct ScriptedConnector {
    pub fail: bool,
    pub endpoints: mpsc::UnboundedSender<(SessionConfig, UpstreamEndpoint)>,
}

#[async_trait]
impl UpstreamConnector for ScriptedConnector {
    async fn connect(&self, session: SessionConfig) -> RealtimeResult<UpstreamLink> {
        if self.fail {
            return Err(RealtimeError::ConnectionFailed("refused".to_string()));
        }
        let (link, endpoint) = UpstreamLink::pair();
        let _ = self.endpoints.send((session, endpoint));
        Ok(link)
    }
}

#[derive(Default)]
pub struct RecordingSink(pub Mutex<Vec<CallSummary>>);

#[async_trait]
impl TranscriptSink for RecordingSink {
    async fn deliver(&self, summary: &CallSummary) {
        self.0.lock().unwrap().push(summary.clone());
    }
}

pub struct TestBridge {
    pub state: Arc<AppState>,
    pub sink: Arc<RecordingSink>,
    pub endpoints: mpsc::UnboundedReceiver<(SessionConfig, UpstreamEndpoint)>,
}

pub fn test_bridge(config: ServerConfig, fail_upstream: bool) -> TestBridge {
    let (endpoint_tx, endpoints) = mpsc::unbounded_channel();
    let sink = Arc::new(RecordingSink::default());
    let state = AppState::with_components(
        config,
        Arc::new(ScriptedConnector {
            fail: fail_upstream,
            endpoints: endpoint_tx,
        }),
        Arc::new(PersonaPromptBuilder::default()),
        sink.clone(),
    );
    TestBridge {
        state,
        sink,
        endpoints,
    }
}

/// Serve the full router on an ephemeral port.
pub async fn serve(state: Arc<AppState>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cancelled = state.shutdown.clone();
    tokio::spawn(async move {
        axum::serve(listener, call_bridge::app(state))
            .with_graceful_shutdown(async move { cancelled.cancelled().await })
            .await
            .unwrap();
    });
    addr
}
