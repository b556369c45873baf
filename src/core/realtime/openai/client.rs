//! OpenAI Realtime API connector.
//!
//! # API Reference
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events
//! - Auth: `Authorization: Bearer <key>` plus `OpenAI-Beta: realtime=v1`
//!
//! The connector performs the handshake, sends `session.update` as the very
//! first frame, then hands the socket to a pump task. The pump serialises
//! queued [`ClientEvent`]s, parses [`ServerEvent`]s, answers pings and emits
//! exactly one [`UpstreamSignal::Closed`] when the socket ends.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use http::HeaderValue;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::config::RealtimeSettings;
use super::messages::{ClientEvent, ServerEvent, SessionConfig};
use crate::core::realtime::base::{
    RealtimeError, RealtimeResult, UpstreamConnector, UpstreamEndpoint, UpstreamLink,
    UpstreamSignal,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Connector for the OpenAI Realtime API.
pub struct OpenAIRealtimeConnector {
    api_key: String,
    settings: RealtimeSettings,
}

impl OpenAIRealtimeConnector {
    pub fn new(api_key: impl Into<String>, settings: RealtimeSettings) -> RealtimeResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RealtimeError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }
        Ok(Self { api_key, settings })
    }

    fn build_request(&self) -> RealtimeResult<http::Request<()>> {
        let url = self.settings.ws_url();
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::InvalidConfiguration(format!("{url}: {e}")))?;

        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;
        let headers = request.headers_mut();
        headers.insert(http::header::AUTHORIZATION, bearer);
        headers.insert("openai-beta", HeaderValue::from_static("realtime=v1"));

        Ok(request)
    }
}

impl std::fmt::Debug for OpenAIRealtimeConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIRealtimeConnector")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Drop for OpenAIRealtimeConnector {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.api_key.zeroize();
    }
}

#[async_trait]
impl UpstreamConnector for OpenAIRealtimeConnector {
    async fn connect(&self, session: SessionConfig) -> RealtimeResult<UpstreamLink> {
        let request = self.build_request()?;

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(map_connect_error)?;

        tracing::info!(model = %self.settings.model, "Connected to OpenAI Realtime API");

        let (mut ws_sink, ws_source) = ws_stream.split();

        let update = serialize(&ClientEvent::SessionUpdate { session })?;
        ws_sink
            .send(Message::Text(update.into()))
            .await
            .map_err(|e| RealtimeError::WebSocketError(e.to_string()))?;

        let (link, endpoint) = UpstreamLink::pair();
        tokio::spawn(pump(ws_sink, ws_source, endpoint).in_current_span());

        Ok(link)
    }
}

fn map_connect_error(error: tungstenite::Error) -> RealtimeError {
    match error {
        tungstenite::Error::Http(response)
            if matches!(response.status().as_u16(), 401 | 403) =>
        {
            RealtimeError::AuthenticationFailed(format!("HTTP {}", response.status()))
        }
        other => RealtimeError::ConnectionFailed(other.to_string()),
    }
}

fn serialize(event: &ClientEvent) -> RealtimeResult<String> {
    serde_json::to_string(event).map_err(|e| RealtimeError::SerializationError(e.to_string()))
}

/// Own the socket until either side closes it.
async fn pump(mut ws_sink: WsSink, mut ws_source: WsSource, endpoint: UpstreamEndpoint) {
    let UpstreamEndpoint {
        mut commands,
        signals,
        shutdown,
    } = endpoint;

    let reason = loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                let _ = ws_sink.send(Message::Close(None)).await;
                break Some("closed by bridge".to_string());
            }

            command = commands.recv() => {
                let Some(event) = command else {
                    let _ = ws_sink.send(Message::Close(None)).await;
                    break Some("link dropped".to_string());
                };
                if let Err(reason) = write_command(&mut ws_sink, &event).await {
                    break Some(reason);
                }
            }

            message = ws_source.next() => {
                let signal = match message {
                    Some(Ok(Message::Text(text))) => match ServerEvent::parse(text.as_str()) {
                        Ok(event) => UpstreamSignal::Event(event),
                        Err(e) => {
                            tracing::warn!("Failed to parse server event: {}", e);
                            UpstreamSignal::Malformed(text.to_string())
                        }
                    },
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                            tracing::error!("Failed to send pong: {}", e);
                        }
                        continue;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!("WebSocket closed by server");
                        break frame.map(|f| format!("{} {}", u16::from(f.code), f.reason));
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break Some(e.to_string());
                    }
                    None => break None,
                };

                if let Err(reason) =
                    deliver(signal, &signals, &mut commands, &mut ws_sink, &shutdown).await
                {
                    break reason;
                }
            }
        }
    };

    // A link owner blocked on a full command queue must see the pump go away
    // before it can read the final signal.
    drop(commands);
    let _ = signals.send(UpstreamSignal::Closed(reason)).await;
    tracing::debug!("OpenAI Realtime connection task ended");
}

/// Hand one signal to the link owner. Commands keep flowing to the socket
/// while the owner is not reading signals.
///
/// Returns `Err` with the close reason when the pump must stop.
async fn deliver(
    signal: UpstreamSignal,
    signals: &mpsc::Sender<UpstreamSignal>,
    commands: &mut mpsc::Receiver<ClientEvent>,
    ws_sink: &mut WsSink,
    shutdown: &CancellationToken,
) -> Result<(), Option<String>> {
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                let _ = ws_sink.send(Message::Close(None)).await;
                return Err(Some("closed by bridge".to_string()));
            }

            permit = signals.reserve() => {
                return match permit {
                    Ok(permit) => {
                        permit.send(signal);
                        Ok(())
                    }
                    Err(_) => Err(None),
                };
            }

            command = commands.recv() => {
                let Some(event) = command else {
                    let _ = ws_sink.send(Message::Close(None)).await;
                    return Err(Some("link dropped".to_string()));
                };
                write_command(ws_sink, &event).await.map_err(Some)?;
            }
        }
    }
}

/// Write one command to the socket. Events that fail to serialize are
/// logged and skipped; a transport failure is returned.
async fn write_command(ws_sink: &mut WsSink, event: &ClientEvent) -> Result<(), String> {
    let json = match serialize(event) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to serialize {}: {}", event.event_type(), e);
            return Ok(());
        }
    };
    ws_sink.send(Message::Text(json.into())).await.map_err(|e| {
        tracing::error!("Failed to send WebSocket message: {}", e);
        e.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let result = OpenAIRealtimeConnector::new("  ", RealtimeSettings::default());
        assert!(matches!(
            result,
            Err(RealtimeError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn test_request_headers() {
        let connector =
            OpenAIRealtimeConnector::new("sk-test", RealtimeSettings::default()).unwrap();
        let request = connector.build_request().unwrap();

        assert_eq!(
            request.uri().to_string(),
            "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview-2024-12-17"
        );
        assert_eq!(request.headers()["authorization"], "Bearer sk-test");
        assert_eq!(request.headers()["openai-beta"], "realtime=v1");
        assert!(request.headers().contains_key("sec-websocket-key"));
    }

    #[test]
    fn test_invalid_url_is_configuration_error() {
        let settings = RealtimeSettings {
            url: "not a url".to_string(),
            ..Default::default()
        };
        let connector = OpenAIRealtimeConnector::new("sk-test", settings).unwrap();
        assert!(matches!(
            connector.build_request(),
            Err(RealtimeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_debug_hides_key() {
        let connector =
            OpenAIRealtimeConnector::new("sk-secret", RealtimeSettings::default()).unwrap();
        assert!(!format!("{connector:?}").contains("sk-secret"));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let settings = RealtimeSettings {
            url: "ws://127.0.0.1:1/realtime".to_string(),
            ..Default::default()
        };
        let connector = OpenAIRealtimeConnector::new("sk-test", settings).unwrap();
        let result = connector.connect(SessionConfig::default()).await;
        assert!(matches!(result, Err(RealtimeError::ConnectionFailed(_))));
    }
}
