//! Media-stream WebSocket handler
//!
//! Upgrades the connection, registers the call and runs a [`MediaRelay`]
//! for it. Socket reads and writes happen in two helper tasks connected to
//! the relay by bounded channels.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        OriginalUri, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::core::session::{CallMetadata, Session};
use crate::core::telephony::{TelephonyEvent, extract_call_id};
use crate::state::AppState;

use super::messages::{DownstreamRoute, TelephonyInput, policy_close};
use super::relay::MediaRelay;

/// Channel buffer between the socket tasks and the relay
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (1 MB)
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// How long the writer may take to flush after the relay finishes
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Media-stream WebSocket handler
///
/// Serves `/media-stream`, `/media-stream/` and `/media-stream/{callId}`.
/// The call id and metadata are read from the original request target so
/// that the same handler covers all three routes.
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    OriginalUri(uri): OriginalUri,
    State(state): State<Arc<AppState>>,
) -> Response {
    let call_id = extract_call_id(uri.path());
    let metadata = CallMetadata::from_query(uri.query());

    info!(call_id = ?call_id, "Media stream connection upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| {
            let tasks = state.tasks.clone();
            tasks.track_future(handle_media_socket(socket, state, call_id, metadata))
        })
}

async fn handle_media_socket(
    mut socket: WebSocket,
    state: Arc<AppState>,
    call_id: Option<String>,
    metadata: CallMetadata,
) {
    let Some(call_id) = call_id else {
        warn!("Media stream connection has no call id, closing");
        let _ = socket
            .send(Message::Close(Some(policy_close("bad request"))))
            .await;
        return;
    };

    let session = Session::new(call_id.clone(), metadata);
    if let Err(e) = state.registry.try_register(&session) {
        warn!(call_id = %call_id, error = %e, "Rejecting media stream");
        let _ = socket
            .send(Message::Close(Some(policy_close("call already tracked"))))
            .await;
        return;
    }

    let span = info_span!("media_stream", call_id = %call_id);
    run_session(socket, state, session).instrument(span).await;
}

async fn run_session(socket: WebSocket, state: Arc<AppState>, session: Session) {
    info!("Media stream connection established");

    let (sender, receiver) = socket.split();
    let (route_tx, route_rx) = mpsc::channel::<DownstreamRoute>(CHANNEL_BUFFER_SIZE);
    let (input_tx, input_rx) = mpsc::channel::<TelephonyInput>(CHANNEL_BUFFER_SIZE);

    let writer = tokio::spawn(write_frames(sender, route_rx).in_current_span());
    let reader = tokio::spawn(read_frames(receiver, input_tx).in_current_span());

    MediaRelay::new(session, state, route_tx).run(input_rx).await;

    reader.abort();
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
        warn!("Telephony writer did not finish in time");
    }

    info!("Media stream connection terminated");
}

/// Parse telephony frames and hand them to the relay.
async fn read_frames(mut receiver: SplitStream<WebSocket>, input_tx: mpsc::Sender<TelephonyInput>) {
    let reason = loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => match TelephonyEvent::parse(text.as_str()) {
                Ok(event) => {
                    if input_tx.send(TelephonyInput::Event(event)).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Skipping malformed telephony frame");
                }
            },
            Some(Ok(Message::Binary(data))) => {
                debug!("Ignoring binary telephony frame: {} bytes", data.len());
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Ok(Message::Close(frame))) => {
                info!("Telephony WebSocket close received");
                break frame.map(|f| format!("{} {}", f.code, f.reason.as_str()));
            }
            Some(Err(e)) => {
                warn!("Telephony WebSocket error: {}", e);
                break Some(e.to_string());
            }
            None => break None,
        }
    };

    let _ = input_tx.send(TelephonyInput::Closed(reason)).await;
}

/// Serialise outgoing frames until the relay asks to close.
async fn write_frames(
    mut sender: SplitSink<WebSocket, Message>,
    mut route_rx: mpsc::Receiver<DownstreamRoute>,
) {
    while let Some(route) = route_rx.recv().await {
        let result = match route {
            DownstreamRoute::Frame(frame) => match serde_json::to_string(&frame) {
                Ok(json) => sender.send(Message::Text(json.into())).await,
                Err(e) => {
                    error!("Failed to serialize telephony frame: {}", e);
                    continue;
                }
            },
            DownstreamRoute::Close(frame) => {
                debug!(code = frame.code, "Closing telephony WebSocket");
                let _ = sender.send(Message::Close(Some(frame))).await;
                break;
            }
        };

        if let Err(e) = result {
            debug!("Failed to send telephony frame: {}", e);
            break;
        }
    }
}
