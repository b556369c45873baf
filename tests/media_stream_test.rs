//! Media-stream WebSocket tests
//!
//! A real server on an ephemeral port, a tokio-tungstenite client playing
//! the telephony edge, and a scripted upstream connector standing in for the
//! realtime endpoint.

mod common;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use call_bridge::core::realtime::openai::SessionInfo;
use call_bridge::core::realtime::{ClientEvent, ServerEvent, SessionConfig, UpstreamEndpoint};
use call_bridge::{CallStatus, ServerConfig, UpstreamSignal};
use common::{TestBridge, serve, test_bridge};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(2);

async fn connect(addr: std::net::SocketAddr, path: &str) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}{path}")).await.unwrap();
    ws
}

async fn send_event(ws: &mut Client, event: Value) {
    ws.send(Message::Text(event.to_string().into())).await.unwrap();
}

async fn next_text(ws: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn next_close(ws: &mut Client) -> Option<CloseFrame> {
    loop {
        let message = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for close");
        match message {
            Some(Ok(Message::Close(frame))) => return frame,
            Some(Ok(_)) => continue,
            Some(Err(_)) | None => return None,
        }
    }
}

async fn upstream(bridge: &mut TestBridge) -> (SessionConfig, UpstreamEndpoint) {
    tokio::time::timeout(WAIT, bridge.endpoints.recv())
        .await
        .expect("timed out waiting for upstream connect")
        .unwrap()
}

async fn next_command(endpoint: &mut UpstreamEndpoint) -> ClientEvent {
    tokio::time::timeout(WAIT, endpoint.commands.recv())
        .await
        .expect("timed out waiting for upstream command")
        .unwrap()
}

async fn wait_for_status(bridge: &TestBridge, call_id: &str, status: CallStatus) {
    for _ in 0..100 {
        if bridge
            .state
            .registry
            .get(call_id)
            .is_some_and(|snapshot| snapshot.status == status)
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("call {call_id} never reached {status}");
}

fn start(sid: &str) -> Value {
    json!({"event": "start", "start": {"streamSid": sid, "callSid": "CA1"}})
}

fn media(payload: &str) -> Value {
    json!({"event": "media", "media": {"payload": payload, "timestamp": "100"}})
}

#[tokio::test]
async fn test_call_forwards_caller_audio_once() {
    let mut bridge = test_bridge(ServerConfig::default(), false);
    let addr = serve(bridge.state.clone()).await;

    let mut ws = connect(addr, "/media-stream/abc123?contactName=Jo&purpose=demo").await;
    let (config, mut endpoint) = upstream(&mut bridge).await;
    assert!(config.instructions.unwrap().contains("You are calling: Jo"));

    send_event(&mut ws, json!({"event": "connected", "protocol": "Call"})).await;
    send_event(&mut ws, start("S1")).await;
    send_event(&mut ws, media("QQ==")).await;

    assert_eq!(
        next_command(&mut endpoint).await,
        ClientEvent::InputAudioBufferAppend {
            audio: "QQ==".to_string()
        }
    );
    assert!(endpoint.commands.try_recv().is_err());

    let snapshot = bridge.state.registry.get("abc123").unwrap();
    assert_eq!(snapshot.status, CallStatus::Streaming);
    assert_eq!(snapshot.contact_name, "Jo");
    assert_eq!(snapshot.purpose, "demo");
    assert_eq!(snapshot.stream_sid.as_deref(), Some("S1"));
}

#[tokio::test]
async fn test_malformed_frames_are_skipped() {
    let mut bridge = test_bridge(ServerConfig::default(), false);
    let addr = serve(bridge.state.clone()).await;

    let mut ws = connect(addr, "/media-stream/abc123").await;
    let (_, mut endpoint) = upstream(&mut bridge).await;

    ws.send(Message::Text("not json".into())).await.unwrap();
    send_event(&mut ws, json!({"event": "media"})).await;
    send_event(&mut ws, json!({"event": "dtmf", "dtmf": {"digit": "1"}})).await;
    ws.send(Message::Binary(vec![1u8, 2, 3].into())).await.unwrap();
    send_event(&mut ws, start("S1")).await;
    send_event(&mut ws, media("%%%")).await;
    send_event(&mut ws, media("QQ==")).await;

    assert_eq!(
        next_command(&mut endpoint).await,
        ClientEvent::InputAudioBufferAppend {
            audio: "QQ==".to_string()
        }
    );
}

#[tokio::test]
async fn test_agent_audio_reaches_caller_after_greeting() {
    let mut bridge = test_bridge(ServerConfig::default(), false);
    let addr = serve(bridge.state.clone()).await;

    let mut ws = connect(addr, "/media-stream/abc123?contactName=Jo").await;
    let (_, mut endpoint) = upstream(&mut bridge).await;

    send_event(&mut ws, start("S1")).await;
    wait_for_status(&bridge, "abc123", CallStatus::Streaming).await;

    endpoint
        .signals
        .send(UpstreamSignal::Event(ServerEvent::SessionUpdated {
            session: SessionInfo::default(),
        }))
        .await
        .unwrap();
    assert!(matches!(
        next_command(&mut endpoint).await,
        ClientEvent::ResponseCreate { .. }
    ));

    endpoint
        .signals
        .send(UpstreamSignal::Event(ServerEvent::AudioDelta {
            response_id: Some("resp_1".to_string()),
            item_id: Some("item_1".to_string()),
            delta: "QQ==".to_string(),
        }))
        .await
        .unwrap();

    let frame = next_text(&mut ws).await;
    assert_eq!(
        frame,
        json!({"event": "media", "streamSid": "S1", "media": {"payload": "QQ=="}})
    );
    let mark = next_text(&mut ws).await;
    assert_eq!(mark["event"], "mark");
    assert_eq!(mark["streamSid"], "S1");
}

#[tokio::test]
async fn test_missing_call_id_is_rejected() {
    let bridge = test_bridge(ServerConfig::default(), false);
    let addr = serve(bridge.state.clone()).await;

    for path in ["/media-stream", "/media-stream/"] {
        let mut ws = connect(addr, path).await;
        let frame = next_close(&mut ws).await.expect("close frame");
        assert_eq!(frame.code, CloseCode::Policy);
    }
    assert!(bridge.state.registry.is_empty());
}

#[tokio::test]
async fn test_duplicate_call_id_is_rejected() {
    let mut bridge = test_bridge(ServerConfig::default(), false);
    let addr = serve(bridge.state.clone()).await;

    let _first = connect(addr, "/media-stream/abc123").await;
    let _endpoint = upstream(&mut bridge).await;

    let mut second = connect(addr, "/media-stream/abc123").await;
    let frame = next_close(&mut second).await.expect("close frame");
    assert_eq!(frame.code, CloseCode::Policy);
    assert_eq!(bridge.state.registry.len(), 1);
}

#[tokio::test]
async fn test_stop_completes_call_until_eviction() {
    let mut config = ServerConfig::default();
    config.retention_secs = 1;
    let mut bridge = test_bridge(config, false);
    let addr = serve(bridge.state.clone()).await;

    let mut ws = connect(addr, "/media-stream/abc123").await;
    let (_, endpoint) = upstream(&mut bridge).await;

    send_event(&mut ws, start("S1")).await;
    send_event(&mut ws, json!({"event": "stop", "stop": {"callSid": "CA1"}})).await;

    let frame = next_close(&mut ws).await.expect("close frame");
    assert_eq!(frame.code, CloseCode::Normal);
    wait_for_status(&bridge, "abc123", CallStatus::Ended).await;
    assert!(endpoint.shutdown.is_cancelled());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(bridge.state.registry.get("abc123").is_none());
    assert_eq!(bridge.sink.0.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_upstream_failure_closes_with_server_error() {
    let bridge = test_bridge(ServerConfig::default(), true);
    let addr = serve(bridge.state.clone()).await;

    let mut ws = connect(addr, "/media-stream/abc123").await;
    let frame = next_close(&mut ws).await.expect("close frame");
    assert_eq!(frame.code, CloseCode::Error);
    wait_for_status(&bridge, "abc123", CallStatus::Ended).await;

    let mut retry = connect(addr, "/media-stream/abc123").await;
    let frame = next_close(&mut retry).await.expect("close frame");
    assert_eq!(frame.code, CloseCode::Policy);
}

#[tokio::test]
async fn test_shutdown_closes_live_calls() {
    let mut bridge = test_bridge(ServerConfig::default(), false);
    let addr = serve(bridge.state.clone()).await;

    let mut ws = connect(addr, "/media-stream/abc123").await;
    let _endpoint = upstream(&mut bridge).await;
    send_event(&mut ws, start("S1")).await;
    wait_for_status(&bridge, "abc123", CallStatus::Streaming).await;

    assert!(bridge.state.drain(Duration::from_secs(5)).await);
    assert_eq!(
        bridge.state.registry.get("abc123").unwrap().status,
        CallStatus::Ended
    );
    let frame = next_close(&mut ws).await.expect("close frame");
    assert_eq!(frame.code, CloseCode::Normal);
}
