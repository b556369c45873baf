//! Transcript webhook delivery against a wiremock server.

use std::time::Duration;

use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use call_bridge::core::session::TranscriptRole;
use call_bridge::{CallMetadata, Session, TranscriptSink, WebhookTranscriptSink};

fn finished_call() -> Session {
    let mut session = Session::new(
        "abc123",
        CallMetadata::from_query(Some("contactName=Jo&purpose=demo")),
    );
    session.start_streaming("S1").unwrap();
    session.append_transcript(TranscriptRole::Agent, "Hey Jo!");
    session.append_transcript(TranscriptRole::Caller, "Hi there");
    session.end();
    session
}

#[tokio::test]
async fn test_webhook_posts_call_summary() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/calls"))
        .and(body_partial_json(serde_json::json!({
            "callId": "abc123",
            "status": "completed",
            "streamSid": "S1",
            "metadata": {"contactName": "Jo", "purpose": "demo"},
            "transcript": [
                {"role": "agent", "text": "Hey Jo!"},
                {"role": "caller", "text": "Hi there"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let sink = WebhookTranscriptSink::new(format!("{}/calls", server.uri()));
    sink.deliver(&finished_call().summary()).await;
}

#[tokio::test]
async fn test_webhook_error_status_does_not_panic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let sink = WebhookTranscriptSink::new(server.uri());
    sink.deliver(&finished_call().summary()).await;
}

#[tokio::test]
async fn test_webhook_timeout_is_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let sink = WebhookTranscriptSink::new(server.uri()).with_timeout(Duration::from_millis(200));
    let started = std::time::Instant::now();
    sink.deliver(&finished_call().summary()).await;
    assert!(started.elapsed() < Duration::from_secs(2));
}
