//! End-to-end tests for the signaling relay
//!
//! Binds a real listener on 127.0.0.1, runs `serve`, and drives streamers and
//! viewers through `tokio_tungstenite::connect_async`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use screenz::{serve, Signaler, SignalerConfig, StreamerCode, ViewerId};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(3);

// ── Shared helpers ───────────────────────────────────────────────────

async fn start_server(config: SignalerConfig) -> (SocketAddr, Arc<Signaler>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let signaler = Arc::new(Signaler::new(config));
    tokio::spawn(serve(listener, Arc::clone(&signaler)));
    (addr, signaler)
}

async fn connect(addr: SocketAddr, path: &str) -> Client {
    let url = format!("ws://{}{}", addr, path);
    let (stream, _response) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("WebSocket connect failed");
    stream
}

/// Next text frame, skipping control frames
async fn next_text(ws: &mut Client) -> String {
    loop {
        let msg = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("read failed");
        match msg {
            Message::Text(_) => return msg.into_text().unwrap().to_string(),
            Message::Close(frame) => panic!("unexpected close: {:?}", frame),
            _ => {}
        }
    }
}

async fn next_json(ws: &mut Client) -> Value {
    serde_json::from_str(&next_text(ws).await).unwrap()
}

/// Wait for the server's close frame
async fn expect_close(ws: &mut Client) -> CloseFrame<'static> {
    loop {
        let msg = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for close")
            .expect("stream ended before close frame")
            .expect("read failed");
        match msg {
            Message::Close(Some(frame)) => return frame,
            Message::Close(None) => panic!("close frame without a reason"),
            _ => {}
        }
    }
}

async fn send_json(ws: &mut Client, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Connect a streamer and return it with its code
async fn connect_streamer(addr: SocketAddr) -> (Client, String) {
    let mut streamer = connect(addr, "/stream").await;
    let hello = next_json(&mut streamer).await;
    let code = hello["code"].as_str().unwrap().to_string();
    (streamer, code)
}

/// Connect a viewer, have it say hello, and return it with the id the
/// streamer saw it under
async fn connect_viewer(addr: SocketAddr, code: &str, streamer: &mut Client) -> (Client, String) {
    let mut viewer = connect(addr, &format!("/watch/{}", code)).await;
    send_json(&mut viewer, serde_json::json!({"hello": true})).await;

    let seen = next_json(streamer).await;
    assert_eq!(seen["data"], serde_json::json!({"hello": true}));
    let id = seen["from"].as_str().unwrap().to_string();
    (viewer, id)
}

// ═══════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn offer_answer_round_trip() {
    let (addr, signaler) = start_server(SignalerConfig::default()).await;

    let mut streamer = connect(addr, "/stream").await;
    let hello = next_text(&mut streamer).await;
    let code: Value = serde_json::from_str(&hello).unwrap();
    let code = code["code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 5);
    assert!(code
        .bytes()
        .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
    assert!(signaler
        .streamers()
        .contains_key(&StreamerCode::from_path(&code)));

    let mut viewer = connect(addr, &format!("/watch/{}", code)).await;
    let offer = r#"{"type":"offer","sdp":"v=0\r\no=- 1 2 IN IP4 127.0.0.1"}"#;
    viewer.send(Message::Text(offer.to_string().into())).await.unwrap();

    let envelope = next_text(&mut streamer).await;
    let parsed: Value = serde_json::from_str(&envelope).unwrap();
    let id = parsed["from"].as_str().unwrap().to_string();
    id.parse::<ViewerId>().expect("from is a viewer id");
    assert_eq!(envelope, format!(r#"{{"from":"{}","data":{}}}"#, id, offer));
    assert_eq!(signaler.viewers().len(), 1);

    let answer = r#"{"type":"answer","sdp":"v=0"}"#;
    let reply = format!(r#"{{"to":"{}","data":{}}}"#, id, answer);
    streamer.send(Message::Text(reply.into())).await.unwrap();

    assert_eq!(next_text(&mut viewer).await, answer);
}

#[tokio::test]
async fn unknown_code_is_rejected() {
    let (addr, signaler) = start_server(SignalerConfig::default()).await;

    let mut viewer = connect(addr, "/watch/ZZZZZ").await;
    let frame = expect_close(&mut viewer).await;

    assert_eq!(frame.code, CloseCode::Normal);
    assert_eq!(frame.reason, "NO_STREAMER");
    assert!(signaler.viewers().is_empty());
    assert!(signaler.streamers().is_empty());
}

#[tokio::test]
async fn candidates_from_many_viewers_carry_their_ids() {
    let (addr, _signaler) = start_server(SignalerConfig::default()).await;
    let (mut streamer, code) = connect_streamer(addr).await;

    let (mut first, first_id) = connect_viewer(addr, &code, &mut streamer).await;
    let (mut second, second_id) = connect_viewer(addr, &code, &mut streamer).await;
    assert_ne!(first_id, second_id);

    send_json(&mut second, serde_json::json!({"candidate": "b"})).await;
    let seen = next_json(&mut streamer).await;
    assert_eq!(seen["from"], second_id.as_str());
    assert_eq!(seen["data"]["candidate"], "b");

    send_json(&mut first, serde_json::json!({"candidate": "a"})).await;
    let seen = next_json(&mut streamer).await;
    assert_eq!(seen["from"], first_id.as_str());
    assert_eq!(seen["data"]["candidate"], "a");
}

#[tokio::test]
async fn messages_reach_only_the_addressed_viewer() {
    let (addr, _signaler) = start_server(SignalerConfig::default()).await;
    let (mut streamer, code) = connect_streamer(addr).await;

    let (mut first, first_id) = connect_viewer(addr, &code, &mut streamer).await;
    let (mut second, second_id) = connect_viewer(addr, &code, &mut streamer).await;

    // Dropped without affecting the session: missing, null, malformed and
    // unknown targets
    send_json(&mut streamer, serde_json::json!({"data": 0})).await;
    send_json(&mut streamer, serde_json::json!({"to": null, "data": 0})).await;
    send_json(&mut streamer, serde_json::json!({"to": 7, "data": 0})).await;
    send_json(&mut streamer, serde_json::json!({"to": "nope", "data": 0})).await;
    let stranger = ViewerId::new().to_string();
    send_json(&mut streamer, serde_json::json!({"to": stranger, "data": 1})).await;

    send_json(&mut streamer, serde_json::json!({"to": second_id, "data": "for-second"})).await;
    send_json(&mut streamer, serde_json::json!({"to": first_id, "data": "for-first"})).await;

    assert_eq!(next_text(&mut second).await, r#""for-second""#);
    assert_eq!(next_text(&mut first).await, r#""for-first""#);
}

#[tokio::test]
async fn failed_viewer_does_not_affect_others() {
    let (addr, signaler) = start_server(SignalerConfig::default()).await;
    let (mut streamer, code) = connect_streamer(addr).await;

    let (gone, gone_id) = connect_viewer(addr, &code, &mut streamer).await;
    let (mut staying, staying_id) = connect_viewer(addr, &code, &mut streamer).await;

    drop(gone);
    let gone_key: ViewerId = gone_id.parse().unwrap();
    wait_until(|| !signaler.viewers().contains_key(&gone_key)).await;

    send_json(&mut streamer, serde_json::json!({"to": gone_id, "data": "lost"})).await;
    send_json(&mut streamer, serde_json::json!({"to": staying_id, "data": "kept"})).await;

    assert_eq!(next_text(&mut staying).await, r#""kept""#);
    assert!(signaler
        .streamers()
        .contains_key(&StreamerCode::from_path(&code)));
}

#[tokio::test]
async fn streamer_disconnect_releases_code() {
    let (addr, signaler) = start_server(SignalerConfig::default()).await;
    let (mut streamer, code) = connect_streamer(addr).await;
    let (mut viewer, viewer_id) = connect_viewer(addr, &code, &mut streamer).await;

    streamer.close(None).await.unwrap();
    let key = StreamerCode::from_path(&code);
    wait_until(|| !signaler.streamers().contains_key(&key)).await;

    // The viewer is orphaned, not torn down
    let viewer_key: ViewerId = viewer_id.parse().unwrap();
    assert!(signaler.viewers().contains_key(&viewer_key));

    // Its next message finds no streamer and ends the session
    send_json(&mut viewer, serde_json::json!({"late": true})).await;
    let frame = expect_close(&mut viewer).await;
    assert_eq!(frame.reason, "Done");
    wait_until(|| !signaler.viewers().contains_key(&viewer_key)).await;

    // New viewers are refused
    let mut late = connect(addr, &format!("/watch/{}", code)).await;
    assert_eq!(expect_close(&mut late).await.reason, "NO_STREAMER");
}

#[tokio::test]
async fn streamer_sending_garbage_is_closed() {
    let (addr, signaler) = start_server(SignalerConfig::default()).await;
    let (mut streamer, code) = connect_streamer(addr).await;

    streamer
        .send(Message::Text("not json".to_string().into()))
        .await
        .unwrap();

    let frame = expect_close(&mut streamer).await;
    assert_eq!(frame.code, CloseCode::Normal);
    assert_eq!(frame.reason, "Done");

    let key = StreamerCode::from_path(&code);
    wait_until(|| !signaler.streamers().contains_key(&key)).await;
}

#[tokio::test]
async fn viewer_deadline_closes_connection() {
    let (addr, signaler) = start_server(SignalerConfig {
        viewer_deadline: Duration::from_millis(300),
        ..SignalerConfig::default()
    })
    .await;
    let (mut streamer, code) = connect_streamer(addr).await;
    let (mut viewer, viewer_id) = connect_viewer(addr, &code, &mut streamer).await;

    let frame = expect_close(&mut viewer).await;
    assert_eq!(frame.code, CloseCode::Normal);
    assert_eq!(frame.reason, "Done");

    let key: ViewerId = viewer_id.parse().unwrap();
    wait_until(|| !signaler.viewers().contains_key(&key)).await;

    // Streamer session survives the viewer's timeout
    let (mut another, another_id) = connect_viewer(addr, &code, &mut streamer).await;
    send_json(&mut streamer, serde_json::json!({"to": another_id, "data": 7})).await;
    assert_eq!(next_text(&mut another).await, "7");
}

#[tokio::test]
async fn unknown_path_is_refused() {
    let (addr, signaler) = start_server(SignalerConfig::default()).await;

    let url = format!("ws://{}/elsewhere", addr);
    match tokio_tungstenite::connect_async(&url).await {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 404),
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("handshake should have been refused"),
    }

    assert!(signaler.streamers().is_empty());
    assert!(signaler.viewers().is_empty());
}
