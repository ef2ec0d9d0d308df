//! Integration tests for the renderer event stream.
//!
//! Frames and selections are posted over HTTP while WebSocket clients
//! observe the resulting events.

use std::net::TcpListener;
use std::time::Duration;

use futures::SinkExt;
use futures::StreamExt;
use repcoach_core::{create_router, AppState, Config, ExerciseId, ExerciseState, SessionEvent};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tungstenite::Message;

/// Helper to find an available port for testing.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Helper type for WebSocket client
type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Spawns the test server and returns its address.
async fn spawn_test_server(state: AppState) -> (String, tokio::task::JoinHandle<()>) {
    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");

    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    (addr, handle)
}

/// Connects a WebSocket client to the server at `addr`.
async fn connect_client(addr: &str) -> WsClient {
    let (ws_stream, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("Failed to connect to WebSocket");
    ws_stream
}

/// Receives the next text message from the WebSocket and parses it as SessionEvent.
/// Automatically handles ping frames by responding with pong.
async fn receive_event(client: &mut WsClient) -> SessionEvent {
    loop {
        let msg = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("Timeout waiting for message")
            .expect("Stream ended")
            .expect("WebSocket error");

        match msg {
            Message::Text(text) => {
                return serde_json::from_str(&text).expect("Failed to parse event");
            }
            Message::Ping(data) => {
                client
                    .send(Message::Pong(data))
                    .await
                    .expect("Failed to send pong");
            }
            Message::Pong(_) => {}
            other => panic!("Expected text message, got: {other:?}"),
        }
    }
}

/// A centered frame with the left knee at `knee_degrees`.
fn knee_frame(knee_degrees: f64) -> Value {
    let r = knee_degrees.to_radians();
    let mut landmarks = vec![Value::Null; 33];
    landmarks[11] = json!({"x": 0.45, "y": 0.2});
    landmarks[12] = json!({"x": 0.55, "y": 0.2});
    landmarks[23] = json!({"x": 0.5, "y": 0.4});
    landmarks[25] = json!({"x": 0.5, "y": 0.6});
    landmarks[27] = json!({"x": 0.5 + 0.2 * r.sin(), "y": 0.6 - 0.2 * r.cos()});
    json!({ "landmarks": landmarks })
}

async fn post(addr: &str, path: &str, body: &Value) -> u16 {
    reqwest::Client::new()
        .post(format!("http://{addr}{path}"))
        .json(body)
        .send()
        .await
        .expect("Request failed")
        .status()
        .as_u16()
}

/// Config whose messages outlive any single test.
fn long_feedback_config() -> Config {
    Config {
        feedback_duration_ms: 60_000,
        ..Config::default()
    }
}

// ============================================================================
// Connection Tests
// ============================================================================

/// Tests that a client receives the session snapshot on connect.
#[tokio::test]
async fn test_client_receives_snapshot_on_connect() {
    let state = AppState::new(long_feedback_config()).expect("Invalid config");
    state.session.select_exercise(ExerciseId::Lunge).await;
    let (addr, _handle) = spawn_test_server(state).await;

    let mut client = connect_client(&addr).await;
    let event = receive_event(&mut client).await;

    match event {
        SessionEvent::Connected(payload) => {
            assert_eq!(payload.snapshot.epoch, 1);
            let session = payload.snapshot.session.expect("Missing session");
            assert_eq!(session.exercise, ExerciseId::Lunge);
            assert!(!session.calibrated);
            assert!(payload.snapshot.feedback.is_none());
        }
        other => panic!("Expected Connected event, got: {other:?}"),
    }
}

/// Tests that the snapshot is empty before any selection.
#[tokio::test]
async fn test_snapshot_without_selection() {
    let state = AppState::new(long_feedback_config()).expect("Invalid config");
    let (addr, _handle) = spawn_test_server(state).await;

    let mut client = connect_client(&addr).await;

    match receive_event(&mut client).await {
        SessionEvent::Connected(payload) => {
            assert_eq!(payload.snapshot.epoch, 0);
            assert!(payload.snapshot.session.is_none());
        }
        other => panic!("Expected Connected event, got: {other:?}"),
    }
}

// ============================================================================
// Event Flow Tests
// ============================================================================

/// Tests the events produced by calibrating and completing one squat.
#[tokio::test]
async fn test_frames_stream_results_and_reps() {
    let state = AppState::new(long_feedback_config()).expect("Invalid config");
    state.session.select_exercise(ExerciseId::Squat).await;
    let (addr, _handle) = spawn_test_server(state).await;

    let mut client = connect_client(&addr).await;
    receive_event(&mut client).await;

    assert_eq!(post(&addr, "/api/frame", &knee_frame(180.0)).await, 200);
    match receive_event(&mut client).await {
        SessionEvent::FrameResult(result) => {
            assert!(result.calibrated);
            assert_eq!(result.rep_count, 0);
            assert_eq!(result.feedback_text(), Some("You're in position, let's go!"));
        }
        other => panic!("Expected FrameResult event, got: {other:?}"),
    }

    assert_eq!(post(&addr, "/api/frame", &knee_frame(90.0)).await, 200);
    match receive_event(&mut client).await {
        SessionEvent::FrameResult(result) => {
            assert!(result.counted);
            assert_eq!(result.state, ExerciseState::Down);
            assert_eq!(result.feedback_text(), Some("Great squat!"));
        }
        other => panic!("Expected FrameResult event, got: {other:?}"),
    }
    match receive_event(&mut client).await {
        SessionEvent::RepCounted(payload) => {
            assert_eq!(payload.exercise, ExerciseId::Squat);
            assert_eq!(payload.rep_count, 1);
        }
        other => panic!("Expected RepCounted event, got: {other:?}"),
    }
}

/// Tests that an exercise switch reaches every connected client.
#[tokio::test]
async fn test_selection_broadcast_to_multiple_clients() {
    let state = AppState::new(long_feedback_config()).expect("Invalid config");
    let (addr, _handle) = spawn_test_server(state).await;

    let mut client1 = connect_client(&addr).await;
    let mut client2 = connect_client(&addr).await;
    receive_event(&mut client1).await;
    receive_event(&mut client2).await;

    let status = post(&addr, "/api/exercise", &json!({"exercise": "shoulder press"})).await;
    assert_eq!(status, 200);

    for client in [&mut client1, &mut client2] {
        assert_eq!(
            receive_event(client).await,
            SessionEvent::exercise_selected(ExerciseId::ShoulderPress, 1)
        );
    }
}

/// Tests that rejected input is reported on the stream.
#[tokio::test]
async fn test_rejected_frame_emits_error() {
    let state = AppState::new(long_feedback_config()).expect("Invalid config");
    state.session.select_exercise(ExerciseId::Squat).await;
    let (addr, _handle) = spawn_test_server(state).await;

    let mut client = connect_client(&addr).await;
    receive_event(&mut client).await;

    let frame = json!({ "landmarks": vec![Value::Null; 34] });
    assert_eq!(post(&addr, "/api/frame", &frame).await, 400);

    let event = receive_event(&mut client).await;
    assert_eq!(event.event_name(), "error");
}

/// Tests that an expiring message is announced to renderers.
#[tokio::test]
async fn test_feedback_cleared_event() {
    let config = Config {
        feedback_duration_ms: 100,
        ..Config::default()
    };
    let state = AppState::new(config).expect("Invalid config");
    state.session.select_exercise(ExerciseId::Squat).await;
    let (addr, _handle) = spawn_test_server(state).await;

    let mut client = connect_client(&addr).await;
    receive_event(&mut client).await;

    post(&addr, "/api/frame", &knee_frame(180.0)).await;
    assert_eq!(receive_event(&mut client).await.event_name(), "frame_result");

    let event = receive_event(&mut client).await;
    assert!(
        matches!(event, SessionEvent::FeedbackCleared(_)),
        "Expected FeedbackCleared event, got: {event:?}"
    );
}
