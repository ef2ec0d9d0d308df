//! Integration tests for the HTTP API.
//!
//! A real server is started on a free port and driven with reqwest, the way
//! a pose producer would drive it.

use std::net::TcpListener;
use std::time::Duration;

use repcoach_core::{create_router, AppState, Config, ExerciseId};
use serde_json::{json, Value};

/// Helper to find an available port for testing.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Spawns the test server and returns its base URL.
async fn spawn_test_server(state: AppState) -> (String, tokio::task::JoinHandle<()>) {
    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");
    let base_url = format!("http://{addr}");

    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    (base_url, handle)
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

async fn post(client: &reqwest::Client, url: &str, body: &Value) -> (u16, Value) {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .expect("Request failed");
    let status = response.status().as_u16();
    let body = response.json().await.expect("Response was not JSON");
    (status, body)
}

async fn status(client: &reqwest::Client, base_url: &str) -> Value {
    client
        .get(format!("{base_url}/api/status"))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Response was not JSON")
}

// ============================================================================
// Selection Tests
// ============================================================================

/// Tests selecting an exercise and reading it back from the status endpoint.
#[tokio::test]
async fn test_select_exercise_then_status() {
    let state = AppState::new(Config::default()).expect("Invalid config");
    let (base_url, _handle) = spawn_test_server(state).await;
    let client = reqwest::Client::new();

    let (code, body) = post(
        &client,
        &format!("{base_url}/api/exercise"),
        &json!({"exercise": "dumbbell curl"}),
    )
    .await;

    assert_eq!(code, 200);
    assert_eq!(body["exercise"], "dumbbell curl");
    assert_eq!(body["epoch"], 1);

    let snapshot = status(&client, &base_url).await;
    assert_eq!(snapshot["epoch"], 1);
    assert_eq!(snapshot["session"]["exercise"], "dumbbell curl");
    assert_eq!(snapshot["session"]["calibrated"], false);
    assert_eq!(snapshot["session"]["repCount"], 0);
}

/// Tests that an unknown exercise is rejected and leaves the session alone.
#[tokio::test]
async fn test_unknown_exercise_rejected() {
    let state = AppState::new(Config::default()).expect("Invalid config");
    state.session.select_exercise(ExerciseId::Lunge).await;
    let (base_url, _handle) = spawn_test_server(state).await;
    let client = reqwest::Client::new();

    let (code, body) = post(
        &client,
        &format!("{base_url}/api/exercise"),
        &json!({"exercise": "deadlift"}),
    )
    .await;

    assert_eq!(code, 400);
    assert!(body["error"]
        .as_str()
        .expect("Missing error message")
        .contains("deadlift"));

    let snapshot = status(&client, &base_url).await;
    assert_eq!(snapshot["epoch"], 1);
    assert_eq!(snapshot["session"]["exercise"], "lunge");
}

// ============================================================================
// Frame Tests
// ============================================================================

/// Tests that frames are refused until an exercise is selected.
#[tokio::test]
async fn test_frame_before_selection_conflicts() {
    let state = AppState::new(Config::default()).expect("Invalid config");
    let (base_url, _handle) = spawn_test_server(state).await;
    let client = reqwest::Client::new();

    let (code, body) = post(&client, &format!("{base_url}/api/frame"), &knee_frame(180.0)).await;

    assert_eq!(code, 409);
    assert!(body["error"].is_string());
}

/// Tests that a frame with more than 33 landmarks is rejected.
#[tokio::test]
async fn test_oversized_frame_rejected() {
    let state = AppState::new(Config::default()).expect("Invalid config");
    state.session.select_exercise(ExerciseId::Squat).await;
    let (base_url, _handle) = spawn_test_server(state).await;
    let client = reqwest::Client::new();

    let frame = json!({ "landmarks": vec![Value::Null; 40] });
    let (code, _) = post(&client, &format!("{base_url}/api/frame"), &frame).await;
    assert_eq!(code, 400);

    let snapshot = status(&client, &base_url).await;
    assert_eq!(snapshot["session"]["framesProcessed"], 0);
}

/// Tests counting two squats through the HTTP API.
#[tokio::test]
async fn test_squats_counted_over_http() {
    let state = AppState::new(Config::default()).expect("Invalid config");
    state.session.select_exercise(ExerciseId::Squat).await;
    let (base_url, _handle) = spawn_test_server(state).await;
    let client = reqwest::Client::new();
    let frame_url = format!("{base_url}/api/frame");

    let mut counts = Vec::new();
    let mut counted = Vec::new();
    for degrees in [180.0, 90.0, 180.0, 90.0, 180.0] {
        let (code, body) = post(&client, &frame_url, &knee_frame(degrees)).await;
        assert_eq!(code, 200);
        counts.push(body["repCount"].as_u64().expect("Missing repCount"));
        counted.push(body["counted"].as_bool().expect("Missing counted"));
    }

    assert_eq!(counts, vec![0, 1, 1, 2, 2]);
    assert_eq!(counted, vec![false, true, false, true, false]);

    let snapshot = status(&client, &base_url).await;
    assert_eq!(snapshot["session"]["repCount"], 2);
    assert_eq!(snapshot["session"]["machineState"], "up");
    assert_eq!(snapshot["session"]["framesProcessed"], 5);
}

/// Tests that a frame tagged with an older epoch is discarded.
#[tokio::test]
async fn test_frame_from_previous_selection_is_stale() {
    let state = AppState::new(Config::default()).expect("Invalid config");
    let (base_url, _handle) = spawn_test_server(state).await;
    let client = reqwest::Client::new();
    let exercise_url = format!("{base_url}/api/exercise");
    let frame_url = format!("{base_url}/api/frame");

    post(&client, &exercise_url, &json!({"exercise": "squat"})).await;
    let (_, body) = post(&client, &exercise_url, &json!({"exercise": "squat"})).await;
    assert_eq!(body["epoch"], 2);

    let mut frame = knee_frame(180.0);
    frame["epoch"] = json!(1);
    let (code, body) = post(&client, &frame_url, &frame).await;

    assert_eq!(code, 200);
    assert_eq!(body["stale"], true);
    assert_eq!(body["calibrated"], false);

    let snapshot = status(&client, &base_url).await;
    assert_eq!(snapshot["session"]["calibrated"], false);
}

/// Tests that visible feedback disappears after the configured duration.
#[tokio::test]
async fn test_feedback_expires() {
    let config = Config {
        feedback_duration_ms: 100,
        ..Config::default()
    };
    let state = AppState::new(config).expect("Invalid config");
    state.session.select_exercise(ExerciseId::Squat).await;
    let (base_url, _handle) = spawn_test_server(state).await;
    let client = reqwest::Client::new();

    let (_, body) = post(&client, &format!("{base_url}/api/frame"), &knee_frame(180.0)).await;
    assert_eq!(body["feedback"]["text"], "You're in position, let's go!");

    let snapshot = status(&client, &base_url).await;
    assert!(snapshot["feedback"].is_object());

    tokio::time::sleep(Duration::from_millis(400)).await;

    let snapshot = status(&client, &base_url).await;
    assert!(snapshot["feedback"].is_null());
    assert_eq!(snapshot["session"]["calibrated"], true);
}
