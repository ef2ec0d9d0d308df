//! WebSocket event types and broadcasting for the renderer bridge.
//!
//! Every session change is broadcast to connected renderers as a JSON object
//! with `event` and `payload` fields.
//!
//! # Event Types
//!
//! - `connected` - Sent when a client connects, includes the session snapshot
//! - `exercise_selected` - A new exercise was selected and the session reset
//! - `frame_result` - A frame was evaluated
//! - `rep_counted` - A repetition was completed
//! - `feedback_cleared` - The visible message expired
//! - `error` - A frame or selection was rejected
//!
//! # Example
//!
//! ```no_run
//! use repcoach_core::websocket::{EventBroadcaster, SessionEvent};
//! use repcoach_core::ExerciseId;
//!
//! # async fn example() {
//! let broadcaster = EventBroadcaster::new(100);
//! let mut receiver = broadcaster.subscribe();
//!
//! broadcaster.send(SessionEvent::exercise_selected(ExerciseId::Squat, 1));
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {}", event.event_name());
//! }
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::profile::ExerciseId;
use crate::session::{FrameResult, SessionSnapshot};

// ============================================================================
// Event Payloads
// ============================================================================

/// Payload for the `connected` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedPayload {
    /// The session as it was when the client connected.
    pub snapshot: SessionSnapshot,
}

/// Payload for the `exercise_selected` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseSelectedPayload {
    /// The newly selected exercise.
    pub exercise: ExerciseId,
    /// Epoch of the new selection.
    pub epoch: u64,
}

/// Payload for the `rep_counted` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepCountedPayload {
    /// Exercise the repetition belongs to.
    pub exercise: ExerciseId,
    /// Count after this repetition.
    pub rep_count: u32,
    /// When the repetition was counted.
    pub timestamp: DateTime<Utc>,
}

/// Payload for the `feedback_cleared` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackClearedPayload {
    /// Ticket of the message that expired.
    pub ticket: u64,
}

/// Payload for the `error` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Human-readable error message.
    pub message: String,
}

// ============================================================================
// Event Enum
// ============================================================================

/// Events pushed to renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Sent when a client connects.
    Connected(ConnectedPayload),
    /// Sent when an exercise is selected.
    ExerciseSelected(ExerciseSelectedPayload),
    /// Sent after every evaluated frame.
    FrameResult(FrameResult),
    /// Sent when a repetition is completed.
    RepCounted(RepCountedPayload),
    /// Sent when the visible message expires.
    FeedbackCleared(FeedbackClearedPayload),
    /// Sent when input is rejected.
    Error(ErrorPayload),
}

impl SessionEvent {
    /// Creates a `Connected` event.
    #[must_use]
    pub const fn connected(snapshot: SessionSnapshot) -> Self {
        Self::Connected(ConnectedPayload { snapshot })
    }

    /// Creates an `ExerciseSelected` event.
    #[must_use]
    pub const fn exercise_selected(exercise: ExerciseId, epoch: u64) -> Self {
        Self::ExerciseSelected(ExerciseSelectedPayload { exercise, epoch })
    }

    /// Creates a `FrameResult` event.
    #[must_use]
    pub const fn frame_result(result: FrameResult) -> Self {
        Self::FrameResult(result)
    }

    /// Creates a `RepCounted` event stamped with the current time.
    #[must_use]
    pub fn rep_counted(exercise: ExerciseId, rep_count: u32) -> Self {
        Self::RepCounted(RepCountedPayload {
            exercise,
            rep_count,
            timestamp: Utc::now(),
        })
    }

    /// Creates a `FeedbackCleared` event.
    #[must_use]
    pub const fn feedback_cleared(ticket: u64) -> Self {
        Self::FeedbackCleared(FeedbackClearedPayload { ticket })
    }

    /// Creates an `Error` event.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            message: message.into(),
        })
    }

    /// Returns the event name as a string.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::ExerciseSelected(_) => "exercise_selected",
            Self::FrameResult(_) => "frame_result",
            Self::RepCounted(_) => "rep_counted",
            Self::FeedbackCleared(_) => "feedback_cleared",
            Self::Error(_) => "error",
        }
    }
}

// ============================================================================
// Event Broadcaster
// ============================================================================

/// Fans session events out to every connected renderer.
///
/// Events are not kept for clients that connect later; they get a snapshot
/// in the `connected` event instead.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBroadcaster {
    /// Creates a broadcaster buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new subscriber.
    ///
    /// A subscriber that falls behind receives `Lagged` and skips ahead.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Broadcasts an event, returning the number of receivers.
    pub fn send(&self, event: SessionEvent) -> usize {
        // Err only means nobody is listening
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

// ============================================================================
// WebSocket Handler
// ============================================================================

/// Interval between heartbeat pings.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Maximum number of missed pong responses before disconnecting.
const MAX_MISSED_PONGS: u8 = 3;

/// Upgrades `GET /ws` to a WebSocket streaming [`SessionEvent`]s.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("New WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Serves one renderer connection.
///
/// Sends the `connected` snapshot, then forwards broadcast events and pings
/// every 30 seconds until the client leaves or misses 3 pongs.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the snapshot so nothing falls between the two
    let mut event_receiver = state.session.broadcaster().subscribe();
    let snapshot = state.session.snapshot().await;

    let connected_json = match serde_json::to_string(&SessionEvent::connected(snapshot)) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize connected event: {}", e);
            return;
        }
    };

    if sender.send(Message::Text(connected_json)).await.is_err() {
        debug!("Client disconnected before receiving connected event");
        return;
    }

    info!("Renderer connected, sent session snapshot");

    let mut heartbeat_interval = interval(HEARTBEAT_INTERVAL);
    let mut missed_pongs = 0u8;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        missed_pongs = 0;
                        debug!("Received pong from client");
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client requested close");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            debug!("Failed to send pong, client disconnected");
                            break;
                        }
                    }
                    Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                        // Frames and selections go through the HTTP API
                        debug!("Ignoring data message from client");
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }

            event = event_receiver.recv() => {
                match event {
                    Ok(session_event) => {
                        let json = match serde_json::to_string(&session_event) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!("Failed to serialize event: {}", e);
                                continue;
                            }
                        };

                        if sender.send(Message::Text(json)).await.is_err() {
                            debug!("Failed to send event, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Client lagged, missed {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Broadcaster closed");
                        break;
                    }
                }
            }

            _ = heartbeat_interval.tick() => {
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    debug!("Failed to send ping, client disconnected");
                    break;
                }
                missed_pongs += 1;
                if missed_pongs >= MAX_MISSED_PONGS {
                    info!("Client missed {} pongs, closing connection", MAX_MISSED_PONGS);
                    break;
                }
            }
        }
    }

    info!("Renderer disconnected");
}

// ============================================================================
// Tests
// ============================================================================
