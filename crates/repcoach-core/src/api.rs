//! HTTP API for pose producers and renderers.
//!
//! # Endpoints
//!
//! - `POST /api/exercise` - Select the active exercise
//! - `POST /api/frame` - Submit one landmark frame
//! - `GET /api/status` - Get the current session snapshot
//! - `GET /ws` - Stream session events
//!
//! # Example
//!
//! ```no_run
//! use repcoach_core::{create_router, AppState, Config};
//!
//! # async fn example() {
//! let state = AppState::new(Config::default()).unwrap();
//! let router = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{RepCoachError, Result};
use crate::landmark::LandmarkFrame;
use crate::profile::ExerciseId;
use crate::runtime::SessionHandle;
use crate::session::{FrameResult, SessionSnapshot};
use crate::websocket::ws_handler;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for `POST /api/exercise`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectExerciseRequest {
    /// Exercise name, e.g. `"dumbbell curl"`.
    pub exercise: String,
}

/// Response body for `POST /api/exercise`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectExerciseResponse {
    /// The exercise now active.
    pub exercise: ExerciseId,
    /// Epoch producers should tag subsequent frames with.
    pub epoch: u64,
    /// Session after the reset.
    pub status: SessionSnapshot,
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Configuration the server was started with.
    pub config: Config,
    /// The live session.
    pub session: SessionHandle,
}

impl AppState {
    /// Creates state with a fresh session and no exercise selected.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn new(config: Config) -> Result<Self> {
        let session = SessionHandle::new(&config)?;
        Ok(Self { config, session })
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// Input could not be accepted.
    BadRequest(String),
    /// The session is not ready for this request.
    Conflict(String),
}

impl From<RepCoachError> for ApiError {
    fn from(err: RepCoachError) -> Self {
        match err {
            RepCoachError::NoExerciseSelected => Self::Conflict(err.to_string()),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router.
///
/// API routes live under `/api`, the event stream at `/ws`. CORS is open so
/// a browser renderer on another origin can connect.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/exercise", post(handle_select_exercise))
        .route("/frame", post(handle_frame))
        .route("/status", get(handle_status));

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `POST /api/exercise`.
async fn handle_select_exercise(
    State(state): State<Arc<AppState>>,
    request: std::result::Result<Json<SelectExerciseRequest>, JsonRejection>,
) -> std::result::Result<Json<SelectExerciseResponse>, ApiError> {
    let Json(request) = request?;
    let (exercise, epoch) = state
        .session
        .select_exercise_by_name(&request.exercise)
        .await?;

    info!(exercise = %exercise, epoch, "Exercise selected via API");

    Ok(Json(SelectExerciseResponse {
        exercise,
        epoch,
        status: state.session.snapshot().await,
    }))
}

/// Handler for `POST /api/frame`.
async fn handle_frame(
    State(state): State<Arc<AppState>>,
    request: std::result::Result<Json<LandmarkFrame>, JsonRejection>,
) -> std::result::Result<Json<FrameResult>, ApiError> {
    let Json(frame) = request?;
    let result = state.session.submit_frame(&frame).await.map_err(|e| {
        warn!(error = %e, "Frame rejected");
        ApiError::from(e)
    })?;
    Ok(Json(result))
}

/// Handler for `GET /api/status`.
async fn handle_status(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot().await)
}

// ============================================================================
// Tests
// ============================================================================
