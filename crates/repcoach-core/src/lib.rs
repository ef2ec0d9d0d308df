//! RepCoach core
//!
//! Turns pose-landmark frames into repetition counts and form feedback, and
//! exposes a live session over HTTP and WebSocket.

pub mod angle;
pub mod api;
pub mod calibration;
pub mod config;
pub mod error;
pub mod feedback;
pub mod landmark;
pub mod machine;
pub mod profile;
pub mod replay;
pub mod runtime;
pub mod session;
pub mod websocket;

pub use angle::{angle, joint_angle, Unavailable};
pub use api::{create_router, AppState, ErrorResponse, SelectExerciseRequest, SelectExerciseResponse};
pub use calibration::{CalibrationGate, CalibrationOutcome};
pub use config::{CalibrationConfig, Config, ServerConfig};
pub use error::{RepCoachError, Result};
pub use feedback::{ExpiryTicket, FeedbackEvent, FeedbackPresenter, Message, Tier};
pub use landmark::{Joint, JointTriple, Landmark, LandmarkFrame, Side, LANDMARK_COUNT};
pub use machine::{step, Decision, ExerciseState, Reading};
pub use profile::{ExerciseId, ExerciseProfile, ProfileTable, ThresholdOverride};
pub use replay::{ReplayRecord, ReplaySummary, Replayer, SegmentSummary};
pub use runtime::SessionHandle;
pub use session::{FrameResult, SessionController, SessionSnapshot, SessionState};
pub use websocket::{EventBroadcaster, SessionEvent};
