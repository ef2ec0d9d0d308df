//! Session state and the per-frame controller.
//!
//! [`SessionController`] is the only writer of [`SessionState`]. It runs the
//! calibration gate until the subject is framed, then feeds the active
//! profile's joint angle through [`machine::step`] and applies the decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::angle::{joint_angle, Unavailable};
use crate::calibration::{CalibrationGate, CalibrationOutcome};
use crate::config::Config;
use crate::error::{RepCoachError, Result};
use crate::feedback::{ExpiryTicket, FeedbackEvent, FeedbackPresenter};
use crate::landmark::{LandmarkFrame, Side};
use crate::machine::{self, ExerciseState, Reading};
use crate::profile::{ExerciseId, ExerciseProfile, ProfileTable};

// ============================================================================
// SessionState
// ============================================================================

/// Mutable record of one exercise session.
///
/// Re-created wholesale whenever an exercise is selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Exercise being counted.
    pub exercise: ExerciseId,

    /// Selection epoch this state belongs to.
    pub epoch: u64,

    /// Whether the calibration gate has passed for this exercise.
    pub calibrated: bool,

    /// Phase of the current repetition.
    pub machine_state: ExerciseState,

    /// Completed repetitions.
    pub rep_count: u32,

    /// Most recent message issued in this session. Expiry hides the message
    /// but does not clear this field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<FeedbackEvent>,

    /// Frames evaluated (stale frames excluded).
    pub frames_processed: u64,

    /// Frames where the required landmarks were unusable.
    pub frames_without_signal: u64,

    /// When the exercise was selected.
    pub started_at: DateTime<Utc>,
}

impl SessionState {
    /// Creates a fresh state for `profile`.
    #[must_use]
    pub fn new(profile: &ExerciseProfile, epoch: u64) -> Self {
        Self {
            exercise: profile.id,
            epoch,
            calibrated: false,
            machine_state: profile.initial_state,
            rep_count: 0,
            last_message: None,
            frames_processed: 0,
            frames_without_signal: 0,
            started_at: Utc::now(),
        }
    }
}

// ============================================================================
// FrameResult and SessionSnapshot
// ============================================================================

/// Per-frame output handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameResult {
    /// Active exercise.
    pub exercise: ExerciseId,
    /// Active selection epoch.
    pub epoch: u64,
    /// Calibration flag after this frame.
    pub calibrated: bool,
    /// Repetition count after this frame.
    pub rep_count: u32,
    /// Machine state after this frame.
    pub state: ExerciseState,
    /// Message visible after this frame.
    pub feedback: Option<FeedbackEvent>,
    /// Whether this frame completed a repetition.
    pub counted: bool,
    /// Whether the frame carried the landmarks needed for this step.
    pub signal: bool,
    /// Whether the frame was discarded because it belongs to an older selection.
    pub stale: bool,
    /// Ticket of a message issued by this frame, for expiry scheduling.
    #[serde(skip)]
    pub issued: Option<ExpiryTicket>,
}

impl FrameResult {
    /// Text of the visible message, if any.
    #[must_use]
    pub fn feedback_text(&self) -> Option<&str> {
        self.feedback.as_ref().map(|event| event.text.as_str())
    }
}

/// Point-in-time view of the controller for status endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Current selection epoch (0 before any selection).
    pub epoch: u64,
    /// Active session, if an exercise has been selected.
    pub session: Option<SessionState>,
    /// Message currently visible.
    pub feedback: Option<FeedbackEvent>,
}

// ============================================================================
// SessionController
// ============================================================================

/// Owns [`SessionState`] and evaluates frames one at a time.
#[derive(Debug, Clone)]
pub struct SessionController {
    profiles: ProfileTable,
    gate: CalibrationGate,
    side: Side,
    min_visibility: f64,
    presenter: FeedbackPresenter,
    state: Option<SessionState>,
    epoch: u64,
}

impl SessionController {
    /// Creates a controller with no exercise selected.
    ///
    /// # Errors
    ///
    /// Returns `RepCoachError::ConfigValidationError` if `config` is invalid.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            profiles: config.profiles(),
            gate: CalibrationGate::new(&config.calibration, config.min_visibility),
            side: config.side,
            min_visibility: config.min_visibility,
            presenter: FeedbackPresenter::new(config.feedback_duration()),
            state: None,
            epoch: 0,
        })
    }

    /// Selects `exercise`, resetting the session.
    ///
    /// Count, calibration and machine state are re-initialized and any
    /// visible message is cleared along with its pending expiry. Returns the
    /// new selection epoch.
    pub fn select_exercise(&mut self, exercise: ExerciseId) -> u64 {
        self.epoch += 1;
        self.presenter.clear();
        let profile = self.profiles.get(exercise);
        self.state = Some(SessionState::new(profile, self.epoch));
        info!(
            exercise = %exercise,
            epoch = self.epoch,
            initial_state = %profile.initial_state,
            "Exercise selected"
        );
        self.epoch
    }

    /// Selects an exercise by name.
    ///
    /// # Errors
    ///
    /// Returns `RepCoachError::UnknownExercise` without touching the session
    /// if `name` matches no profile.
    pub fn select_exercise_by_name(&mut self, name: &str) -> Result<u64> {
        let exercise = name.parse::<ExerciseId>().map_err(|e| {
            warn!(name, "Rejected unknown exercise");
            e
        })?;
        Ok(self.select_exercise(exercise))
    }

    /// Evaluates one frame at session time `now_ms`.
    ///
    /// Frames tagged with an epoch other than the current one are reported
    /// as stale and have no effect.
    ///
    /// # Errors
    ///
    /// Returns `RepCoachError::InvalidFrame` for frames outside the pose
    /// scheme and `RepCoachError::NoExerciseSelected` before any selection.
    pub fn on_frame(&mut self, frame: &LandmarkFrame, now_ms: u64) -> Result<FrameResult> {
        frame.validate()?;
        let epoch = self.epoch;
        let Some(state) = self.state.as_mut() else {
            return Err(RepCoachError::NoExerciseSelected);
        };

        if let Some(frame_epoch) = frame.epoch.filter(|e| *e != epoch) {
            warn!(frame_epoch, epoch, "Discarding frame from previous selection");
            return Ok(FrameResult {
                exercise: state.exercise,
                epoch,
                calibrated: state.calibrated,
                rep_count: state.rep_count,
                state: state.machine_state,
                feedback: self.presenter.current().cloned(),
                counted: false,
                signal: false,
                stale: true,
                issued: None,
            });
        }

        if self.presenter.expire_due(now_ms) {
            debug!(now_ms, "Feedback expired");
        }
        state.frames_processed += 1;

        let (message, signal, counted) = if state.calibrated {
            let profile = self.profiles.get(state.exercise);
            let reading = measure(profile, frame, self.side, self.min_visibility);
            if let Err(reason) = reading {
                trace!(%reason, "No signal for joint angle");
            }
            let signal = reading.is_ok();
            let decision = machine::step(profile, reading, state.machine_state);

            if decision.transitioned_from(state.machine_state) {
                debug!(
                    exercise = %state.exercise,
                    from = %state.machine_state,
                    to = %decision.state,
                    "State transition"
                );
            }
            state.machine_state = decision.state;
            state.rep_count += decision.count_delta;
            let counted = decision.count_delta > 0;
            if counted {
                info!(exercise = %state.exercise, reps = state.rep_count, "Rep counted");
            }
            (decision.feedback, signal, counted)
        } else {
            let outcome = self.gate.evaluate(frame);
            match outcome {
                CalibrationOutcome::Centered { midpoint } => {
                    state.calibrated = true;
                    info!(exercise = %state.exercise, midpoint, "Calibrated");
                }
                CalibrationOutcome::OffCenter { midpoint } => {
                    debug!(midpoint, "Subject off center");
                }
                CalibrationOutcome::Unavailable(reason) => {
                    trace!(%reason, "No signal for calibration");
                }
            }
            let signal = !matches!(outcome, CalibrationOutcome::Unavailable(_));
            (outcome.message(), signal, false)
        };

        if !signal {
            state.frames_without_signal += 1;
        }

        let issued = message.map(|message| {
            let (event, ticket) = self.presenter.show(message, now_ms);
            state.last_message = Some(event);
            ticket
        });

        Ok(FrameResult {
            exercise: state.exercise,
            epoch,
            calibrated: state.calibrated,
            rep_count: state.rep_count,
            state: state.machine_state,
            feedback: self.presenter.current().cloned(),
            counted,
            signal,
            stale: false,
            issued,
        })
    }

    /// Fires an expiry ticket. Returns `true` if the visible message was cleared.
    pub fn expire_feedback(&mut self, ticket_id: u64) -> bool {
        self.presenter.expire(ticket_id)
    }

    /// Clears the visible message if it is due at `now_ms`.
    pub fn expire_due(&mut self, now_ms: u64) -> bool {
        self.presenter.expire_due(now_ms)
    }

    /// Current selection epoch.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The active session, if any.
    #[must_use]
    pub const fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    /// Message currently visible.
    #[must_use]
    pub fn visible_feedback(&self) -> Option<&FeedbackEvent> {
        self.presenter.current()
    }

    /// Point-in-time view of the session.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            epoch: self.epoch,
            session: self.state.clone(),
            feedback: self.presenter.current().cloned(),
        }
    }
}

/// Reads the profile's joint angle (and guard, if any) from `frame`.
fn measure(
    profile: &ExerciseProfile,
    frame: &LandmarkFrame,
    side: Side,
    min_visibility: f64,
) -> std::result::Result<Reading, Unavailable> {
    let triple = profile.joint.triple(side);
    let angle = joint_angle(frame, triple, min_visibility)?;
    match profile.up_guard {
        Some(rule) => rule
            .guard
            .check(frame, triple, min_visibility)
            .map(|satisfied| Reading::guarded(angle, satisfied)),
        None => Ok(Reading::new(angle)),
    }
}
