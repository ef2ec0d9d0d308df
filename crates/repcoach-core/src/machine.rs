//! Repetition state machine.
//!
//! Two states, two edges, one profile. Thresholds on the two edges are
//! independent, so jitter around a single boundary cannot complete a cycle.
//!
//! ```text
//!            angle satisfies down_enter
//!      Up ───────────────────────────────▶ Down
//!      ▲                                    │
//!      └────────────────────────────────────┘
//!        angle satisfies up_enter (+ guard)
//! ```

use serde::{Deserialize, Serialize};

use crate::angle::Unavailable;
use crate::feedback::Message;
use crate::profile::{CountEdge, ExerciseProfile};

/// Phase of the current repetition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseState {
    /// Upper phase.
    Up,
    /// Lower phase.
    Down,
}

impl std::fmt::Display for ExerciseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "UP"),
            Self::Down => write!(f, "DOWN"),
        }
    }
}

/// One frame's measurement of the tracked joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Interior joint angle in degrees.
    pub angle: f64,
    /// Whether the profile's up-edge guard holds (ignored without a guard).
    pub guard_satisfied: bool,
}

impl Reading {
    /// A reading with no positional guard involved.
    #[must_use]
    pub const fn new(angle: f64) -> Self {
        Self {
            angle,
            guard_satisfied: true,
        }
    }

    /// A reading with an explicit guard result.
    #[must_use]
    pub const fn guarded(angle: f64, guard_satisfied: bool) -> Self {
        Self {
            angle,
            guard_satisfied,
        }
    }
}

/// Outcome of one step of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// State after this step.
    pub state: ExerciseState,
    /// Feedback to show, if any.
    pub feedback: Option<Message>,
    /// Repetitions completed by this step (0 or 1).
    pub count_delta: u32,
}

impl Decision {
    const fn hold(state: ExerciseState, feedback: Option<Message>) -> Self {
        Self {
            state,
            feedback,
            count_delta: 0,
        }
    }

    /// Returns `true` if the step changed state.
    #[must_use]
    pub fn transitioned_from(&self, previous: ExerciseState) -> bool {
        self.state != previous
    }
}

/// Advances the machine by one reading.
///
/// Pure: it neither reads nor writes session state. An unavailable reading
/// holds the current state and emits nothing.
#[must_use]
pub fn step(
    profile: &ExerciseProfile,
    reading: Result<Reading, Unavailable>,
    state: ExerciseState,
) -> Decision {
    let Ok(reading) = reading else {
        return Decision::hold(state, None);
    };
    let angle = reading.angle;

    match state {
        ExerciseState::Up if profile.down_enter.admits(angle) => Decision {
            state: ExerciseState::Down,
            feedback: Some(profile.on_down),
            count_delta: u32::from(profile.count_on == CountEdge::ToDown),
        },
        ExerciseState::Down if profile.up_enter.admits(angle) => match profile.up_guard {
            Some(rule) if !reading.guard_satisfied => Decision::hold(state, Some(rule.hint)),
            _ => Decision {
                state: ExerciseState::Up,
                feedback: Some(profile.on_up),
                count_delta: u32::from(profile.count_on == CountEdge::ToUp),
            },
        },
        _ => Decision::hold(
            state,
            profile.band_for(state, angle).map(|band| band.message),
        ),
    }
}
