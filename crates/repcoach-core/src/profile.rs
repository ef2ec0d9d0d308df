//! Exercise profiles: which joint each exercise tracks and where its
//! thresholds lie.
//!
//! Adding an exercise means adding a row to [`ExerciseProfile::builtin`];
//! the state machine itself is shared by every profile.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::angle::Unavailable;
use crate::error::RepCoachError;
use crate::feedback::{Message, Tier};
use crate::landmark::{Joint, JointTriple, LandmarkFrame};
use crate::machine::ExerciseState;

// ============================================================================
// ExerciseId
// ============================================================================

/// Exercises with a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExerciseId {
    /// Bodyweight or barbell squat.
    Squat,
    /// Forward lunge (front knee tracked).
    Lunge,
    /// Standing dumbbell biceps curl.
    DumbbellCurl,
    /// Standing overhead shoulder press.
    ShoulderPress,
}

impl ExerciseId {
    /// Every exercise, in selector order.
    pub const ALL: [Self; 4] = [
        Self::Squat,
        Self::Lunge,
        Self::DumbbellCurl,
        Self::ShoulderPress,
    ];

    /// Canonical display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Squat => "squat",
            Self::Lunge => "lunge",
            Self::DumbbellCurl => "dumbbell curl",
            Self::ShoulderPress => "shoulder press",
        }
    }

    /// Parses a name case-insensitively; `_` and `-` count as spaces.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "squat" => Some(Self::Squat),
            "lunge" => Some(Self::Lunge),
            "dumbbell curl" | "curl" => Some(Self::DumbbellCurl),
            "shoulder press" | "press" => Some(Self::ShoulderPress),
            _ => None,
        }
    }
}

impl fmt::Display for ExerciseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExerciseId {
    type Err = RepCoachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_case_insensitive(s).ok_or_else(|| RepCoachError::unknown_exercise(s))
    }
}

impl<'de> Deserialize<'de> for ExerciseId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid exercise '{s}': expected one of 'squat', 'lunge', 'dumbbell curl', 'shoulder press'"
            ))
        })
    }
}

impl Serialize for ExerciseId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

// ============================================================================
// Thresholds
// ============================================================================

/// A one-sided angle threshold in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    /// `angle <= value`
    AtMost(f64),
    /// `angle > value`
    Above(f64),
    /// `angle >= value`
    AtLeast(f64),
}

impl Bound {
    /// Returns `true` if `angle` satisfies the bound.
    #[must_use]
    pub fn admits(self, angle: f64) -> bool {
        match self {
            Self::AtMost(v) => angle <= v,
            Self::Above(v) => angle > v,
            Self::AtLeast(v) => angle >= v,
        }
    }

    /// Threshold value in degrees.
    #[must_use]
    pub const fn value(self) -> f64 {
        match self {
            Self::AtMost(v) | Self::Above(v) | Self::AtLeast(v) => v,
        }
    }

    /// Same comparison against a different value.
    #[must_use]
    pub const fn with_value(self, value: f64) -> Self {
        match self {
            Self::AtMost(_) => Self::AtMost(value),
            Self::Above(_) => Self::Above(value),
            Self::AtLeast(_) => Self::AtLeast(value),
        }
    }
}

/// Which transition edge counts a repetition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CountEdge {
    /// Count when entering `Down`.
    ToDown,
    /// Count when entering `Up`.
    ToUp,
}

/// Positional condition checked alongside an angle threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// The vertex (`b`) is higher in the image than the first endpoint (`a`),
    /// e.g. elbow above shoulder.
    VertexAboveFirst,
}

impl Guard {
    /// Evaluates the guard for `triple` in `frame`.
    ///
    /// # Errors
    ///
    /// Returns [`Unavailable`] if a landmark the guard needs is unusable.
    pub fn check(
        self,
        frame: &LandmarkFrame,
        triple: JointTriple,
        min_visibility: f64,
    ) -> Result<bool, Unavailable> {
        match self {
            Self::VertexAboveFirst => {
                let a = frame.point(triple.a, min_visibility)?;
                let b = frame.point(triple.b, min_visibility)?;
                // Image y grows downward
                Ok(b.y < a.y)
            }
        }
    }
}

/// Guard on the up-enter edge plus the hint shown when only the angle passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardRule {
    /// Condition that must also hold.
    pub guard: Guard,
    /// Feedback when the angle passes but the guard does not.
    pub hint: Message,
}

/// A non-counting angle range used only to grade form.
///
/// Applies while the machine is in `state`; the range is `(low, high]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityBand {
    /// State the band applies in.
    pub state: ExerciseState,
    /// Exclusive lower edge (degrees).
    pub low: f64,
    /// Inclusive upper edge (degrees).
    pub high: f64,
    /// Feedback for angles inside the band.
    pub message: Message,
}

impl QualityBand {
    const fn new(state: ExerciseState, low: f64, high: f64, message: Message) -> Self {
        Self {
            state,
            low,
            high,
            message,
        }
    }

    /// Returns `true` if `angle` lies in `(low, high]`.
    #[must_use]
    pub fn contains(&self, angle: f64) -> bool {
        angle > self.low && angle <= self.high
    }
}

// ============================================================================
// ExerciseProfile
// ============================================================================

/// Immutable configuration of one exercise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExerciseProfile {
    /// Exercise this profile describes.
    pub id: ExerciseId,
    /// Joint whose angle is tracked.
    pub joint: Joint,
    /// Threshold for `Up -> Down`.
    pub down_enter: Bound,
    /// Threshold for `Down -> Up`.
    pub up_enter: Bound,
    /// Extra condition on `Down -> Up`.
    pub up_guard: Option<GuardRule>,
    /// Which edge counts a repetition.
    pub count_on: CountEdge,
    /// State a fresh session starts in.
    pub initial_state: ExerciseState,
    /// Form grading inside the not-yet-crossed zones.
    pub bands: &'static [QualityBand],
    /// Feedback on entering `Down`.
    pub on_down: Message,
    /// Feedback on entering `Up`.
    pub on_up: Message,
}

const SQUAT_BANDS: &[QualityBand] = &[
    QualityBand::new(
        ExerciseState::Up,
        110.0,
        130.0,
        Message::new("Almost there, go a little deeper", Tier::SoSo),
    ),
    QualityBand::new(
        ExerciseState::Up,
        130.0,
        150.0,
        Message::new("Bend your knees more to go deeper", Tier::Bad),
    ),
];

const LUNGE_BANDS: &[QualityBand] = &[
    QualityBand::new(
        ExerciseState::Up,
        110.0,
        130.0,
        Message::new("Almost there, drop your back knee a little more", Tier::SoSo),
    ),
    QualityBand::new(
        ExerciseState::Up,
        130.0,
        150.0,
        Message::new("Bend your front knee more to go deeper", Tier::Bad),
    ),
];

const CURL_BANDS: &[QualityBand] = &[
    QualityBand::new(
        ExerciseState::Up,
        40.0,
        70.0,
        Message::new("Curl a little higher", Tier::SoSo),
    ),
    QualityBand::new(
        ExerciseState::Up,
        70.0,
        100.0,
        Message::new("Bring the weight up to your shoulder", Tier::Bad),
    ),
    QualityBand::new(
        ExerciseState::Down,
        130.0,
        160.0,
        Message::new("Lower the weight all the way down", Tier::SoSo),
    ),
];

const PRESS_BANDS: &[QualityBand] = &[
    QualityBand::new(
        ExerciseState::Down,
        100.0,
        130.0,
        Message::new("Extend your arms overhead", Tier::Bad),
    ),
    QualityBand::new(
        ExerciseState::Down,
        130.0,
        160.0,
        Message::new("Press all the way up", Tier::SoSo),
    ),
    QualityBand::new(
        ExerciseState::Up,
        60.0,
        90.0,
        Message::new("Bring the weights down to shoulder level", Tier::SoSo),
    ),
];

impl ExerciseProfile {
    /// The built-in profile for `id`.
    #[must_use]
    pub const fn builtin(id: ExerciseId) -> Self {
        match id {
            ExerciseId::Squat => Self {
                id,
                joint: Joint::Knee,
                down_enter: Bound::AtMost(110.0),
                up_enter: Bound::Above(169.0),
                up_guard: None,
                count_on: CountEdge::ToDown,
                initial_state: ExerciseState::Up,
                bands: SQUAT_BANDS,
                on_down: Message::new("Great squat!", Tier::Ok),
                on_up: Message::new("Stand up tall", Tier::Info),
            },
            ExerciseId::Lunge => Self {
                id,
                joint: Joint::Knee,
                down_enter: Bound::AtMost(110.0),
                up_enter: Bound::Above(169.0),
                up_guard: None,
                count_on: CountEdge::ToDown,
                initial_state: ExerciseState::Up,
                bands: LUNGE_BANDS,
                on_down: Message::new("Great lunge!", Tier::Ok),
                on_up: Message::new("Step back up", Tier::Info),
            },
            ExerciseId::DumbbellCurl => Self {
                id,
                joint: Joint::Elbow,
                down_enter: Bound::AtMost(40.0),
                up_enter: Bound::Above(160.0),
                up_guard: None,
                count_on: CountEdge::ToUp,
                initial_state: ExerciseState::Up,
                bands: CURL_BANDS,
                on_down: Message::new("Squeeze at the top", Tier::Info),
                on_up: Message::new("Great curl!", Tier::Ok),
            },
            ExerciseId::ShoulderPress => Self {
                id,
                joint: Joint::Elbow,
                down_enter: Bound::AtMost(60.0),
                up_enter: Bound::AtLeast(160.0),
                up_guard: Some(GuardRule {
                    guard: Guard::VertexAboveFirst,
                    hint: Message::new("Raise your elbows above your shoulders", Tier::SoSo),
                }),
                count_on: CountEdge::ToUp,
                initial_state: ExerciseState::Down,
                bands: PRESS_BANDS,
                on_down: Message::new("Lower with control", Tier::Info),
                on_up: Message::new("Great press!", Tier::Ok),
            },
        }
    }

    /// Returns a copy with overridden threshold values.
    #[must_use]
    pub const fn with_thresholds(mut self, down_enter: Option<f64>, up_enter: Option<f64>) -> Self {
        if let Some(v) = down_enter {
            self.down_enter = self.down_enter.with_value(v);
        }
        if let Some(v) = up_enter {
            self.up_enter = self.up_enter.with_value(v);
        }
        self
    }

    /// Band containing `angle` in `state`, if any.
    #[must_use]
    pub fn band_for(&self, state: ExerciseState, angle: f64) -> Option<&QualityBand> {
        self.bands
            .iter()
            .find(|band| band.state == state && band.contains(angle))
    }
}

// ============================================================================
// ProfileTable
// ============================================================================

/// Optional replacement values for an exercise's thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdOverride {
    /// Replacement for the down-enter threshold (degrees).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down_enter: Option<f64>,
    /// Replacement for the up-enter threshold (degrees).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up_enter: Option<f64>,
}

/// The active profile for every exercise.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileTable {
    profiles: [ExerciseProfile; 4],
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self {
            profiles: ExerciseId::ALL.map(ExerciseProfile::builtin),
        }
    }
}

impl ProfileTable {
    /// Built-in profiles with `overrides` applied.
    #[must_use]
    pub fn with_overrides(overrides: &BTreeMap<ExerciseId, ThresholdOverride>) -> Self {
        let mut table = Self::default();
        for (id, o) in overrides {
            let slot = &mut table.profiles[Self::slot(*id)];
            *slot = slot.with_thresholds(o.down_enter, o.up_enter);
        }
        table
    }

    /// Profile for `id`.
    #[must_use]
    pub const fn get(&self, id: ExerciseId) -> &ExerciseProfile {
        &self.profiles[Self::slot(id)]
    }

    const fn slot(id: ExerciseId) -> usize {
        match id {
            ExerciseId::Squat => 0,
            ExerciseId::Lunge => 1,
            ExerciseId::DumbbellCurl => 2,
            ExerciseId::ShoulderPress => 3,
        }
    }
}
