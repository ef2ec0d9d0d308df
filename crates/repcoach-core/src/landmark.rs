//! Landmark frames as delivered by the upstream pose estimator.
//!
//! Indices follow the 33-point MediaPipe pose scheme. The core only reads
//! frames; it never draws or stores them beyond a single evaluation.

use serde::{Deserialize, Serialize};

use crate::angle::Unavailable;
use crate::error::{RepCoachError, Result};

// ============================================================================
// LANDMARK INDICES (MediaPipe Pose - 33 total)
// ============================================================================

/// Number of landmarks in a complete pose frame.
pub const LANDMARK_COUNT: usize = 33;

/// Nose tip.
pub const NOSE: usize = 0;
/// Left shoulder.
pub const LEFT_SHOULDER: usize = 11;
/// Right shoulder.
pub const RIGHT_SHOULDER: usize = 12;
/// Left elbow.
pub const LEFT_ELBOW: usize = 13;
/// Right elbow.
pub const RIGHT_ELBOW: usize = 14;
/// Left wrist.
pub const LEFT_WRIST: usize = 15;
/// Right wrist.
pub const RIGHT_WRIST: usize = 16;
/// Left hip.
pub const LEFT_HIP: usize = 23;
/// Right hip.
pub const RIGHT_HIP: usize = 24;
/// Left knee.
pub const LEFT_KNEE: usize = 25;
/// Right knee.
pub const RIGHT_KNEE: usize = 26;
/// Left ankle.
pub const LEFT_ANKLE: usize = 27;
/// Right ankle.
pub const RIGHT_ANKLE: usize = 28;

// ============================================================================
// Landmark
// ============================================================================

/// A single detected body keypoint in normalized image coordinates.
///
/// `x` grows to the right and `y` grows downward, both nominally in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Horizontal position (0 = left edge, 1 = right edge).
    pub x: f64,
    /// Vertical position (0 = top edge, 1 = bottom edge).
    pub y: f64,
    /// Detection confidence reported by the estimator, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
}

impl Landmark {
    /// Creates a landmark without a visibility score.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            visibility: None,
        }
    }

    /// Returns this landmark with the given visibility score.
    #[must_use]
    pub const fn with_visibility(mut self, visibility: f64) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// Returns `true` if both coordinates are finite numbers.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

// ============================================================================
// LandmarkFrame
// ============================================================================

/// One processed video frame worth of landmarks.
///
/// Slots are positional: `landmarks[i]` is body part `i`. A `None` slot (or a
/// short vector) means the estimator did not report that body part.
/// Unknown keys are rejected, so a misspelled record is an error rather than
/// an empty frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LandmarkFrame {
    /// Landmarks by body-part index.
    #[serde(default)]
    pub landmarks: Vec<Option<Landmark>>,

    /// Capture time in milliseconds, relative to any fixed origin.
    #[serde(default, alias = "t", skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<u64>,

    /// Selection epoch the producer believed was active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<u64>,
}

impl LandmarkFrame {
    /// Creates a frame from positional landmark slots.
    #[must_use]
    pub const fn new(landmarks: Vec<Option<Landmark>>) -> Self {
        Self {
            landmarks,
            timestamp_ms: None,
            epoch: None,
        }
    }

    /// Creates a frame with only the given `(index, landmark)` pairs present.
    ///
    /// Pairs with an index outside the pose scheme are ignored.
    #[must_use]
    pub fn from_points(points: &[(usize, Landmark)]) -> Self {
        let mut landmarks = vec![None; LANDMARK_COUNT];
        for &(index, landmark) in points {
            if let Some(slot) = landmarks.get_mut(index) {
                *slot = Some(landmark);
            }
        }
        Self::new(landmarks)
    }

    /// Sets the frame timestamp.
    #[must_use]
    pub const fn at(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    /// Checks that the frame fits the 33-point pose scheme.
    ///
    /// # Errors
    ///
    /// Returns `RepCoachError::InvalidFrame` if more than 33 slots are present.
    pub fn validate(&self) -> Result<()> {
        if self.landmarks.len() > LANDMARK_COUNT {
            return Err(RepCoachError::invalid_frame(format!(
                "{} landmarks (expected at most {LANDMARK_COUNT})",
                self.landmarks.len()
            )));
        }
        Ok(())
    }

    /// Looks up a landmark usable for geometry.
    ///
    /// A landmark is usable when it is present, has finite coordinates, and
    /// its visibility (when reported) is at least `min_visibility`.
    ///
    /// # Errors
    ///
    /// Returns the matching [`Unavailable`] reason otherwise.
    pub fn point(
        &self,
        index: usize,
        min_visibility: f64,
    ) -> std::result::Result<Landmark, Unavailable> {
        let landmark = self
            .landmarks
            .get(index)
            .copied()
            .flatten()
            .ok_or(Unavailable::MissingLandmark { index })?;

        if !landmark.is_finite() {
            return Err(Unavailable::NonFinite);
        }

        match landmark.visibility {
            Some(v) if v < min_visibility => Err(Unavailable::LowVisibility { index }),
            _ => Ok(landmark),
        }
    }

    /// Number of present landmarks.
    #[must_use]
    pub fn present_count(&self) -> usize {
        self.landmarks.iter().filter(|l| l.is_some()).count()
    }
}

// ============================================================================
// Joints
// ============================================================================

/// Body side whose limbs are measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Subject's left side (default).
    #[default]
    Left,
    /// Subject's right side.
    Right,
}

/// Three body-part indices; the angle is measured at `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointTriple {
    /// First endpoint.
    pub a: usize,
    /// Vertex.
    pub b: usize,
    /// Second endpoint.
    pub c: usize,
}

impl JointTriple {
    /// Creates a joint triple with vertex `b`.
    #[must_use]
    pub const fn new(a: usize, b: usize, c: usize) -> Self {
        Self { a, b, c }
    }
}

/// The joints the exercise profiles measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    /// Hip-knee-ankle.
    Knee,
    /// Shoulder-elbow-wrist.
    Elbow,
}

impl Joint {
    /// Landmark triple for this joint on the given side.
    #[must_use]
    pub const fn triple(self, side: Side) -> JointTriple {
        match (self, side) {
            (Self::Knee, Side::Left) => JointTriple::new(LEFT_HIP, LEFT_KNEE, LEFT_ANKLE),
            (Self::Knee, Side::Right) => JointTriple::new(RIGHT_HIP, RIGHT_KNEE, RIGHT_ANKLE),
            (Self::Elbow, Side::Left) => JointTriple::new(LEFT_SHOULDER, LEFT_ELBOW, LEFT_WRIST),
            (Self::Elbow, Side::Right) => {
                JointTriple::new(RIGHT_SHOULDER, RIGHT_ELBOW, RIGHT_WRIST)
            }
        }
    }
}
