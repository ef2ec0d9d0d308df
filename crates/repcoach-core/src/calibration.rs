//! Calibration gate - is the subject framed well enough to start counting?
//!
//! The check is exercise independent: the horizontal midpoint of the two
//! shoulders must fall inside a centered band of the image.

use crate::angle::Unavailable;
use crate::config::CalibrationConfig;
use crate::feedback::{Message, Tier};
use crate::landmark::{LandmarkFrame, LEFT_SHOULDER, RIGHT_SHOULDER};

/// Shown once the subject is centered.
pub const IN_POSITION: Message = Message::new("You're in position, let's go!", Tier::Info);

/// Shown while the subject is off center.
pub const MOVE_TO_CENTER: Message = Message::new("Move to the center of the frame", Tier::Info);

/// Result of one calibration attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationOutcome {
    /// Shoulders are centered.
    Centered {
        /// Shoulder midpoint x.
        midpoint: f64,
    },
    /// Shoulders are visible but outside the band.
    OffCenter {
        /// Shoulder midpoint x.
        midpoint: f64,
    },
    /// Shoulders could not be located.
    Unavailable(Unavailable),
}

impl CalibrationOutcome {
    /// Returns `true` for `Centered`.
    #[must_use]
    pub const fn is_centered(&self) -> bool {
        matches!(self, Self::Centered { .. })
    }

    /// Feedback for this outcome. No-signal outcomes stay silent.
    #[must_use]
    pub const fn message(&self) -> Option<Message> {
        match self {
            Self::Centered { .. } => Some(IN_POSITION),
            Self::OffCenter { .. } => Some(MOVE_TO_CENTER),
            Self::Unavailable(_) => None,
        }
    }
}

/// Decides whether classification may start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationGate {
    center_min: f64,
    center_max: f64,
    min_visibility: f64,
}

impl Default for CalibrationGate {
    fn default() -> Self {
        Self::new(&CalibrationConfig::default(), 0.5)
    }
}

impl CalibrationGate {
    /// Creates a gate from its configuration.
    #[must_use]
    pub const fn new(config: &CalibrationConfig, min_visibility: f64) -> Self {
        Self {
            center_min: config.center_min,
            center_max: config.center_max,
            min_visibility,
        }
    }

    /// Evaluates one frame.
    #[must_use]
    pub fn evaluate(&self, frame: &LandmarkFrame) -> CalibrationOutcome {
        let shoulders = frame
            .point(LEFT_SHOULDER, self.min_visibility)
            .and_then(|left| {
                frame
                    .point(RIGHT_SHOULDER, self.min_visibility)
                    .map(|right| (left, right))
            });

        match shoulders {
            Ok((left, right)) => {
                let midpoint = (left.x + right.x) / 2.0;
                if (self.center_min..=self.center_max).contains(&midpoint) {
                    CalibrationOutcome::Centered { midpoint }
                } else {
                    CalibrationOutcome::OffCenter { midpoint }
                }
            }
            Err(reason) => CalibrationOutcome::Unavailable(reason),
        }
    }
}
